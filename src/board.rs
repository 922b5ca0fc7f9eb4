// SPDX-FileCopyrightText: Copyright 2015-2022 TimVideos.us
//
// SPDX-License-Identifier: Apache-2.0

//! The JSON board definition and its translation into atoms.
//!
//! A board definition names the identity of one TOFE board. Fields map one
//! to one onto atom types; [`BoardDefinition::to_atoms`] emits them in the
//! type order the container requires, so definition authors never deal with
//! atom indices except when naming a repository's parent URL.
//!
//! # Example JSON configuration
//! ```json
//! {
//!     "product_version": "v1.0.0",
//!     "pcb_revision": "a902c70",
//!     "eeprom_part_number": "24LC01BT-1/OT",
//!     "manufacturer": "numato.com",
//!     "product_id": "tofe.io/milkymist",
//!     "pcb_repository": { "parent": "product_id", "path": "r/pcb.git" },
//!     "pcb_production_batch": "2015-12-22",
//!     "pcb_license": "CC-BY-SA-4.0",
//!     "eeprom_total_size": { "offset": 0, "size": 128 }
//! }
//! ```

use anyhow::{anyhow, Context};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tofe_eep::{Atom, AtomType, License, OpsisImage, ToBytes, TofeEep, TOFE_MAGIC};

/// The absolute URL atoms a repository reference may hang off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlParent {
    Designer,
    Manufacturer,
    ProductId,
    AuxiliaryUrl,
}

impl UrlParent {
    fn key(self) -> &'static str {
        match self {
            UrlParent::Designer => "designer",
            UrlParent::Manufacturer => "manufacturer",
            UrlParent::ProductId => "product_id",
            UrlParent::AuxiliaryUrl => "auxiliary_url",
        }
    }
}

/// A repository URL relative to one of the board's absolute URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoRef {
    pub parent: UrlParent,
    pub path: String,
}

/// One entry of the EEPROM region map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Region {
    pub offset: u32,
    pub size: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BoardDefinition {
    pub product_version: Option<String>,
    pub product_serial: Option<String>,
    pub part_number: Option<String>,
    pub pcb_revision: Option<String>,
    pub firmware_description: Option<String>,
    pub firmware_revision: Option<String>,
    pub eeprom_part_number: Option<String>,
    pub designer: Option<String>,
    pub manufacturer: Option<String>,
    pub product_id: Option<String>,
    pub auxiliary_url: Option<String>,
    pub pcb_repository: Option<RepoRef>,
    pub firmware_repository: Option<RepoRef>,
    pub sample_code_repository: Option<RepoRef>,
    pub documentation_site: Option<RepoRef>,
    pub pcb_production_batch: Option<NaiveDate>,
    pub pcb_population_batch: Option<NaiveDate>,
    pub firmware_program_date: Option<NaiveDate>,
    pub pcb_license: Option<String>,
    pub firmware_license: Option<String>,
    pub eeprom_total_size: Option<Region>,
    pub eeprom_vendor_data: Vec<Region>,
    pub eeprom_tofe_data: Option<Region>,
    pub eeprom_user_data: Option<Region>,
    pub eeprom_guid: Option<Region>,
    pub eeprom_hole: Option<Region>,
}

impl BoardDefinition {
    pub fn from_json(json: &str) -> anyhow::Result<BoardDefinition> {
        let board: BoardDefinition = serde_json::from_str(json)?;
        Ok(board)
    }

    /// Emit the board's atoms in container (type) order.
    pub fn to_atoms(&self) -> anyhow::Result<Vec<Atom>> {
        let mut atoms: Vec<Atom> = Vec::new();

        for (atype, text) in [
            (AtomType::ProductVersion, &self.product_version),
            (AtomType::ProductSerial, &self.product_serial),
            (AtomType::PartNumber, &self.part_number),
            (AtomType::PcbRevision, &self.pcb_revision),
            (AtomType::FirmwareDescription, &self.firmware_description),
            (AtomType::FirmwareRevision, &self.firmware_revision),
            (AtomType::EepromPartNumber, &self.eeprom_part_number),
        ] {
            if let Some(text) = text {
                atoms.push(Atom::string(atype, text)?);
            }
        }

        let mut url_index: [Option<u8>; 4] = [None; 4];
        for (atype, parent, url) in [
            (AtomType::Designer, UrlParent::Designer, &self.designer),
            (AtomType::Manufacturer, UrlParent::Manufacturer, &self.manufacturer),
            (AtomType::ProductId, UrlParent::ProductId, &self.product_id),
            (AtomType::AuxiliaryUrl, UrlParent::AuxiliaryUrl, &self.auxiliary_url),
        ] {
            if let Some(url) = url {
                url_index[parent as usize] = Some(atoms.len() as u8);
                atoms.push(Atom::url(atype, url)?);
            }
        }

        for (atype, repo) in [
            (AtomType::PcbRepository, &self.pcb_repository),
            (AtomType::FirmwareRepository, &self.firmware_repository),
            (AtomType::SampleCodeRepository, &self.sample_code_repository),
            (AtomType::DocumentationSite, &self.documentation_site),
        ] {
            if let Some(repo) = repo {
                let parent = url_index[repo.parent as usize].ok_or_else(|| {
                    anyhow!(
                        "repository path `{}' needs the `{}' URL to be defined",
                        repo.path,
                        repo.parent.key()
                    )
                })?;
                atoms.push(Atom::relative_url(atype, parent, &repo.path)?);
            }
        }

        for (atype, date) in [
            (AtomType::PcbProductionBatch, &self.pcb_production_batch),
            (AtomType::PcbPopulationBatch, &self.pcb_population_batch),
            (AtomType::FirmwareProgramDate, &self.firmware_program_date),
        ] {
            if let Some(date) = date {
                let midnight = date
                    .and_hms_opt(0, 0, 0)
                    .expect("BUG: midnight is always a valid time");
                let seconds = u64::try_from(midnight.and_utc().timestamp())
                    .map_err(|_| anyhow!("batch date `{date}' lies before 1970"))?;
                atoms.push(Atom::timestamp(atype, seconds)?);
            }
        }

        for (atype, name) in [
            (AtomType::PcbLicense, &self.pcb_license),
            (AtomType::FirmwareLicense, &self.firmware_license),
        ] {
            if let Some(name) = name {
                let license = License::from_name(name)
                    .ok_or_else(|| anyhow!("unknown license `{name}'"))?;
                atoms.push(Atom::license(atype, license)?);
            }
        }

        if let Some(region) = self.eeprom_total_size {
            atoms.push(Atom::region(AtomType::EepromTotalSize, region.offset, region.size)?);
        }
        for region in &self.eeprom_vendor_data {
            atoms.push(Atom::region(AtomType::EepromVendorData, region.offset, region.size)?);
        }
        for (atype, region) in [
            (AtomType::EepromTofeData, self.eeprom_tofe_data),
            (AtomType::EepromUserData, self.eeprom_user_data),
            (AtomType::EepromGuid, self.eeprom_guid),
            (AtomType::EepromHole, self.eeprom_hole),
        ] {
            if let Some(region) = region {
                atoms.push(Atom::region(atype, region.offset, region.size)?);
            }
        }

        Ok(atoms)
    }

    /// A standalone TOFE container image bounded by the EEPROM size.
    pub fn build_tofe_image(&self, capacity: usize) -> anyhow::Result<Vec<u8>> {
        let mut eep = TofeEep::with_capacity(TOFE_MAGIC, capacity);
        for atom in self.to_atoms()? {
            eep.append(&atom)
                .with_context(|| format!("appending atom type 0x{:02x}", atom.type_byte()))?;
        }
        let mut buf = Vec::with_capacity(eep.len());
        eep.to_bytes(&mut buf);
        Ok(buf)
    }

    /// The 256-byte Opsis composite image around a stage-2 bootloader.
    pub fn build_opsis_image(&self, stage2: &[u8]) -> anyhow::Result<Vec<u8>> {
        let image = OpsisImage::build(stage2, &self.to_atoms()?)?;
        Ok(image.as_bytes().to_vec())
    }
}
