// SPDX-FileCopyrightText: Copyright 2015-2022 TimVideos.us
//
// SPDX-License-Identifier: Apache-2.0

//! URL compression helpers.
//!
//! Absolute URL atoms drop the `https://` scheme and squeeze well-known
//! top-level domains into a single byte. The wire form is
//! `{tld: u8, domain-without-tld ++ path}`; readers put the pieces back
//! together. 0xFD marks a domain whose TLD is not in the table and is
//! stored verbatim.

/// Top-level domain table, scanned in order when encoding. 0x0A is a
/// historical duplicate of `.biz` kept for images written by older tools;
/// the encoder always picks 0x06.
const TLD_TABLE: &[(u8, &str)] = &[
    (0x01, ".com"),
    (0x02, ".org"),
    (0x03, ".net"),
    (0x04, ".edu"),
    (0x05, ".info"),
    (0x06, ".biz"),
    (0x07, ".us"),
    (0x08, ".co"),
    (0x09, ".cc"),
    (0x0a, ".biz"),
    (0x0b, ".me"),
    (0x0c, ".tv"),
    (0x0d, ".io"),
    (0x0e, ".ly"),
    (0x0f, ".it"),
];

/// No table entry matched; the domain is stored whole.
pub(crate) const TLD_NONE: u8 = 0xfd;
/// Reserved alias of [`TLD_NONE`] found in images from older tools.
const TLD_NONE_ALT: u8 = 0xfe;

/// Drop a leading `scheme://` if present.
pub(crate) fn strip_scheme(url: &str) -> &str {
    match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => url,
    }
}

/// Split a scheme-less URL into domain and path; the path keeps its
/// leading slash and may be empty.
pub(crate) fn split(url: &str) -> (&str, &str) {
    match url.find('/') {
        Some(idx) => url.split_at(idx),
        None => (url, ""),
    }
}

/// Find the table entry for the domain's TLD. Returns the code and the
/// domain with the matched suffix removed.
pub(crate) fn compress(domain: &str) -> (u8, &str) {
    for &(code, suffix) in TLD_TABLE {
        if let Some(stripped) = domain.strip_suffix(suffix) {
            return (code, stripped);
        }
    }
    (TLD_NONE, domain)
}

/// The domain suffix a TLD code stands for. `None` for codes outside the
/// table.
pub(crate) fn expand(tld: u8) -> Option<&'static str> {
    if tld == TLD_NONE || tld == TLD_NONE_ALT {
        return Some("");
    }
    TLD_TABLE
        .iter()
        .find(|&&(code, _)| code == tld)
        .map(|&(_, suffix)| suffix)
}

/// Reassemble `https://domain<tld>/path` from the wire form.
pub(crate) fn join(tld: u8, rest: &str) -> Option<String> {
    let suffix = expand(tld)?;
    let (domain, path) = split(rest);
    Some(format!("https://{domain}{suffix}{path}"))
}
