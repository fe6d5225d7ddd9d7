//! Key Normalization Module
//!
//! Maps an arbitrary endpoint identifier to a key that is safe both as a
//! shared-tier property name and as a file name.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Longest key produced by `normalize`
pub const MAX_KEY_LENGTH: usize = 200;

/// Key used for an endpoint with no usable content
pub const EMPTY_KEY: &str = "empty";

/// Line width of the MIME-style base64 output
const BASE64_LINE_WIDTH: usize = 76;

/// Hex digits of the digest appended to shortened keys
const DIGEST_SUFFIX_LEN: usize = 16;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));
static SEPARATOR_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").expect("valid regex"));

// == Endpoint Text ==
/// Decodes an endpoint as UTF-8, dropping invalid sequences.
pub fn endpoint_text(endpoint: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(endpoint.as_ref())
        .chars()
        .filter(|c| *c != char::REPLACEMENT_CHARACTER)
        .collect()
}

// == Normalize ==
/// Derives the storage key for an endpoint.
///
/// The endpoint text is base64 encoded in 76-column lines, stripped to
/// word characters, lowercased, and every run of whitespace or hyphens
/// becomes a single hyphen. Never fails: an empty endpoint maps to
/// [`EMPTY_KEY`], an over-long result is shortened with a digest suffix.
pub fn normalize(endpoint: impl AsRef<[u8]>) -> String {
    let text = endpoint_text(endpoint);
    let encoded = STANDARD.encode(text.as_bytes());

    let wrapped = encoded
        .as_bytes()
        .chunks(BASE64_LINE_WIDTH)
        .map(|line| String::from_utf8_lossy(line).into_owned())
        .collect::<Vec<_>>()
        .join("\n");

    let printable: String = wrapped
        .chars()
        .filter(|c| c.is_ascii_graphic() || c.is_ascii_whitespace())
        .collect();
    let stripped = NON_WORD.replace_all(&printable, "");
    let lowered = stripped.trim().to_ascii_lowercase();
    let collapsed = SEPARATOR_RUN.replace_all(&lowered, "-");
    let key = collapsed.trim_matches('-');

    if key.is_empty() {
        return EMPTY_KEY.to_string();
    }
    if key.len() > MAX_KEY_LENGTH {
        return shorten(key);
    }
    key.to_string()
}

/// Returns true if `name` could have been produced by `normalize`.
pub fn is_valid_key(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_KEY_LENGTH
        && !name.starts_with('-')
        && !name.ends_with('-')
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

fn shorten(key: &str) -> String {
    let digest = hex::encode(Sha256::digest(key.as_bytes()));
    let keep = MAX_KEY_LENGTH - DIGEST_SUFFIX_LEN - 1;
    let head = key[..keep].trim_end_matches('-');
    format!("{}-{}", head, &digest[..DIGEST_SUFFIX_LEN])
}
