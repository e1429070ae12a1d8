//! Format-detecting secret decoder.
//!
//! Vendors and authenticator exports disagree on how a shared secret is
//! written down. Detection order is fixed: strict Base32, hex, loosely
//! filtered Base32, Base64. The first encoding that decodes to a non-empty
//! key wins.

use std::sync::LazyLock;

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use data_encoding::{Encoding, Specification};

use crate::error::OtpError;

const BASE32_MIN_LEN: usize = 16;
const BASE64_MIN_LEN: usize = 12;
const HEX_MIN_LEN: usize = 20;

const BASE32_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// RFC 4648 Base32 without padding that ignores trailing bits, matching
/// authenticator apps.
static BASE32: LazyLock<Option<Encoding>> = LazyLock::new(|| {
    let mut spec = Specification::new();
    spec.symbols.push_str(BASE32_ALPHABET);
    spec.check_trailing_bits = false;
    spec.encoding().ok()
});

/// Encoding a secret was recognised as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretEncoding {
    Base32,
    Hex,
    LooseBase32,
    Base64,
}

/// Decode a shared secret into raw key bytes.
///
/// Fails with [`OtpError::SecretFormat`] when no encoding applies. There is
/// no zero-key fallback: a wrong key would yield plausible but useless codes.
pub fn decode_secret(text: &str) -> Result<Vec<u8>, OtpError> {
    decode_with_encoding(text).map(|(bytes, _)| bytes)
}

/// Decode a secret and report which encoding matched.
pub fn decode_with_encoding(text: &str) -> Result<(Vec<u8>, SecretEncoding), OtpError> {
    let compact = strip_whitespace(text);
    if compact.is_empty() {
        return Err(OtpError::SecretFormat("secret is empty".to_string()));
    }
    // `-` groups Base32 and hex secrets but belongs to the URL-safe Base64 alphabet.
    let ungrouped = strip_grouping(&compact);

    if let Some(bytes) = decode_base32_strict(&ungrouped) {
        return Ok((bytes, SecretEncoding::Base32));
    }
    if let Some(bytes) = decode_hex(&ungrouped) {
        return Ok((bytes, SecretEncoding::Hex));
    }
    if let Some(bytes) = decode_base32_loose(&ungrouped) {
        return Ok((bytes, SecretEncoding::LooseBase32));
    }
    if let Some(bytes) = decode_base64(&compact) {
        return Ok((bytes, SecretEncoding::Base64));
    }

    Err(OtpError::SecretFormat(format!(
        "expected Base32, hex or Base64 ({} characters given)",
        compact.len()
    )))
}

/// Check whether `text` looks like a usable secret.
///
/// Accepts Base32 (at least 16 characters of `A-Z2-7`), hex (at least 20
/// characters, even length) or Base64 (at least 12 characters).
pub fn is_valid_secret(text: &str) -> bool {
    let compact = strip_whitespace(text);
    if compact.is_empty() {
        return false;
    }
    let ungrouped = strip_grouping(&compact);

    let upper = ungrouped.trim_end_matches('=').to_ascii_uppercase();
    if upper.len() >= BASE32_MIN_LEN && upper.chars().all(is_base32_char) {
        return true;
    }

    if ungrouped.len() >= HEX_MIN_LEN
        && ungrouped.len() % 2 == 0
        && ungrouped.chars().all(|c| c.is_ascii_hexdigit())
    {
        return true;
    }

    compact.len() >= BASE64_MIN_LEN
        && compact.chars().all(is_base64_char)
        && decode_base64(&compact).is_some()
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn strip_grouping(text: &str) -> String {
    text.chars().filter(|c| *c != '-').collect()
}

fn is_base32_char(c: char) -> bool {
    c.is_ascii_uppercase() || ('2'..='7').contains(&c)
}

fn is_base64_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=' | '_' | '-')
}

/// Decode unpadded Base32 as a bit stream.
///
/// Leftover bits that do not fill a byte are ignored. Lengths of 1, 3 or 6
/// modulo 8 carry a final symbol made only of such bits; it contributes no
/// byte, so it is dropped before decoding.
fn decode_base32_bits(symbols: &str) -> Option<Vec<u8>> {
    let encoding = BASE32.as_ref()?;
    let usable = match symbols.len() % 8 {
        1 | 3 | 6 => symbols.len() - 1,
        _ => symbols.len(),
    };
    non_empty(encoding.decode(&symbols.as_bytes()[..usable]).ok())
}

fn decode_base32_strict(ungrouped: &str) -> Option<Vec<u8>> {
    let upper = ungrouped.trim_end_matches('=').to_ascii_uppercase();
    if upper.len() < BASE32_MIN_LEN || !upper.chars().all(is_base32_char) {
        return None;
    }
    decode_base32_bits(&upper)
}

/// Base32 after discarding every character outside the alphabet.
fn decode_base32_loose(ungrouped: &str) -> Option<Vec<u8>> {
    let filtered: String = ungrouped
        .to_ascii_uppercase()
        .chars()
        .filter(|c| is_base32_char(*c))
        .collect();
    if filtered.len() < BASE32_MIN_LEN {
        return None;
    }
    decode_base32_bits(&filtered)
}

fn decode_hex(ungrouped: &str) -> Option<Vec<u8>> {
    if ungrouped.len() % 2 != 0 || !ungrouped.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    non_empty(hex::decode(ungrouped).ok())
}

fn decode_base64(compact: &str) -> Option<Vec<u8>> {
    if compact.len() < BASE64_MIN_LEN {
        return None;
    }
    let attempt = STANDARD
        .decode(compact)
        .or_else(|_| STANDARD_NO_PAD.decode(compact))
        .or_else(|_| URL_SAFE.decode(compact))
        .or_else(|_| URL_SAFE_NO_PAD.decode(compact));
    non_empty(attempt.ok())
}

fn non_empty(bytes: Option<Vec<u8>>) -> Option<Vec<u8>> {
    bytes.filter(|b| !b.is_empty())
}

#[cfg(test)]
#[path = "secret_tests.rs"]
mod tests;
