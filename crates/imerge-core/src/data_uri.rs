//! `data:` URIs, the self-contained form every image reference is turned
//! into before decoding.

use std::fmt;
use std::str::FromStr;

use base64::prelude::BASE64_STANDARD;
use base64::Engine;

use crate::{MergeError, MergeResult};

const SCHEME: &str = "data:";
const DEFAULT_MIME: &str = "text/plain";

/// A decoded `data:` URI: media type plus raw payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime: String,
    pub data: Vec<u8>,
}

impl DataUri {
    pub fn new(mime: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            data,
        }
    }

    /// Cheap prefix check, case-insensitive on the scheme.
    pub fn is_data_uri(reference: &str) -> bool {
        reference
            .get(..SCHEME.len())
            .is_some_and(|s| s.eq_ignore_ascii_case(SCHEME))
    }

    /// Parse `data:[<mime>][;params][;base64],<payload>`.
    pub fn parse(reference: &str) -> MergeResult<Self> {
        if !Self::is_data_uri(reference) {
            return Err(MergeError::decode(
                abbreviate(reference),
                "not a data URI",
            ));
        }
        let rest = &reference[SCHEME.len()..];
        let (header, payload) = rest.split_once(',').ok_or_else(|| {
            MergeError::decode(abbreviate(reference), "data URI has no payload separator")
        })?;

        let mut parts = header.split(';');
        let mime = match parts.next().map(str::trim) {
            Some(m) if !m.is_empty() => m.to_ascii_lowercase(),
            _ => DEFAULT_MIME.to_string(),
        };
        let is_base64 = parts.any(|p| p.trim().eq_ignore_ascii_case("base64"));

        let data = if is_base64 {
            // Some producers wrap long payloads; whitespace is not part of the alphabet.
            let cleaned: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            BASE64_STANDARD.decode(cleaned.as_bytes()).map_err(|e| {
                MergeError::decode(abbreviate(reference), format!("invalid base64 payload: {}", e))
            })?
        } else {
            payload.as_bytes().to_vec()
        };

        Ok(Self { mime, data })
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{};base64,{}",
            SCHEME,
            self.mime,
            BASE64_STANDARD.encode(&self.data)
        )
    }
}

impl FromStr for DataUri {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Shorten a reference for error messages; data URIs can be megabytes long.
pub fn abbreviate(reference: &str) -> String {
    const MAX: usize = 64;
    match reference.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &reference[..idx]),
        None => reference.to_string(),
    }
}
