//! Barcode normalization, batch generation and sharing.
//!
//! Codes reach us from three places: typed by hand, emitted by a scan
//! device, or carried in a URL path. All of them go through [`normalize`]
//! before they are used as a lookup key.

use std::fs;
use std::path::{Path, PathBuf};

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::{Error, Result};

/// Bytes escaped when a message is embedded in a URL query value.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Smallest batch the generator accepts.
pub const MIN_BATCH: usize = 1;

/// Largest batch the generator accepts.
pub const MAX_BATCH: usize = 200;

/// Width of the zero-padded sequence number appended to the prefix.
pub const SEQUENCE_WIDTH: usize = 3;

/// Normalize a raw barcode into its lookup key.
///
/// Undoes percent-encoding left by URL transport, then trims surrounding
/// whitespace. Invalid UTF-8 after decoding is kept as typed.
///
/// # Errors
///
/// Returns a validation error if nothing remains after normalization.
pub fn normalize(raw: &str) -> Result<String> {
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_or_else(|_| raw.to_string(), |s| s.into_owned());
    let code = decoded.trim();
    if code.is_empty() {
        return Err(Error::validation("Please enter a barcode"));
    }
    Ok(code.to_string())
}

/// Generate `count` sequential codes of the form `prefix` + `001`, `002`, ...
///
/// # Errors
///
/// Returns a validation error, before producing anything, if `count` is
/// outside `1..=200`.
///
/// # Examples
///
/// ```
/// let codes = firelog::barcode::generate_batch("FE-", 3).unwrap();
/// assert_eq!(codes, ["FE-001", "FE-002", "FE-003"]);
/// ```
pub fn generate_batch(prefix: &str, count: usize) -> Result<Vec<String>> {
    if !(MIN_BATCH..=MAX_BATCH).contains(&count) {
        return Err(Error::invalid_field(
            "count",
            format!("Batch count must be between {MIN_BATCH} and {MAX_BATCH}"),
        ));
    }
    Ok((1..=count)
        .map(|i| format!("{prefix}{i:0width$}", width = SEQUENCE_WIDTH))
        .collect())
}

/// Where a shared barcode link opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareTarget {
    /// A new mail with the code in its body.
    Email,
    /// A `WhatsApp` chat with the code as its text.
    WhatsApp,
}

/// Text sent when a barcode is shared.
#[must_use]
pub fn share_message(code: &str) -> String {
    format!("Fire Extinguisher Barcode: {code}")
}

/// Link that opens `target` with the share message filled in.
#[must_use]
pub fn share_link(code: &str, target: ShareTarget) -> String {
    let text = share_message(code);
    let message = utf8_percent_encode(&text, URI_COMPONENT);
    match target {
        ShareTarget::Email => {
            format!("mailto:?subject=Fire%20Extinguisher%20Barcode&body={message}")
        }
        ShareTarget::WhatsApp => format!("https://wa.me/?text={message}"),
    }
}

/// File name a shared code is saved under, `barcode-{code}.txt`.
///
/// Path separators and control characters in the code become `_`.
#[must_use]
pub fn share_file_name(code: &str) -> String {
    let safe: String = code
        .chars()
        .map(|c| {
            if matches!(c, '/' | '\\') || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    format!("barcode-{safe}.txt")
}

/// Save the share message for `code` into `dir`, creating it if needed.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file cannot
/// be written.
pub fn write_share_file(dir: &Path, code: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|source| Error::DirectoryCreate {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(share_file_name(code));
    fs::write(&path, share_message(code))?;
    Ok(path)
}
