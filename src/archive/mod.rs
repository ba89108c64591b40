//! Zip container codec.
//!
//! The writer only ever emits stored (uncompressed) entries. The reader
//! accepts stored and deflated entries so that packages produced by other
//! zip tools can be ingested.
//!
//! # Not supported
//! - Zip64, multi-disk archives, encryption.

mod dostime;
mod read;
mod write;

use chrono::{Local, NaiveDateTime};

pub use dostime::DosDateTime;
pub use read::{MAX_DECODED_SIZE, decode, decode_with_limit};
pub use write::encode;

pub(crate) const SIG_LOCAL: u32 = 0x0403_4b50;
pub(crate) const SIG_CENTRAL: u32 = 0x0201_4b50;
pub(crate) const SIG_END: u32 = 0x0605_4b50;

pub(crate) const LOCAL_HEADER_LEN: usize = 30;
pub(crate) const CENTRAL_HEADER_LEN: usize = 46;
pub(crate) const END_RECORD_LEN: usize = 22;

/// Version 2.0: the minimum that understands stored and deflated entries.
pub(crate) const VERSION: u16 = 20;

pub(crate) const FLAG_ENCRYPTED: u16 = 0x0001;
pub(crate) const FLAG_UTF8: u16 = 0x0800;

pub(crate) const METHOD_STORED: u16 = 0;
pub(crate) const METHOD_DEFLATED: u16 = 8;

/// A file to embed when encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub bytes: Vec<u8>,
    pub timestamp: NaiveDateTime,
}

impl ArchiveEntry {
    /// Entry stamped with the current local time.
    pub fn new(path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::with_timestamp(path, bytes, Local::now().naive_local())
    }

    pub fn with_timestamp(
        path: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            path: path.into(),
            bytes: bytes.into(),
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Stored,
    Deflated,
}

/// An entry as found in a decoded archive.
///
/// `raw_path` is the name exactly as stored and is untrusted until it has
/// been through [`crate::path::normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEntry {
    pub raw_path: String,
    pub bytes: Vec<u8>,
    pub is_directory: bool,
    pub modified: Option<NaiveDateTime>,
    pub method: Method,
}

#[inline]
pub(crate) fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

#[inline]
pub(crate) fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn fixed(path: &str, bytes: &[u8]) -> ArchiveEntry {
        let stamp = NaiveDate::from_ymd_opt(2023, 11, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        ArchiveEntry::with_timestamp(path, bytes.to_vec(), stamp)
    }

    #[test]
    fn test_round_trip_preserves_paths_and_contents() {
        let entries = vec![
            fixed("aurora/theme.json", br#"{"id":"aurora"}"#),
            fixed("aurora/preview.png", &[0x89, b'P', b'N', b'G', 0, 1, 2]),
            fixed("aurora/images/bg_app.png", &[7u8; 4096]),
            fixed("aurora/icons/首页.png", b""),
        ];
        let decoded = decode(&encode(&entries).unwrap()).unwrap();

        let expected: BTreeMap<_, _> = entries
            .iter()
            .map(|e| (e.path.clone(), e.bytes.clone()))
            .collect();
        let actual: BTreeMap<_, _> = decoded
            .iter()
            .map(|e| (e.raw_path.clone(), e.bytes.clone()))
            .collect();
        assert_eq!(actual, expected);
        assert!(decoded.iter().all(|e| !e.is_directory));
        assert!(decoded.iter().all(|e| e.method == Method::Stored));
        assert_eq!(decoded[0].modified, Some(entries[0].timestamp));
    }

    #[test]
    fn test_entry_new_uses_current_time() {
        let before = Local::now().naive_local();
        let entry = ArchiveEntry::new("a.txt", "hello");
        assert_eq!(entry.bytes, b"hello");
        assert!(entry.timestamp >= before);
    }
}
