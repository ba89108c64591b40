use super::{
    ArchiveEntry, CENTRAL_HEADER_LEN, DosDateTime, END_RECORD_LEN, FLAG_UTF8, LOCAL_HEADER_LEN,
    METHOD_STORED, SIG_CENTRAL, SIG_END, SIG_LOCAL, VERSION,
};
use crate::crc32;
use crate::error::ArchiveError;
use crate::path;

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn narrow_u32(value: usize, what: impl FnOnce() -> String) -> Result<u32, ArchiveError> {
    u32::try_from(value).map_err(|_| ArchiveError::TooLarge(what()))
}

fn narrow_u16(value: usize, what: impl FnOnce() -> String) -> Result<u16, ArchiveError> {
    u16::try_from(value).map_err(|_| ArchiveError::TooLarge(what()))
}

/// Encode entries into a stored-only zip archive.
///
/// Output is `[local records][central directory][end record]`, with local
/// and central records in input order. Every central record carries the
/// exact offset of its local record.
pub fn encode(entries: &[ArchiveEntry]) -> Result<Vec<u8>, ArchiveError> {
    let count = narrow_u16(entries.len(), || format!("{} entries", entries.len()))?;

    let mut local = Vec::new();
    let mut central = Vec::new();

    for entry in entries {
        let name = path::normalize(&entry.path)
            .map_err(|_| ArchiveError::InvalidEntry(entry.path.clone()))?;
        let name_bytes = name.as_bytes();
        let name_len = narrow_u16(name_bytes.len(), || format!("name of {name}"))?;
        let size = narrow_u32(entry.bytes.len(), || {
            format!("{name} is {} bytes", entry.bytes.len())
        })?;
        let offset = narrow_u32(local.len(), || format!("offset of {name}"))?;

        let crc = crc32::checksum(&entry.bytes);
        let stamp = DosDateTime::from_datetime(entry.timestamp);
        let flags = if name.is_ascii() { 0 } else { FLAG_UTF8 };

        local.reserve(LOCAL_HEADER_LEN + name_bytes.len() + entry.bytes.len());
        put_u32(&mut local, SIG_LOCAL);
        put_u16(&mut local, VERSION);
        put_u16(&mut local, flags);
        put_u16(&mut local, METHOD_STORED);
        put_u16(&mut local, stamp.time);
        put_u16(&mut local, stamp.date);
        put_u32(&mut local, crc);
        put_u32(&mut local, size);
        put_u32(&mut local, size);
        put_u16(&mut local, name_len);
        put_u16(&mut local, 0);
        local.extend_from_slice(name_bytes);
        local.extend_from_slice(&entry.bytes);

        central.reserve(CENTRAL_HEADER_LEN + name_bytes.len());
        put_u32(&mut central, SIG_CENTRAL);
        put_u16(&mut central, VERSION);
        put_u16(&mut central, VERSION);
        put_u16(&mut central, flags);
        put_u16(&mut central, METHOD_STORED);
        put_u16(&mut central, stamp.time);
        put_u16(&mut central, stamp.date);
        put_u32(&mut central, crc);
        put_u32(&mut central, size);
        put_u32(&mut central, size);
        put_u16(&mut central, name_len);
        put_u16(&mut central, 0); // extra
        put_u16(&mut central, 0); // comment
        put_u16(&mut central, 0); // disk number start
        put_u16(&mut central, 0); // internal attributes
        put_u32(&mut central, 0); // external attributes
        put_u32(&mut central, offset);
        central.extend_from_slice(name_bytes);
    }

    let central_offset = narrow_u32(local.len(), || "archive body".to_string())?;
    let central_size = narrow_u32(central.len(), || "central directory".to_string())?;

    let mut out = local;
    out.reserve(central.len() + END_RECORD_LEN);
    out.extend_from_slice(&central);
    put_u32(&mut out, SIG_END);
    put_u16(&mut out, 0);
    put_u16(&mut out, 0);
    put_u16(&mut out, count);
    put_u16(&mut out, count);
    put_u32(&mut out, central_size);
    put_u32(&mut out, central_offset);
    put_u16(&mut out, 0);
    Ok(out)
}
