//! Zip32 reader over an in-memory buffer.
//!
//! # Invariants
//! - Every offset and length read from the archive is untrusted and checked
//!   against the buffer before slicing.
//! - Inflated output is bounded by the declared uncompressed size, and the
//!   declared sizes of one archive are capped as a whole before anything is
//!   inflated.
//! - No two file entries may share bytes of the archive.
//! - Central-directory sizes are authoritative, so entries written with a
//!   trailing data descriptor decode like any other.

use std::io::Read;
use std::ops::Range;

use flate2::read::DeflateDecoder;

use super::{
    CENTRAL_HEADER_LEN, DecodedEntry, DosDateTime, END_RECORD_LEN, FLAG_ENCRYPTED,
    LOCAL_HEADER_LEN, METHOD_DEFLATED, METHOD_STORED, Method, SIG_CENTRAL, SIG_END, SIG_LOCAL,
    read_u16, read_u32,
};
use crate::crc32;
use crate::error::ArchiveError;

/// Largest trailing comment the end record can announce.
const MAX_COMMENT_LEN: usize = u16::MAX as usize;
const ZIP64_SENTINEL: u32 = u32::MAX;

/// Default cap on the summed uncompressed size of one archive's entries.
pub const MAX_DECODED_SIZE: u64 = 256 * 1024 * 1024;

struct CentralRecord {
    name: String,
    flags: u16,
    method: u16,
    stamp: DosDateTime,
    crc: u32,
    compressed_size: usize,
    uncompressed_size: usize,
    local_offset: usize,
}

impl CentralRecord {
    fn is_directory(&self) -> bool {
        self.name.ends_with('/') || self.name.ends_with('\\')
    }
}

/// Decode every entry of an archive held in memory.
///
/// Entries come back in central-directory order. Archives whose entries
/// declare more than [`MAX_DECODED_SIZE`] bytes in total are rejected.
pub fn decode(data: &[u8]) -> Result<Vec<DecodedEntry>, ArchiveError> {
    decode_with_limit(data, MAX_DECODED_SIZE)
}

/// [`decode`] with an explicit cap on the summed uncompressed size.
pub fn decode_with_limit(data: &[u8], max_total: u64) -> Result<Vec<DecodedEntry>, ArchiveError> {
    let end = find_end_record(data)?;

    if read_u16(data, end + 4) != 0 || read_u16(data, end + 6) != 0 {
        return Err(ArchiveError::corrupt("multi-disk archives are not supported"));
    }
    let total = read_u16(data, end + 10) as usize;
    let cd_size = read_u32(data, end + 12) as usize;
    let cd_offset = read_u32(data, end + 16) as usize;
    let cd_end = cd_offset
        .checked_add(cd_size)
        .filter(|&cd_end| cd_end <= end)
        .ok_or_else(|| ArchiveError::corrupt("central directory overruns the archive"))?;

    let mut records = Vec::with_capacity(total.min(cd_size / CENTRAL_HEADER_LEN));
    let mut pos = cd_offset;
    for _ in 0..total {
        let (record, next) = parse_central_record(data, pos, cd_end)?;
        pos = next;
        records.push(record);
    }

    let declared: u64 = records
        .iter()
        .filter(|r| !r.is_directory())
        .map(|r| r.uncompressed_size as u64)
        .sum();
    if declared > max_total {
        return Err(ArchiveError::TooLarge(format!(
            "entries declare {declared} bytes, limit is {max_total}"
        )));
    }
    let ranges = locate_data(data, &records)?;

    let mut entries = Vec::with_capacity(records.len());
    for (record, range) in records.into_iter().zip(ranges) {
        let is_directory = record.is_directory();
        let (bytes, method) = match range {
            Some(range) => read_payload(&data[range], &record)?,
            None => (Vec::new(), Method::Stored),
        };
        entries.push(DecodedEntry {
            raw_path: record.name,
            bytes,
            is_directory,
            modified: record.stamp.to_datetime(),
            method,
        });
    }
    Ok(entries)
}

/// Data range of every file entry. Local records may not share bytes.
fn locate_data(
    data: &[u8],
    records: &[CentralRecord],
) -> Result<Vec<Option<Range<usize>>>, ArchiveError> {
    let mut ranges = Vec::with_capacity(records.len());
    let mut spans = Vec::new();
    for (index, record) in records.iter().enumerate() {
        if record.is_directory() {
            ranges.push(None);
            continue;
        }
        let range = local_data(data, record)?;
        spans.push((record.local_offset, range.end, index));
        ranges.push(Some(range));
    }

    spans.sort_unstable();
    for pair in spans.windows(2) {
        let (_, prev_end, prev) = pair[0];
        let (start, _, next) = pair[1];
        if start < prev_end {
            return Err(ArchiveError::corrupt(format!(
                "entries {} and {} overlap",
                records[prev].name, records[next].name
            )));
        }
    }
    Ok(ranges)
}

fn local_data(data: &[u8], record: &CentralRecord) -> Result<Range<usize>, ArchiveError> {
    let name = &record.name;
    let header = record.local_offset;
    if header + LOCAL_HEADER_LEN > data.len() {
        return Err(ArchiveError::corrupt(format!(
            "local header for {name} lies outside the archive"
        )));
    }
    if read_u32(data, header) != SIG_LOCAL {
        return Err(ArchiveError::corrupt(format!(
            "bad local header signature for {name}"
        )));
    }
    // Local name and extra lengths may differ from the central copy.
    let start = header
        + LOCAL_HEADER_LEN
        + read_u16(data, header + 26) as usize
        + read_u16(data, header + 28) as usize;
    let stop = start + record.compressed_size;
    if stop > data.len() {
        return Err(ArchiveError::corrupt(format!(
            "data for {name} overruns the archive"
        )));
    }
    Ok(start..stop)
}

/// Scan backward for the end record; the comment it announces must fit in the buffer.
fn find_end_record(data: &[u8]) -> Result<usize, ArchiveError> {
    if data.len() < END_RECORD_LEN {
        return Err(ArchiveError::corrupt("too small to be a zip archive"));
    }
    let last = data.len() - END_RECORD_LEN;
    let floor = last.saturating_sub(MAX_COMMENT_LEN);
    (floor..=last)
        .rev()
        .find(|&at| {
            read_u32(data, at) == SIG_END
                && at + END_RECORD_LEN + read_u16(data, at + 20) as usize <= data.len()
        })
        .ok_or_else(|| ArchiveError::corrupt("end of central directory not found"))
}

fn parse_central_record(
    data: &[u8],
    pos: usize,
    cd_end: usize,
) -> Result<(CentralRecord, usize), ArchiveError> {
    if pos + CENTRAL_HEADER_LEN > cd_end {
        return Err(ArchiveError::corrupt("central directory truncated"));
    }
    if read_u32(data, pos) != SIG_CENTRAL {
        return Err(ArchiveError::corrupt(format!(
            "bad central directory signature at offset {pos}"
        )));
    }

    let name_len = read_u16(data, pos + 28) as usize;
    let extra_len = read_u16(data, pos + 30) as usize;
    let comment_len = read_u16(data, pos + 32) as usize;
    let name_start = pos + CENTRAL_HEADER_LEN;
    let next = name_start + name_len + extra_len + comment_len;
    if next > cd_end {
        return Err(ArchiveError::corrupt(format!(
            "central directory record at offset {pos} overruns its region"
        )));
    }
    let name = String::from_utf8_lossy(&data[name_start..name_start + name_len]).into_owned();

    let compressed_size = read_u32(data, pos + 20);
    let uncompressed_size = read_u32(data, pos + 24);
    let local_offset = read_u32(data, pos + 42);
    if [compressed_size, uncompressed_size, local_offset].contains(&ZIP64_SENTINEL) {
        return Err(ArchiveError::TooLarge(format!("zip64 entry {name}")));
    }

    let record = CentralRecord {
        flags: read_u16(data, pos + 8),
        method: read_u16(data, pos + 10),
        stamp: DosDateTime {
            time: read_u16(data, pos + 12),
            date: read_u16(data, pos + 14),
        },
        crc: read_u32(data, pos + 16),
        compressed_size: compressed_size as usize,
        uncompressed_size: uncompressed_size as usize,
        local_offset: local_offset as usize,
        name,
    };
    Ok((record, next))
}

fn read_payload(raw: &[u8], record: &CentralRecord) -> Result<(Vec<u8>, Method), ArchiveError> {
    let name = &record.name;
    if record.flags & FLAG_ENCRYPTED != 0 {
        return Err(ArchiveError::Encrypted(name.clone()));
    }

    let (bytes, method) = match record.method {
        METHOD_STORED => {
            if record.compressed_size != record.uncompressed_size {
                return Err(ArchiveError::corrupt(format!(
                    "stored entry {name} has mismatched sizes"
                )));
            }
            (raw.to_vec(), Method::Stored)
        }
        METHOD_DEFLATED => (inflate(raw, record)?, Method::Deflated),
        other => {
            return Err(ArchiveError::UnsupportedMethod {
                path: name.clone(),
                method: other,
            });
        }
    };

    if crc32::checksum(&bytes) != record.crc {
        return Err(ArchiveError::corrupt(format!("checksum mismatch for {name}")));
    }
    Ok((bytes, method))
}

fn inflate(raw: &[u8], record: &CentralRecord) -> Result<Vec<u8>, ArchiveError> {
    let expected = record.uncompressed_size;
    let mut out = Vec::with_capacity(expected.min(raw.len().saturating_mul(8)));
    DeflateDecoder::new(raw)
        .take(expected as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| ArchiveError::corrupt(format!("failed to inflate {}: {e}", record.name)))?;
    if out.len() != expected {
        return Err(ArchiveError::corrupt(format!(
            "{} inflates to {} bytes, header declares {expected}",
            record.name,
            out.len()
        )));
    }
    Ok(out)
}
