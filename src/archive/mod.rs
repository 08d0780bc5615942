//! cpio newc container codec.
//!
//! Sequences the [`entry`] codec over a whole directory snapshot. Encoding
//! emits the entries in the order the traversal produced them and closes
//! the archive with the trailer sentinel; decoding stops exactly at the
//! trailer and never looks at bytes past it.

pub mod entry;

use entry::{decode_entry, encode_entry, encode_trailer, CpioEntry};

use crate::error::FormatError;

/// Encode a snapshot of directory entries into a complete archive.
pub fn encode(entries: &[CpioEntry]) -> Result<Vec<u8>, FormatError> {
    let mut out = Vec::new();
    for entry in entries {
        encode_entry(entry, &mut out)?;
    }
    encode_trailer(&mut out);
    Ok(out)
}

/// Decode a complete archive into its entries, in archive order.
///
/// Fails with [`FormatError::TruncatedArchive`] if the stream ends before
/// the trailer record.
pub fn decode(bytes: &[u8]) -> Result<Vec<CpioEntry>, FormatError> {
    let mut reader = bytes;
    let mut entries = Vec::new();
    while let Some(entry) = decode_entry(&mut reader)? {
        entries.push(entry);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::entry::{EntryBody, TRAILER_NAME};
    use super::*;

    fn sample_entries() -> Vec<CpioEntry> {
        vec![
            CpioEntry {
                name: "bin".to_string(),
                ino: 2,
                mode: 0o040755,
                body: EntryBody::Directory,
            },
            CpioEntry {
                name: "bin/busybox".to_string(),
                ino: 3,
                mode: 0o100755,
                body: EntryBody::File(b"#!fake-elf".to_vec()),
            },
            CpioEntry {
                name: "bin/sh".to_string(),
                ino: 4,
                mode: 0o120777,
                body: EntryBody::Symlink("busybox".to_string()),
            },
            CpioEntry {
                name: "init".to_string(),
                ino: 5,
                mode: 0o100700,
                body: EntryBody::File(b"#!/bin/sh\nexec /bin/sh\n".to_vec()),
            },
        ]
    }

    #[test]
    fn test_container_round_trip() {
        let entries = sample_entries();
        let bytes = encode(&entries).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, entries);
    }

    #[test]
    fn test_archive_ends_with_trailer() {
        let bytes = encode(&sample_entries()).unwrap();
        let tail = &bytes[bytes.len() - 14..];
        assert_eq!(&tail[..TRAILER_NAME.len()], TRAILER_NAME.as_bytes());
    }

    #[test]
    fn test_decode_stops_at_trailer() {
        let mut bytes = encode(&sample_entries()).unwrap();
        // garbage past the trailer must never be interpreted
        bytes.extend_from_slice(b"GARBAGE GARBAGE GARBAGE");

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.len(), 4);
    }

    #[test]
    fn test_missing_trailer_is_truncated_archive() {
        let entries = sample_entries();
        let with_trailer = encode(&entries).unwrap();
        // chop the trailer record off entirely
        let bytes = &with_trailer[..with_trailer.len() - 124];

        assert!(matches!(
            decode(bytes),
            Err(FormatError::TruncatedArchive)
        ));
    }

    #[test]
    fn test_empty_snapshot_is_just_a_trailer() {
        let bytes = encode(&[]).unwrap();
        assert_eq!(bytes.len(), 124);
        assert_eq!(decode(&bytes).unwrap(), Vec::<CpioEntry>::new());
    }
}
