//! Compressed ramdisk adapter.
//!
//! A ramdisk segment is a gzip stream whose payload is exactly one cpio
//! archive. [`compress`] and [`decompress`] are the pure byte transforms;
//! [`pack_entries`] and [`unpack_entries`] glue them to the archive codec,
//! staging the intermediate archive bytes through a uniquely named
//! temporary file that is removed on drop on every exit path.

use std::fs;
use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::NamedTempFile;

use crate::archive;
use crate::archive::entry::CpioEntry;
use crate::error::FormatError;

/// Compress an archive byte stream at maximum compression.
pub fn compress(bytes: &[u8]) -> Result<Vec<u8>, FormatError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

/// Decompress a ramdisk back into its archive byte stream.
pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>, FormatError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(FormatError::CorruptCompressedStream)?;
    Ok(out)
}

/// Encode `entries` as an archive and wrap it into ramdisk bytes.
pub fn pack_entries(entries: &[CpioEntry]) -> Result<Vec<u8>, FormatError> {
    let archive = archive::encode(entries)?;

    let mut staging = NamedTempFile::new()?;
    staging.write_all(&archive)?;
    compress(&fs::read(staging.path())?)
}

/// Unwrap ramdisk bytes and decode the archive inside.
pub fn unpack_entries(ramdisk: &[u8]) -> Result<Vec<CpioEntry>, FormatError> {
    let archive = decompress(ramdisk)?;

    let mut staging = NamedTempFile::new()?;
    staging.write_all(&archive)?;
    archive::decode(&fs::read(staging.path())?)
}
