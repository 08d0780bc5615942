//! Boot image codec.
//!
//! A boot image is a fixed-layout header followed by up to three
//! page-aligned segments:
//!
//! ```text
//! +----------------+
//! | header         |  584 bytes read back, padded to one page
//! +----------------+
//! | kernel         |  kernel_size bytes, zero-padded to padding_size
//! +----------------+
//! | ramdisk        |  ramdisk_size bytes, zero-padded to padding_size
//! +----------------+
//! | second stage   |  optional, second_size bytes plus padding
//! +----------------+
//! ```
//!
//! The header stores a SHA-1 over the segment contents and their sizes;
//! [`decode`] refuses images where the stored prefix does not match.

use std::io::{self, Cursor, Read, Seek, SeekFrom};

use sha1::{Digest, Sha1};

use crate::align::padding_needed;
use crate::error::FormatError;
use crate::settings::BootSettings;

/// Magic at offset 0 of every boot image.
pub const BOOT_MAGIC: &[u8; 8] = b"ANDROID!";

/// Header bytes consumed on decode. The trailing checksum field is wider on
/// disk, but only its first 8 bytes carry the digest prefix readers compare.
const HEADER_READ_SIZE: usize = 584;

/// Marker at offset 36 of a kernel image. When a 2048-byte header page is
/// followed by a page starting with a kernel, segments are aligned to 2048;
/// otherwise the extra page is padding and segments are aligned to 4096.
const KERNEL_PAGE_MARKER: [u8; 4] = [0x18, 0x28, 0x6f, 0x01];

/// A fully decoded boot image: header-derived settings plus the raw
/// segment buffers. The ramdisk segment stays compressed here; the
/// [`crate::ramdisk`] adapter unwraps it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootImage {
    pub settings: BootSettings,
    pub kernel: Vec<u8>,
    pub ramdisk: Vec<u8>,
    pub second: Option<Vec<u8>>,
}

/// Parse a boot image from its raw bytes.
///
/// Verifies the magic and the content checksum, resolves the effective
/// padding size, and returns the settings along with the raw segments.
pub fn decode(bytes: &[u8]) -> Result<BootImage, FormatError> {
    let mut cur = Cursor::new(bytes);

    let mut hdr = [0u8; HEADER_READ_SIZE];
    cur.read_exact(&mut hdr)?;
    if &hdr[0..8] != BOOT_MAGIC {
        return Err(FormatError::BadMagic);
    }

    let kernel_size = read_u32(&hdr, 8);
    let kernel_addr = read_u32(&hdr, 12);
    let ramdisk_size = read_u32(&hdr, 16);
    let ramdisk_addr = read_u32(&hdr, 20);
    let second_size = read_u32(&hdr, 24);
    let second_addr = read_u32(&hdr, 28);
    let tags_addr = read_u32(&hdr, 32);
    let page_size = read_u32(&hdr, 36);
    // two reserved words at offsets 40 and 44 are ignored
    let name = nul_terminated(&hdr[48..64]);
    let cmdline = nul_terminated(&hdr[64..576]);
    let mut id = [0u8; 8];
    id.copy_from_slice(&hdr[576..584]);

    if !page_size.is_power_of_two() || (page_size as usize) < HEADER_READ_SIZE {
        return Err(FormatError::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("implausible page size {page_size}"),
        )));
    }

    // The header occupies the rest of its page.
    cur.seek(SeekFrom::Current((page_size as usize - HEADER_READ_SIZE) as i64))?;

    // Some images keep the header in a 2048-byte page while aligning the
    // data segments to 4096. Peek at the next page: if it starts with a
    // kernel it is real data and the padding size stays 2048, otherwise it
    // was padding and the segments are 4096-aligned.
    let mut padding_size = page_size;
    if page_size == 2048 {
        let start = cur.position();
        let mut probe = [0u8; 2048];
        cur.read_exact(&mut probe)?;
        if probe[36..40] == KERNEL_PAGE_MARKER {
            cur.set_position(start);
        } else {
            padding_size = 4096;
        }
    }

    let kernel = read_segment(&mut cur, kernel_size, padding_size)?;
    let ramdisk = read_segment(&mut cur, ramdisk_size, padding_size)?;
    let second = if second_size > 0 {
        Some(read_segment(&mut cur, second_size, padding_size)?)
    } else {
        None
    };

    let digest = content_digest(&kernel, &ramdisk, second.as_deref());
    if digest[..8] != id {
        return Err(FormatError::ChecksumMismatch);
    }

    Ok(BootImage {
        settings: BootSettings {
            kernel_addr,
            ramdisk_addr,
            second_addr,
            tags_addr,
            page_size,
            name,
            cmdline,
            padding_size,
        },
        kernel,
        ramdisk,
        second,
    })
}

/// Build a boot image from settings and raw segments.
///
/// Segment sizes are measured from the buffers and validated against the
/// 32-bit header fields before any byte is produced. The full 20-byte
/// SHA-1 digest is stored in the checksum field even though readers only
/// compare its first 8 bytes.
pub fn encode(image: &BootImage) -> Result<Vec<u8>, FormatError> {
    let kernel_size = segment_size(&image.kernel)?;
    let ramdisk_size = segment_size(&image.ramdisk)?;
    let second_size = match &image.second {
        Some(second) => segment_size(second)?,
        None => 0,
    };

    let settings = &image.settings;
    let padding = settings.padding_size as usize;
    if padding == 0 || !padding.is_power_of_two() {
        return Err(FormatError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("padding size {padding} is not a power of two"),
        )));
    }

    let digest = content_digest(&image.kernel, &image.ramdisk, image.second.as_deref());

    let mut out = Vec::with_capacity(
        image.kernel.len()
            + image.ramdisk.len()
            + image.second.as_ref().map_or(0, Vec::len)
            + 4 * padding,
    );
    out.extend_from_slice(BOOT_MAGIC);
    let words = [
        kernel_size,
        settings.kernel_addr,
        ramdisk_size,
        settings.ramdisk_addr,
        second_size,
        settings.second_addr,
        settings.tags_addr,
        settings.page_size,
        0,
        0,
    ];
    for word in words {
        out.extend_from_slice(&word.to_le_bytes());
    }
    push_fixed(&mut out, &settings.name, 16);
    push_fixed(&mut out, &settings.cmdline, 512);
    out.extend_from_slice(&digest);

    // Padding on write is measured from the written header's own length,
    // which includes the full-width checksum field.
    pad(&mut out, padding);
    out.extend_from_slice(&image.kernel);
    pad(&mut out, padding);
    out.extend_from_slice(&image.ramdisk);
    pad(&mut out, padding);
    if let Some(second) = &image.second {
        out.extend_from_slice(second);
        pad(&mut out, padding);
    }

    Ok(out)
}

/// SHA-1 over the segment bytes interleaved with their little-endian sizes.
/// An absent second stage still contributes a zero size word.
fn content_digest(kernel: &[u8], ramdisk: &[u8], second: Option<&[u8]>) -> [u8; 20] {
    let mut sha = Sha1::new();
    sha.update(kernel);
    sha.update((kernel.len() as u32).to_le_bytes());
    sha.update(ramdisk);
    sha.update((ramdisk.len() as u32).to_le_bytes());
    if let Some(second) = second {
        sha.update(second);
        sha.update((second.len() as u32).to_le_bytes());
    } else {
        sha.update(0u32.to_le_bytes());
    }
    sha.finalize().into()
}

fn read_segment(
    cur: &mut Cursor<&[u8]>,
    size: u32,
    padding_size: u32,
) -> Result<Vec<u8>, FormatError> {
    let mut data = vec![0u8; size as usize];
    cur.read_exact(&mut data)?;
    // Trailing padding is discarded without validation.
    cur.seek(SeekFrom::Current(
        padding_needed(size as usize, padding_size as usize) as i64,
    ))?;
    Ok(data)
}

fn segment_size(data: &[u8]) -> Result<u32, FormatError> {
    u32::try_from(data.len()).map_err(|_| FormatError::SizeOverflow(data.len()))
}

fn read_u32(hdr: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&hdr[offset..offset + 4]);
    u32::from_le_bytes(word)
}

/// The first NUL terminates the string; the rest of the field is ignored.
fn nul_terminated(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Store `text` NUL-padded into a fixed-width field, truncating at capacity.
fn push_fixed(out: &mut Vec<u8>, text: &str, width: usize) {
    let bytes = text.as_bytes();
    let take = bytes.len().min(width);
    out.extend_from_slice(&bytes[..take]);
    out.resize(out.len() + (width - take), 0);
}

fn pad(out: &mut Vec<u8>, size: usize) {
    let needed = padding_needed(out.len(), size);
    out.resize(out.len() + needed, 0);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(page_size: u32, padding_size: u32) -> BootSettings {
        BootSettings {
            kernel_addr: 0x1000_8000,
            ramdisk_addr: 0x1100_0000,
            second_addr: 0x1010_0000,
            tags_addr: 0x1000_0100,
            page_size,
            name: "test".to_string(),
            cmdline: "console=ttyS0".to_string(),
            padding_size,
        }
    }

    /// A kernel blob carrying the marker decode probes for at offset 36.
    fn marked_kernel(len: usize) -> Vec<u8> {
        let mut kernel = vec![0xAAu8; len];
        kernel[36..40].copy_from_slice(&KERNEL_PAGE_MARKER);
        kernel
    }

    #[test]
    fn test_round_trip_page_4096() {
        let image = BootImage {
            settings: settings(4096, 4096),
            kernel: vec![1u8; 5000],
            ramdisk: vec![2u8; 300],
            second: None,
        };

        let bytes = encode(&image).unwrap();
        let decoded = decode(&bytes).unwrap();

        assert_eq!(decoded, image);
    }

    #[test]
    fn test_round_trip_with_second_stage() {
        let image = BootImage {
            settings: settings(4096, 4096),
            kernel: vec![1u8; 100],
            ramdisk: vec![2u8; 100],
            second: Some(vec![3u8; 77]),
        };

        let bytes = encode(&image).unwrap();
        let decoded = decode(&bytes).unwrap();

        assert_eq!(decoded.second.as_deref(), Some(&[3u8; 77][..]));
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_round_trip_page_2048_with_kernel_marker() {
        // The first data page starts with a marked kernel, so the probe
        // must rewind and keep the 2048-byte alignment.
        let image = BootImage {
            settings: settings(2048, 2048),
            kernel: marked_kernel(3000),
            ramdisk: vec![7u8; 512],
            second: None,
        };

        let bytes = encode(&image).unwrap();
        let decoded = decode(&bytes).unwrap();

        assert_eq!(decoded.settings.padding_size, 2048);
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_page_2048_without_marker_means_4096_padding() {
        // Header page is 2048 bytes but segments are aligned to 4096; the
        // probed page is padding and must be consumed, not rewound.
        let image = BootImage {
            settings: settings(2048, 4096),
            kernel: vec![0x55u8; 1000],
            ramdisk: vec![7u8; 512],
            second: None,
        };

        let bytes = encode(&image).unwrap();
        let decoded = decode(&bytes).unwrap();

        assert_eq!(decoded.settings.padding_size, 4096);
        assert_eq!(decoded.kernel, image.kernel);
        assert_eq!(decoded.ramdisk, image.ramdisk);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let image = BootImage {
            settings: settings(4096, 4096),
            kernel: vec![1u8; 16],
            ramdisk: vec![2u8; 16],
            second: None,
        };

        let mut bytes = encode(&image).unwrap();
        bytes[0..8].copy_from_slice(b"BADMAGIC");

        assert!(matches!(decode(&bytes), Err(FormatError::BadMagic)));
    }

    #[test]
    fn test_checksum_mismatch_rejected() {
        let image = BootImage {
            settings: settings(4096, 4096),
            kernel: vec![1u8; 16],
            ramdisk: vec![2u8; 16],
            second: None,
        };

        let mut bytes = encode(&image).unwrap();
        // flip a kernel byte without touching the stored digest
        bytes[4096] ^= 0xFF;

        assert!(matches!(decode(&bytes), Err(FormatError::ChecksumMismatch)));
    }

    #[test]
    fn test_id_field_is_sha1_of_segments_and_sizes() {
        let kernel = vec![9u8; 123];
        let ramdisk = vec![8u8; 45];
        let image = BootImage {
            settings: settings(4096, 4096),
            kernel: kernel.clone(),
            ramdisk: ramdisk.clone(),
            second: None,
        };

        let bytes = encode(&image).unwrap();

        let mut sha = Sha1::new();
        sha.update(&kernel);
        sha.update((kernel.len() as u32).to_le_bytes());
        sha.update(&ramdisk);
        sha.update((ramdisk.len() as u32).to_le_bytes());
        sha.update(0u32.to_le_bytes());
        let digest: [u8; 20] = sha.finalize().into();

        // full 20-byte digest is written at offset 576
        assert_eq!(&bytes[576..596], &digest[..]);
    }

    #[test]
    fn test_segments_are_padding_aligned_with_zero_fill() {
        let image = BootImage {
            settings: settings(4096, 4096),
            kernel: vec![1u8; 100],
            ramdisk: vec![2u8; 200],
            second: Some(vec![3u8; 300]),
        };

        let bytes = encode(&image).unwrap();
        assert_eq!(bytes.len() % 4096, 0);
        assert_eq!(bytes.len(), 4 * 4096);

        // header page past the written header is zero
        assert!(bytes[596..4096].iter().all(|&b| b == 0));
        // kernel page past the kernel is zero
        assert!(bytes[4096 + 100..2 * 4096].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_name_and_cmdline_round_trip() {
        let mut cfg = settings(4096, 4096);
        cfg.name = "sixteen-bytes-xx".to_string();
        cfg.cmdline = "root=/dev/mmcblk0p2 rw console=ttyMSM0".to_string();
        let image = BootImage {
            settings: cfg,
            kernel: vec![1u8; 8],
            ramdisk: vec![2u8; 8],
            second: None,
        };

        let decoded = decode(&encode(&image).unwrap()).unwrap();
        assert_eq!(decoded.settings.name, "sixteen-bytes-xx");
        assert_eq!(decoded.settings.cmdline, image.settings.cmdline);
    }

    #[test]
    fn test_truncated_image_fails() {
        let image = BootImage {
            settings: settings(4096, 4096),
            kernel: vec![1u8; 100],
            ramdisk: vec![2u8; 100],
            second: None,
        };

        let bytes = encode(&image).unwrap();
        let result = decode(&bytes[..5000]);
        assert!(result.is_err());
    }
}
