//! Single cpio newc record codec.
//!
//! A record is a 110-byte ASCII header (6-byte magic plus thirteen
//! 8-digit uppercase hex fields), the NUL-terminated entry name padded so
//! that header plus name land on a 4-byte boundary, and a body padded to a
//! 4-byte boundary. The archive ends with a sentinel record named
//! `TRAILER!!!`.

use std::io::{self, Read};

use crate::align::align;
use crate::error::FormatError;

/// Magic of the newc header format.
pub const MAGIC_NEWC: &str = "070701";
/// Magic of the crc variant; the Linux kernel emits it for initramfs.
pub const MAGIC_CRC: &str = "070702";

/// Name of the sentinel record that ends every archive.
pub const TRAILER_NAME: &str = "TRAILER!!!";

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;
const S_IFREG: u32 = 0o100000;
const S_IFDIR: u32 = 0o040000;

/// Header field names, in on-disk order, for error reporting.
const FIELD_NAMES: [&str; 13] = [
    "ino",
    "mode",
    "uid",
    "gid",
    "nlink",
    "mtime",
    "filesize",
    "devmajor",
    "devminor",
    "rdevmajor",
    "rdevminor",
    "namesize",
    "check",
];

/// Payload of one archive record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryBody {
    /// Directories carry no body.
    Directory,
    /// Regular file contents.
    File(Vec<u8>),
    /// Symlink target path.
    Symlink(String),
}

/// One archive record: a path, its inode metadata and its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpioEntry {
    /// Relative path inside the archived tree.
    pub name: String,
    pub ino: u32,
    /// Full `st_mode`: type bits plus permission bits.
    pub mode: u32,
    pub body: EntryBody,
}

impl CpioEntry {
    /// Permission bits to apply when materializing this entry.
    pub fn permissions(&self) -> u32 {
        self.mode & 0o777
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self.body, EntryBody::Symlink(_))
    }
}

/// Append one encoded record to `out`.
pub fn encode_entry(entry: &CpioEntry, out: &mut Vec<u8>) -> Result<(), FormatError> {
    let filesize = match &entry.body {
        EntryBody::Directory => 0,
        EntryBody::File(data) => data.len(),
        EntryBody::Symlink(target) => target.len(),
    };
    let filesize = u32::try_from(filesize).map_err(|_| FormatError::SizeOverflow(filesize))?;
    let namesize = entry.name.len() + 1;
    let namesize = u32::try_from(namesize).map_err(|_| FormatError::SizeOverflow(namesize))?;

    // field order matches FIELD_NAMES; uid, gid, mtime and the device
    // numbers are always written as zero in this profile
    write_header(
        out,
        &[
            entry.ino,
            entry.mode,
            0,
            0,
            1,
            0,
            filesize,
            0,
            0,
            0,
            0,
            namesize,
            0,
        ],
    );
    write_name(out, &entry.name);

    match &entry.body {
        EntryBody::Directory => {}
        EntryBody::File(data) => write_body(out, data),
        EntryBody::Symlink(target) => write_body(out, target.as_bytes()),
    }
    Ok(())
}

/// Append the terminal sentinel record to `out`.
pub fn encode_trailer(out: &mut Vec<u8>) {
    let namesize = TRAILER_NAME.len() as u32 + 1;
    write_header(out, &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, namesize, 0]);
    write_name(out, TRAILER_NAME);
}

/// Decode the next record from `reader`.
///
/// Returns `Ok(None)` when the trailer sentinel is reached; nothing past
/// it is read.
pub fn decode_entry(reader: &mut impl Read) -> Result<Option<CpioEntry>, FormatError> {
    let mut magic = [0u8; 6];
    read_or_truncated(reader, &mut magic)?;
    if magic != MAGIC_NEWC.as_bytes() && magic != MAGIC_CRC.as_bytes() {
        return Err(FormatError::BadCpioMagic);
    }

    let mut raw = [0u8; 8 * 13];
    read_or_truncated(reader, &mut raw)?;
    let mut fields = [0u32; 13];
    for (index, field) in fields.iter_mut().enumerate() {
        let text = std::str::from_utf8(&raw[index * 8..index * 8 + 8])
            .map_err(|_| FormatError::BadHexField(FIELD_NAMES[index]))?;
        *field = u32::from_str_radix(text, 16)
            .map_err(|_| FormatError::BadHexField(FIELD_NAMES[index]))?;
    }
    let ino = fields[0];
    let mode = fields[1];
    let filesize = fields[6] as usize;
    let namesize = fields[11] as usize;
    if namesize == 0 {
        return Err(FormatError::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            "cpio record with zero namesize",
        )));
    }

    // mirrors the encoder's padding arithmetic
    let namesize_align = align(namesize + 2, 4) - 2;
    let filesize_align = align(filesize, 4);

    let mut name_buf = vec![0u8; namesize - 1];
    read_or_truncated(reader, &mut name_buf)?;
    let name = String::from_utf8_lossy(&name_buf).into_owned();
    if name == TRAILER_NAME {
        return Ok(None);
    }
    skip(reader, namesize_align - namesize + 1)?;
    let name = match name.strip_prefix('/') {
        // absolute paths are rewritten as relative
        Some(rest) => rest.to_string(),
        None => name,
    };

    let mut body = vec![0u8; filesize];
    if filesize > 0 {
        read_or_truncated(reader, &mut body)?;
    }
    skip(reader, filesize_align - filesize)?;

    let body = match mode & S_IFMT {
        S_IFLNK => EntryBody::Symlink(String::from_utf8_lossy(&body).into_owned()),
        S_IFREG => EntryBody::File(body),
        S_IFDIR => EntryBody::Directory,
        _ => return Err(FormatError::UnsupportedEntryType { name, mode }),
    };

    Ok(Some(CpioEntry {
        name,
        ino,
        mode,
        body,
    }))
}

fn write_header(out: &mut Vec<u8>, fields: &[u32; 13]) {
    out.extend_from_slice(MAGIC_NEWC.as_bytes());
    for field in fields {
        out.extend_from_slice(format!("{field:08X}").as_bytes());
    }
}

/// Write the name, its terminating NUL and the pad bytes that bring
/// header plus name to a 4-byte boundary.
fn write_name(out: &mut Vec<u8>, name: &str) {
    out.extend_from_slice(name.as_bytes());
    let padded = align(name.len() + 1 + 2, 4) - 2;
    out.resize(out.len() + (padded - name.len()), 0);
}

fn write_body(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(data);
    out.resize(out.len() + (align(data.len(), 4) - data.len()), 0);
}

fn read_or_truncated(reader: &mut impl Read, buf: &mut [u8]) -> Result<(), FormatError> {
    reader.read_exact(buf).map_err(|err| match err.kind() {
        io::ErrorKind::UnexpectedEof => FormatError::TruncatedArchive,
        _ => FormatError::Io(err),
    })
}

fn skip(reader: &mut impl Read, count: usize) -> Result<(), FormatError> {
    debug_assert!(count <= 4);
    let mut pad = [0u8; 4];
    read_or_truncated(reader, &mut pad[..count])
}
