//! Error type shared by the codec modules.

use std::io;

/// Errors produced while encoding or decoding boot images and their
/// ramdisk archives.
///
/// All of these are terminal for the operation in progress; nothing is
/// retried and partially written output is left as-is.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// The image does not start with the boot image magic.
    #[error("not a boot image: bad magic")]
    BadMagic,
    /// The checksum stored in the header does not match the image contents.
    #[error("boot image checksum mismatch")]
    ChecksumMismatch,
    /// A segment or name is too large for its 32-bit size field.
    #[error("{0} bytes does not fit a 32-bit size field")]
    SizeOverflow(usize),
    /// A cpio record does not start with a recognized newc magic.
    #[error("not a newc cpio record: bad magic")]
    BadCpioMagic,
    /// A cpio header field holds bytes that are not hex digits.
    #[error("cpio header field '{0}' is not valid hex")]
    BadHexField(&'static str),
    /// A cpio record is neither a directory, a regular file nor a symlink.
    #[error("unsupported cpio entry type {mode:#o} for '{name}'")]
    UnsupportedEntryType { name: String, mode: u32 },
    /// The archive ended before its trailer record.
    #[error("cpio archive truncated before trailer")]
    TruncatedArchive,
    /// The compressed ramdisk stream could not be decompressed.
    #[error("corrupt compressed ramdisk stream")]
    CorruptCompressedStream(#[source] io::Error),
    /// An I/O failure from the underlying reader, writer or filesystem.
    #[error(transparent)]
    Io(#[from] io::Error),
}
