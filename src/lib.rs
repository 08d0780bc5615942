//! Boot image and ramdisk codec toolkit.
//!
//! Packs and unpacks the three-layer container used to distribute a
//! bootable kernel: a fixed-layout boot image wrapping a kernel blob, a
//! gzip-compressed cpio newc ramdisk, and an optional second-stage blob.
//!
//! - [`image`] - outer boot image header, segment padding, content checksum
//! - [`archive`] - cpio newc entry and container codec
//! - [`ramdisk`] - gzip adapter between image segments and archives
//! - [`filesystem`] - directory snapshots and entry materialization
//! - [`settings`] - the TOML sidecar carrying header fields between runs
//!
//! # Example
//!
//! ```rust,ignore
//! use bootimg_tools::{filesystem, image, ramdisk};
//! use std::path::Path;
//!
//! let bytes = std::fs::read("boot.img")?;
//! let boot = image::decode(&bytes)?;
//! let entries = ramdisk::unpack_entries(&boot.ramdisk)?;
//! filesystem::materialize_tree(Path::new("initrd"), &entries)?;
//! ```

pub mod align;
pub mod archive;
pub mod error;
pub mod filesystem;
pub mod image;
pub mod ramdisk;
pub mod settings;

pub use archive::entry::{CpioEntry, EntryBody};
pub use error::FormatError;
pub use image::BootImage;
pub use settings::BootSettings;
