//! Boot settings sidecar.
//!
//! The load addresses, page size, board name and kernel command line
//! extracted from an image header travel through unpack and pack as a
//! [`BootSettings`] value. Between runs it is persisted as a small TOML
//! file next to the unpacked segments, so the addresses a vendor image
//! shipped with are written back verbatim instead of being recomputed.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// File name of the settings sidecar inside an unpacked image directory.
pub const SETTINGS_FILE: &str = "bootcfg.toml";

/// Header fields that round-trip opaquely between unpack and pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootSettings {
    pub kernel_addr: u32,
    pub ramdisk_addr: u32,
    pub second_addr: u32,
    pub tags_addr: u32,
    pub page_size: u32,
    pub name: String,
    pub cmdline: String,
    /// Effective segment alignment. Usually equal to `page_size`, but 4096
    /// for images that keep a 2048-byte header page in front of 4096-byte
    /// aligned segments.
    pub padding_size: u32,
}

impl BootSettings {
    /// Load settings from a TOML sidecar.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading boot settings '{}'", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("parsing boot settings '{}'", path.display()))
    }

    /// Save settings as a TOML sidecar.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self).context("serializing boot settings")?;
        fs::write(path, text)
            .with_context(|| format!("writing boot settings '{}'", path.display()))
    }
}
