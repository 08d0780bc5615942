use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use bootimg_tools::settings::SETTINGS_FILE;
use bootimg_tools::{archive, filesystem, image, ramdisk, BootImage, BootSettings};

/// Kernel blob file name inside an unpacked image directory.
const KERNEL_FILE: &str = "zImage";
/// Optional second-stage blob file name.
const SECOND_FILE: &str = "second.img";
/// Subdirectory holding the extracted ramdisk tree.
const INITRD_DIR: &str = "initrd";

fn usage() -> &'static str {
    "Usage:\n  bootimg-tools unpack [boot.img] [dir]\n  bootimg-tools pack [boot.img] [dir]\n  bootimg-tools ramdisk <pack|unpack> <initrd.gz> <dir>\n  bootimg-tools cpio <pack|unpack> <archive.cpio> <dir>"
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.as_slice() {
        [cmd] if cmd == "unpack" => unpack_image(Path::new("boot.img"), Path::new("boot")),
        [cmd, img] if cmd == "unpack" => unpack_image(Path::new(img), Path::new("boot")),
        [cmd, img, dir] if cmd == "unpack" => unpack_image(Path::new(img), Path::new(dir)),
        [cmd] if cmd == "pack" => pack_image(Path::new("boot.img"), Path::new("boot")),
        [cmd, img] if cmd == "pack" => pack_image(Path::new(img), Path::new("boot")),
        [cmd, img, dir] if cmd == "pack" => pack_image(Path::new(img), Path::new(dir)),
        [sub, cmd, file, dir] if sub == "ramdisk" && cmd == "pack" => {
            ramdisk_pack(Path::new(file), Path::new(dir))
        }
        [sub, cmd, file, dir] if sub == "ramdisk" && cmd == "unpack" => {
            ramdisk_unpack(Path::new(file), Path::new(dir))
        }
        [sub, cmd, file, dir] if sub == "cpio" && cmd == "pack" => {
            cpio_pack(Path::new(file), Path::new(dir))
        }
        [sub, cmd, file, dir] if sub == "cpio" && cmd == "unpack" => {
            cpio_unpack(Path::new(file), Path::new(dir))
        }
        _ => bail!(usage()),
    }
}

/// Unpack a boot image into `dir`: settings sidecar, kernel blob,
/// extracted ramdisk tree and, if present, the second-stage blob.
fn unpack_image(img: &Path, dir: &Path) -> Result<()> {
    let bytes = fs::read(img).with_context(|| format!("reading boot image '{}'", img.display()))?;
    let boot = image::decode(&bytes)
        .with_context(|| format!("decoding boot image '{}'", img.display()))?;

    fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory '{}'", dir.display()))?;

    let cfg = dir.join(SETTINGS_FILE);
    boot.settings.save(&cfg)?;
    println!("{}", cfg.display());

    let kernel = dir.join(KERNEL_FILE);
    fs::write(&kernel, &boot.kernel)
        .with_context(|| format!("writing kernel '{}'", kernel.display()))?;
    println!("{}", kernel.display());

    let initrd = dir.join(INITRD_DIR);
    let entries = ramdisk::unpack_entries(&boot.ramdisk)
        .with_context(|| format!("unpacking ramdisk of '{}'", img.display()))?;
    filesystem::materialize_tree(&initrd, &entries)
        .with_context(|| format!("extracting ramdisk into '{}'", initrd.display()))?;
    for entry in &entries {
        println!("{}", initrd.join(&entry.name).display());
    }

    if let Some(second) = &boot.second {
        let path = dir.join(SECOND_FILE);
        fs::write(&path, second)
            .with_context(|| format!("writing second stage '{}'", path.display()))?;
        println!("{}", path.display());
    }

    Ok(())
}

/// Pack the layout produced by [`unpack_image`] back into a boot image.
/// A missing second-stage blob means the image carries none.
fn pack_image(img: &Path, dir: &Path) -> Result<()> {
    let settings = BootSettings::load(&dir.join(SETTINGS_FILE))?;

    let kernel_path = dir.join(KERNEL_FILE);
    let kernel = fs::read(&kernel_path)
        .with_context(|| format!("reading kernel '{}'", kernel_path.display()))?;

    let second_path = dir.join(SECOND_FILE);
    let second = if second_path.exists() {
        Some(
            fs::read(&second_path)
                .with_context(|| format!("reading second stage '{}'", second_path.display()))?,
        )
    } else {
        None
    };

    let initrd = dir.join(INITRD_DIR);
    let entries = filesystem::snapshot_tree(&initrd)
        .with_context(|| format!("snapshotting ramdisk tree '{}'", initrd.display()))?;
    for entry in &entries {
        println!("{}", entry.name);
    }
    let ramdisk_bytes = ramdisk::pack_entries(&entries).context("packing ramdisk")?;

    let boot = BootImage {
        settings,
        kernel,
        ramdisk: ramdisk_bytes,
        second,
    };
    let bytes =
        image::encode(&boot).with_context(|| format!("encoding boot image '{}'", img.display()))?;
    fs::write(img, bytes).with_context(|| format!("writing boot image '{}'", img.display()))?;

    Ok(())
}

fn ramdisk_pack(file: &Path, dir: &Path) -> Result<()> {
    let entries = filesystem::snapshot_tree(dir)
        .with_context(|| format!("snapshotting '{}'", dir.display()))?;
    for entry in &entries {
        println!("{}", entry.name);
    }
    let ramdisk_bytes = ramdisk::pack_entries(&entries).context("packing ramdisk")?;
    fs::write(file, ramdisk_bytes)
        .with_context(|| format!("writing ramdisk '{}'", file.display()))?;
    Ok(())
}

fn ramdisk_unpack(file: &Path, dir: &Path) -> Result<()> {
    let bytes =
        fs::read(file).with_context(|| format!("reading ramdisk '{}'", file.display()))?;
    let entries = ramdisk::unpack_entries(&bytes)
        .with_context(|| format!("unpacking ramdisk '{}'", file.display()))?;
    filesystem::materialize_tree(dir, &entries)
        .with_context(|| format!("extracting into '{}'", dir.display()))?;
    for entry in &entries {
        println!("{}", entry.name);
    }
    Ok(())
}

fn cpio_pack(file: &Path, dir: &Path) -> Result<()> {
    let entries = filesystem::snapshot_tree(dir)
        .with_context(|| format!("snapshotting '{}'", dir.display()))?;
    for entry in &entries {
        println!("{}", entry.name);
    }
    let bytes = archive::encode(&entries).context("encoding cpio archive")?;
    fs::write(file, bytes).with_context(|| format!("writing archive '{}'", file.display()))?;
    Ok(())
}

fn cpio_unpack(file: &Path, dir: &Path) -> Result<()> {
    let bytes =
        fs::read(file).with_context(|| format!("reading archive '{}'", file.display()))?;
    let entries = archive::decode(&bytes)
        .with_context(|| format!("decoding archive '{}'", file.display()))?;
    filesystem::materialize_tree(dir, &entries)
        .with_context(|| format!("extracting into '{}'", dir.display()))?;
    for entry in &entries {
        println!("{}", entry.name);
    }
    Ok(())
}
