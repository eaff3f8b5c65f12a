//! Build-output path resolution and fixed constants.
//!
//! Long has no user-facing configuration file: the only "configuration" is
//! where build artifacts land, and that is derived by walking up from the
//! current directory to the nearest `Cargo.toml`, not read from an env var
//! or TOML file.

use std::path::{Path, PathBuf};

pub const BLOCK_SIZE: usize = 4096;
pub const FLOPPY_SIZE: usize = 1_474_560;
pub const SECTOR_SIZE: usize = 512;
pub const STAGE1_SIZE: usize = 512;

pub const STAGE2_START_MARKER: &str = "; === LONGC_PROGRAM_START";
pub const STAGE2_END_MARKER: &str = "; === LONGC_PROGRAM_END";

/// Walk up from the current directory looking for a `Cargo.toml`; fall back
/// to the current directory if none is found (e.g. running from an installed
/// binary outside any checkout).
pub fn repo_root() -> PathBuf {
    let mut dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    loop {
        if dir.join("Cargo.toml").is_file() {
            return dir;
        }
        match dir.parent() {
            Some(parent) => dir = parent.to_path_buf(),
            None => return std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

pub fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

pub fn build_dir() -> PathBuf {
    repo_root().join("build")
}

pub fn fs_db_path() -> PathBuf {
    build_dir().join("lush_fs.json")
}

pub fn hardware_log_path() -> PathBuf {
    build_dir().join("hardware_output.log")
}

pub fn boot_template_dir() -> PathBuf {
    repo_root().join("boot")
}

pub fn stage1_template_path() -> PathBuf {
    boot_template_dir().join("boot_stage1.asm")
}

pub fn stage2_template_path() -> PathBuf {
    boot_template_dir().join("boot_stage2.asm")
}

pub fn default_boot_image_path() -> PathBuf {
    build_dir().join("boot.img")
}
