// Local workspace layout: the fixed directory convention under a base
// directory, created idempotently at startup.

use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

const IGNORE_RULES: &str = "*\n\
!files/\n\
!files/litematic/\n\
!files/images/\n\
!files/litematic/**\n\
!files/images/**\n\
!.repo/\n";

/// Relative location of schematic files, both in the workspace and in the
/// checkout.
pub const LITEMATIC_DIR: &str = "files/litematic";
/// Relative location of preview images.
pub const IMAGES_DIR: &str = "files/images";

/// All paths the tool works with, derived from one base directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    base: PathBuf,
}

impl Workspace {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Workspace { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn litematic_dir(&self) -> PathBuf {
        self.base.join(LITEMATIC_DIR)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.base.join(IMAGES_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.base.join("config.json")
    }

    pub fn ignore_file(&self) -> PathBuf {
        self.base.join(".gitignore")
    }

    /// The hidden git checkout that uploads are staged in.
    pub fn checkout_dir(&self) -> PathBuf {
        self.base.join(".repo")
    }

    /// Create the content directories and the checkout directory, and write
    /// the ignore rules if they are not there yet. Safe to call on every
    /// start.
    pub fn prepare(&self) -> Result<()> {
        fs::create_dir_all(self.litematic_dir())?;
        fs::create_dir_all(self.images_dir())?;
        fs::create_dir_all(self.checkout_dir())?;
        self.ensure_ignore_file()
    }

    fn ensure_ignore_file(&self) -> Result<()> {
        let path = self.ignore_file();
        if path.exists() {
            return Ok(());
        }
        fs::write(&path, IGNORE_RULES)?;
        log::debug!("wrote ignore rules to {}", path.display());
        Ok(())
    }
}
