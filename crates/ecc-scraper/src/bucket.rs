//! A [`BlobStore`] rooted at a local directory.
//!
//! Blob names map onto relative paths (`sweden/2024-05/Bensin.json`);
//! intermediate directories are created on demand.

use std::path::{Component, Path, PathBuf};

use ecc_core::collab::{BlobReceipt, BlobStore};
use sha2::{Digest, Sha256};
use tokio::fs;

use crate::error::{Error, Result};

pub struct FsBucket {
  root: PathBuf,
}

impl FsBucket {
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  pub fn root(&self) -> &Path { &self.root }

  fn path_of(&self, name: &str) -> Result<PathBuf> {
    let relative = Path::new(name);
    let plain = !name.is_empty()
      && relative.components().all(|c| matches!(c, Component::Normal(_)));
    if !plain {
      return Err(Error::InvalidBlobName(name.to_owned()));
    }
    Ok(self.root.join(relative))
  }
}

impl BlobStore for FsBucket {
  type Error = Error;

  async fn put(&self, name: &str, body: &[u8]) -> Result<BlobReceipt> {
    let path = self.path_of(name)?;
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).await?;
    }
    fs::write(&path, body).await?;

    Ok(BlobReceipt {
      name:   name.to_owned(),
      size:   body.len(),
      sha256: hex::encode(Sha256::digest(body)),
    })
  }
}
