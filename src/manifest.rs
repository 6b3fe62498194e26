//! Per-category ledger of generated files.
//!
//! Each output category (providers, resources, adhoc, backend) keeps a
//! hidden sidecar `.manifest.<category>` in the output directory recording
//! the files written last run and a hash of their content. On the next run
//! the ledger is used to delete stale files before regeneration.

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub file: String,
    pub hash: String,
}

#[derive(Debug)]
pub struct Manifest {
    name: String,
    outdir: PathBuf,
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Open the manifest for `name` under `outdir`, loading the persisted
    /// ledger if one exists. A missing or corrupt sidecar degrades to an
    /// empty ledger; the only consequence is that stale files from the
    /// previous run are not cleaned up.
    pub fn open<S: Into<String>, P: Into<PathBuf>>(name: S, outdir: P) -> Self {
        let mut manifest = Self {
            name: name.into(),
            outdir: outdir.into(),
            entries: Vec::new(),
        };
        manifest.load();
        manifest
    }

    fn sidecar_path(&self) -> PathBuf {
        self.outdir.join(format!(".manifest.{}", self.name))
    }

    fn load(&mut self) {
        let path = self.sidecar_path();
        if !path.exists() {
            return;
        }
        match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Vec<ManifestEntry>>(&content) {
                Ok(entries) => self.entries = entries,
                Err(err) => {
                    warn!(
                        "ignoring corrupt manifest {}: {}",
                        path.display(),
                        err
                    );
                }
            },
            Err(err) => {
                warn!("failed to read manifest {}: {}", path.display(), err);
            }
        }
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Delete every file the persisted ledger refers to (if still present)
    /// and reset the in-memory ledger. Must run before any writes in a
    /// regeneration pass.
    pub fn clear_files(&mut self) -> Result<()> {
        for entry in &self.entries {
            let path = self.outdir.join(&entry.file);
            if path.exists() {
                fs::remove_file(&path)
                    .with_context(|| format!("removing stale file {}", path.display()))?;
            }
        }
        self.entries.clear();
        Ok(())
    }

    /// Write `content` to `file` (relative to the output directory) and
    /// record it in the ledger. The hash is for change detection only.
    pub fn write_file(&mut self, file: &str, content: &str) -> Result<()> {
        let hash = content_hash(content);
        self.entries.push(ManifestEntry {
            file: file.to_owned(),
            hash,
        });

        fs::create_dir_all(&self.outdir)
            .with_context(|| format!("creating output directory {}", self.outdir.display()))?;
        let path = self.outdir.join(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Persist the ledger as pretty-printed JSON, via a temp file rename so
    /// a crash never leaves a truncated sidecar.
    pub fn save(&self) -> Result<()> {
        let path = self.sidecar_path();
        let json = serde_json::to_string_pretty(&self.entries)? + "\n";
        fs::create_dir_all(&self.outdir)
            .with_context(|| format!("creating output directory {}", self.outdir.display()))?;
        let tmp = self.outdir.join(format!(".manifest.{}.tmp", self.name));
        fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("renaming {} to {}", tmp.display(), path.display()))?;
        Ok(())
    }
}

fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
