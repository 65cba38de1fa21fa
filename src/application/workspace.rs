//! Scratch directories for render-stage intermediates.

use std::io::{self, ErrorKind};
use std::path::{Component, Path, PathBuf};

use tokio::fs;

/// File left in place when a scratch directory is cleaned.
pub const KEEP_MARKER: &str = ".gitkeep";

const TEMP_DIR: &str = "temp";
const OUTPUT_DIR: &str = "videos";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchDirs {
    /// Downloaded audio and image sources.
    pub temp: PathBuf,
    /// Encoded videos awaiting publish.
    pub output: PathBuf,
}

/// Hands out per-artifact scratch directories below a root.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Paths for `key` without touching the filesystem.
    pub fn scratch_for(&self, key: &str) -> io::Result<ScratchDirs> {
        let mut components = Path::new(key).components();
        let valid = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !valid {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("scratch key `{key}` must be a single path component"),
            ));
        }

        let base = self.root.join(key);
        Ok(ScratchDirs {
            temp: base.join(TEMP_DIR),
            output: base.join(OUTPUT_DIR),
        })
    }

    /// Ensure both scratch directories for `key` exist and are empty apart
    /// from the keep marker.
    pub async fn prepare(&self, key: &str) -> io::Result<ScratchDirs> {
        let dirs = self.scratch_for(key)?;
        clean_directory(&dirs.temp).await?;
        clean_directory(&dirs.output).await?;
        Ok(dirs)
    }

    /// Remove every scratch directory of `key`. Missing directories are fine.
    pub async fn release(&self, key: &str) -> io::Result<()> {
        self.scratch_for(key)?;
        match fs::remove_dir_all(self.root.join(key)).await {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

/// Create `path` if needed and delete everything in it except [`KEEP_MARKER`].
pub async fn clean_directory(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path).await?;

    let mut entries = fs::read_dir(path).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_name() == KEEP_MARKER {
            continue;
        }

        let file_type = entry.file_type().await?;
        if file_type.is_dir() {
            fs::remove_dir_all(entry.path()).await?;
        } else {
            fs::remove_file(entry.path()).await?;
        }
    }

    Ok(())
}
