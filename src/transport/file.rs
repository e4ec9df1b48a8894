use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tempfile::NamedTempFile;

use super::Transport;

/// Overwrites a single file per message.
///
/// Each send writes a temp file in the destination directory, syncs it and
/// renames it over the target, so readers see either the previous document
/// or the new one.
pub struct FileTransport {
    path: PathBuf,
    enabled: bool,
}

impl FileTransport {
    /// Creates the parent directory if needed. A directory that cannot be
    /// created leaves the transport disconnected.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let enabled = match ensure_parent(&path) {
            Ok(()) => true,
            Err(err) => {
                log::error!("FileTransport: {:#}", err);
                false
            }
        };
        Self { path, enabled }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_atomic(&self, data: &str) -> Result<()> {
        let dir = parent_dir(&self.path);
        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("create temp file in {}", dir.display()))?;
        tmp.write_all(data.as_bytes())
            .context("write temp file")?;
        tmp.flush().context("flush temp file")?;
        tmp.as_file().sync_all().context("sync temp file")?;
        tmp.persist(&self.path)
            .map_err(|err| anyhow!("rename into {}: {}", self.path.display(), err.error))?;
        Ok(())
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    let dir = parent_dir(path);
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create output directory {}", dir.display()))
}

impl Transport for FileTransport {
    fn send(&mut self, data: &str) -> bool {
        if !self.enabled {
            return false;
        }
        match self.write_atomic(data) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("FileTransport: write to {} failed: {:#}", self.path.display(), err);
                false
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.enabled
    }

    fn describe(&self) -> String {
        format!("file://{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_parent_and_replaces_contents() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested/out/results.json");
        let mut transport = FileTransport::new(&path);
        assert!(transport.is_connected());

        assert!(transport.send("{\"person\":1}"));
        assert!(transport.send("{\"person\":2}"));
        assert_eq!(std::fs::read_to_string(&path)?, "{\"person\":2}");

        let leftovers = std::fs::read_dir(path.parent().unwrap())?.count();
        assert_eq!(leftovers, 1, "temp files must not linger");
        Ok(())
    }

    #[test]
    fn uncreatable_directory_disables_transport() -> Result<()> {
        let blocker = tempfile::NamedTempFile::new()?;
        let mut transport = FileTransport::new(blocker.path().join("results.json"));
        assert!(!transport.is_connected());
        assert!(!transport.send("{}"));
        Ok(())
    }

    #[test]
    fn failed_replace_reports_false_and_cleans_up() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("results.json");
        std::fs::create_dir(&path)?;
        let mut transport = FileTransport::new(&path);
        assert!(transport.is_connected());

        assert!(!transport.send("{\"person\":1}"));
        assert!(transport.is_connected());
        assert!(path.is_dir());
        let entries: Vec<_> = std::fs::read_dir(dir.path())?
            .map(|e| e.map(|e| e.file_name()))
            .collect::<std::io::Result<_>>()?;
        assert_eq!(entries, vec![std::ffi::OsString::from("results.json")]);
        Ok(())
    }
}
