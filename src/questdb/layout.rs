use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{PlayResult, ResultExt};

/// Directory tree of a QuestDB install, derived from its root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub root: PathBuf,
    /// Unpacked release, holds `questdb.jar`
    pub bin: PathBuf,
    /// Server root passed with `-d`
    pub data: PathBuf,
    pub db: PathBuf,
    pub conf: PathBuf,
    pub log: PathBuf,
    pub csv: PathBuf,
    pub tmp: PathBuf,
    pub backups: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let data = root.join("data");
        Self {
            bin: root.join("bin"),
            db: data.join("db"),
            conf: data.join("conf"),
            log: data.join("log"),
            csv: root.join("csv"),
            tmp: root.join("tmp"),
            backups: root.join("backups"),
            data,
            root,
        }
    }

    pub fn jar_path(&self) -> PathBuf {
        self.bin.join("questdb.jar")
    }

    pub fn server_conf_path(&self) -> PathBuf {
        self.conf.join("server.conf")
    }

    pub fn log_path(&self) -> PathBuf {
        self.log.join("questdb.log")
    }

    pub fn state_path(&self) -> PathBuf {
        self.root.join("questplay.state")
    }

    pub fn is_installed(&self) -> bool {
        self.jar_path().is_file()
    }

    /// Directories that must exist before QuestDB starts
    pub fn directories(&self) -> Vec<&Path> {
        vec![
            self.root.as_path(),
            self.data.as_path(),
            self.db.as_path(),
            self.conf.as_path(),
            self.log.as_path(),
            self.csv.as_path(),
            self.tmp.as_path(),
            self.backups.as_path(),
        ]
    }

    /// Create every directory of the layout plus `extra` mount points. Idempotent.
    pub fn ensure(&self, extra: &[PathBuf]) -> PlayResult<()> {
        for dir in self.directories().into_iter().chain(extra.iter().map(|p| p.as_path())) {
            std::fs::create_dir_all(dir).with_path_context(dir)?;
            debug!("Ensured directory {}", dir.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_paths_derive_from_root() {
        let layout = Layout::new("/opt/questdb");
        assert_eq!(layout.jar_path(), PathBuf::from("/opt/questdb/bin/questdb.jar"));
        assert_eq!(layout.server_conf_path(), PathBuf::from("/opt/questdb/data/conf/server.conf"));
        assert_eq!(layout.log_path(), PathBuf::from("/opt/questdb/data/log/questdb.log"));
        assert_eq!(layout.csv, PathBuf::from("/opt/questdb/csv"));
        assert_eq!(layout.backups, PathBuf::from("/opt/questdb/backups"));
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path().join("questdb"));
        let extra = vec![dir.path().join("vol1"), dir.path().join("vol2")];

        layout.ensure(&extra).unwrap();
        layout.ensure(&extra).unwrap();

        for d in layout.directories() {
            assert!(d.is_dir(), "{} should exist", d.display());
        }
        assert!(extra.iter().all(|p| p.is_dir()));
        assert!(!layout.is_installed());
    }
}
