//! `server.conf`, the key=value file read by QuestDB at startup.

use std::collections::BTreeMap;
use std::path::Path;

use super::Layout;
use crate::config::QuestDbSettings;
use crate::{PlayError, PlayResult, ResultExt};

pub const QUERY_TIMEOUT_SEC: &str = "query.timeout.sec";
pub const COPY_ROOT: &str = "cairo.sql.copy.root";
pub const COPY_WORK_ROOT: &str = "cairo.sql.copy.work.root";
pub const BACKUP_ROOT: &str = "cairo.sql.backup.root";
pub const VALIDATION_STRICT: &str = "config.validation.strict";
pub const HTTP_BIND: &str = "http.bind.to";
pub const PG_BIND: &str = "pg.net.bind.to";
pub const ILP_BIND: &str = "line.tcp.net.bind.to";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerConf {
    entries: BTreeMap<String, String>,
}

impl ServerConf {
    pub fn from_settings(settings: &QuestDbSettings, layout: &Layout) -> Self {
        let mut conf = Self::default();
        conf.set(QUERY_TIMEOUT_SEC, settings.query_timeout_sec.to_string());
        conf.set(COPY_ROOT, layout.csv.display().to_string());
        conf.set(COPY_WORK_ROOT, layout.tmp.display().to_string());
        conf.set(BACKUP_ROOT, layout.backups.display().to_string());
        conf.set(VALIDATION_STRICT, settings.strict_validation.to_string());
        conf.set(HTTP_BIND, format!("0.0.0.0:{}", settings.http_port));
        conf.set(PG_BIND, format!("0.0.0.0:{}", settings.pg_port));
        conf.set(ILP_BIND, format!("0.0.0.0:{}", settings.ilp_port));
        conf
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One `key=value` per line, sorted by key
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{}={}\n", k, v))
            .collect()
    }

    pub fn parse(text: &str) -> PlayResult<Self> {
        let mut conf = Self::default();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                PlayError::configuration(format!("server.conf line {}: expected key=value", lineno + 1))
            })?;
            conf.set(key.trim(), value.trim());
        }
        Ok(conf)
    }

    pub fn write(&self, path: &Path) -> PlayResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_path_context(parent)?;
        }
        std::fs::write(path, self.render()).with_path_context(path)
    }

    pub fn read(path: &Path) -> PlayResult<Self> {
        let text = std::fs::read_to_string(path).with_path_context(path)?;
        Self::parse(&text)
    }

    /// Entries of `self` that `actual` lacks or holds with another value
    pub fn missing_from<'a>(&'a self, actual: &ServerConf) -> Vec<(&'a str, &'a str)> {
        self.entries
            .iter()
            .filter(|(k, v)| actual.get(k) != Some(v.as_str()))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn expected_conf() -> ServerConf {
        ServerConf::from_settings(&QuestDbSettings::default(), &Layout::new("/opt/questdb"))
    }

    #[test]
    fn test_from_settings() {
        let conf = expected_conf();
        assert_eq!(conf.get(QUERY_TIMEOUT_SEC), Some("60"));
        assert_eq!(conf.get(COPY_ROOT), Some("/opt/questdb/csv"));
        assert_eq!(conf.get(COPY_WORK_ROOT), Some("/opt/questdb/tmp"));
        assert_eq!(conf.get(BACKUP_ROOT), Some("/opt/questdb/backups"));
        assert_eq!(conf.get(VALIDATION_STRICT), Some("true"));
        assert_eq!(conf.get(PG_BIND), Some("0.0.0.0:8812"));
        assert_eq!(conf.len(), 8);
    }

    #[test]
    fn test_render_is_sorted_key_value_lines() {
        let mut conf = ServerConf::default();
        conf.set("b.key", "2");
        conf.set("a.key", "1");
        assert_eq!(conf.render(), "a.key=1\nb.key=2\n");
    }

    #[test]
    fn test_parse_skips_comments_and_blank_lines() {
        let conf = ServerConf::parse("# generated\n\nquery.timeout.sec = 30\ncairo.sql.copy.root=/data/csv\n").unwrap();
        assert_eq!(conf.get(QUERY_TIMEOUT_SEC), Some("30"));
        assert_eq!(conf.get(COPY_ROOT), Some("/data/csv"));
        assert_eq!(conf.len(), 2);
    }

    #[test]
    fn test_parse_rejects_lines_without_separator() {
        let result = ServerConf::parse("query.timeout.sec=30\nnot a pair\n");
        match result {
            Err(PlayError::Configuration { message }) => assert!(message.contains("line 2")),
            other => panic!("Expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("conf").join("server.conf");
        let conf = expected_conf();

        conf.write(&path).unwrap();
        assert_eq!(ServerConf::read(&path).unwrap(), conf);
    }

    #[test]
    fn test_missing_from() {
        let expected = expected_conf();
        let mut actual = expected.clone();
        actual.set(QUERY_TIMEOUT_SEC, "5");
        actual.set("extra.key", "ignored");

        let diff = expected.missing_from(&actual);
        assert_eq!(diff, vec![(QUERY_TIMEOUT_SEC, "60")]);
        assert!(expected.missing_from(&expected).is_empty());
    }
}
