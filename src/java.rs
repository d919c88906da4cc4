//! Locating the Java runtime that hosts QuestDB.

use std::fmt;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::{PlayError, PlayResult, ResultExt};

/// Oldest Java release the QuestDB module launch works on
pub const MIN_JAVA_MAJOR: u32 = 11;

const JAVA_BIN: &str = if cfg!(windows) { "java.exe" } else { "java" };

/// Resolve the `java` executable.
///
/// Order: explicit home, `$JAVA_HOME/bin`, then `PATH`.
pub fn find_java(java_home: Option<&Path>) -> PlayResult<PathBuf> {
    let env_home = std::env::var_os("JAVA_HOME").map(PathBuf::from);
    let path_var = std::env::var_os("PATH");
    resolve_java(java_home, env_home.as_deref(), path_var.as_deref())
}

fn resolve_java(
    explicit_home: Option<&Path>,
    env_home: Option<&Path>,
    path_var: Option<&std::ffi::OsStr>,
) -> PlayResult<PathBuf> {
    if let Some(home) = explicit_home.or(env_home) {
        let candidate = home.join("bin").join(JAVA_BIN);
        if candidate.is_file() {
            debug!("Using java from {}", candidate.display());
            return Ok(candidate);
        }
        return Err(PlayError::java(format!(
            "no {} under {}",
            JAVA_BIN,
            home.join("bin").display()
        )));
    }

    path_var
        .into_iter()
        .flat_map(|paths| std::env::split_paths(paths))
        .map(|dir| dir.join(JAVA_BIN))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| PlayError::java("java not found on PATH and JAVA_HOME is not set"))
}

/// A Java version as reported by `java -version`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct JavaVersion {
    pub major: u32,
    pub minor: u32,
}

impl JavaVersion {
    /// Parse the first quoted version string, e.g. `openjdk version "17.0.2" 2022-01-18`.
    ///
    /// Legacy `1.x` versions report `x` as the major version.
    pub fn parse(output: &str) -> Option<Self> {
        let start = output.find('"')? + 1;
        let end = start + output[start..].find('"')?;
        let version = &output[start..end];

        let mut parts = version
            .split(|c: char| c == '.' || c == '_' || c == '-' || c == '+')
            .map(|p| p.parse::<u32>().ok());

        let first = parts.next()??;
        let second = parts.next().flatten().unwrap_or(0);
        if first == 1 {
            let third = parts.next().flatten().unwrap_or(0);
            Some(Self { major: second, minor: third })
        } else {
            Some(Self { major: first, minor: second })
        }
    }

    pub fn is_supported(&self) -> bool {
        self.major >= MIN_JAVA_MAJOR
    }
}

impl fmt::Display for JavaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Run `java -version` and parse what it prints on stderr
pub async fn detect_version(java: &Path) -> PlayResult<JavaVersion> {
    let program = java.display().to_string();
    let output = Command::new(java)
        .arg("-version")
        .output()
        .await
        .with_program_context(&program)?;

    if !output.status.success() {
        return Err(PlayError::java(format!("{} -version exited with {}", program, output.status)));
    }

    let text = String::from_utf8_lossy(&output.stderr);
    JavaVersion::parse(&text)
        .ok_or_else(|| PlayError::java(format!("could not parse java version from: {}", text.trim())))
}

/// Locate java and check it is recent enough
pub async fn require_java(java_home: Option<&Path>) -> PlayResult<(PathBuf, JavaVersion)> {
    let java = find_java(java_home)?;
    let version = detect_version(&java).await?;
    if !version.is_supported() {
        return Err(PlayError::java(format!(
            "Java {} or later is required, found {}",
            MIN_JAVA_MAJOR, version
        )));
    }
    info!("Found Java {} at {}", version, java.display());
    Ok((java, version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_modern_versions() {
        let v = JavaVersion::parse("openjdk version \"17.0.2\" 2022-01-18\nOpenJDK Runtime Environment").unwrap();
        assert_eq!(v, JavaVersion { major: 17, minor: 0 });

        let v = JavaVersion::parse("openjdk version \"11.0.21\" 2023-10-17 LTS").unwrap();
        assert_eq!(v.major, 11);
        assert!(v.is_supported());

        let v = JavaVersion::parse("openjdk version \"21\" 2023-09-19").unwrap();
        assert_eq!(v, JavaVersion { major: 21, minor: 0 });
    }

    #[test]
    fn test_parse_legacy_version() {
        let v = JavaVersion::parse("java version \"1.8.0_392\"").unwrap();
        assert_eq!(v, JavaVersion { major: 8, minor: 0 });
        assert!(!v.is_supported());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(JavaVersion::parse("command not found").is_none());
        assert!(JavaVersion::parse("version \"abc\"").is_none());
    }

    #[test]
    fn test_resolve_from_home() {
        let home = tempdir().unwrap();
        std::fs::create_dir_all(home.path().join("bin")).unwrap();
        std::fs::write(home.path().join("bin").join(JAVA_BIN), b"").unwrap();

        let java = resolve_java(Some(home.path()), None, None).unwrap();
        assert_eq!(java, home.path().join("bin").join(JAVA_BIN));
    }

    #[test]
    fn test_explicit_home_without_java_is_an_error() {
        let home = tempdir().unwrap();
        let result = resolve_java(Some(home.path()), None, None);
        assert!(matches!(result, Err(PlayError::Java { .. })));
    }

    #[test]
    fn test_resolve_from_path() {
        let empty = tempdir().unwrap();
        let with_java = tempdir().unwrap();
        std::fs::write(with_java.path().join(JAVA_BIN), b"").unwrap();

        let path_var = std::env::join_paths([empty.path(), with_java.path()]).unwrap();
        let java = resolve_java(None, None, Some(&path_var)).unwrap();
        assert_eq!(java, with_java.path().join(JAVA_BIN));

        let only_empty = std::env::join_paths([empty.path()]).unwrap();
        assert!(resolve_java(None, None, Some(&only_empty)).is_err());
    }
}
