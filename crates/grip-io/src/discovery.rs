use std::path::{Path, PathBuf};

use crate::{FileSourceError, Result};

/// The `jmods/` directory of the JDK named by `JAVA_HOME`, which backs the
/// `jrt:` root.
pub fn runtime_jmods() -> Result<PathBuf> {
    let home = std::env::var_os("JAVA_HOME").ok_or(FileSourceError::JavaHomeUnset)?;
    jmods_of(Path::new(&home))
}

/// `home/jmods`, or `home/../jmods` when `home` is the `jre/` directory of
/// an older JDK layout.
fn jmods_of(home: &Path) -> Result<PathBuf> {
    home.ancestors()
        .take(2)
        .map(|dir| dir.join("jmods"))
        .find(|jmods| jmods.is_dir())
        .ok_or_else(|| FileSourceError::MissingJmods(home.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_without_jmods_is_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = jmods_of(tmp.path()).unwrap_err();
        assert!(matches!(err, FileSourceError::MissingJmods(ref home) if home == tmp.path()));
        assert!(err.is_configuration());
    }

    #[test]
    fn jre_home_resolves_to_the_enclosing_jdk() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("jmods")).unwrap();
        std::fs::create_dir(tmp.path().join("jre")).unwrap();

        assert_eq!(jmods_of(tmp.path()).unwrap(), tmp.path().join("jmods"));
        assert_eq!(
            jmods_of(&tmp.path().join("jre")).unwrap(),
            tmp.path().join("jmods")
        );
    }
}
