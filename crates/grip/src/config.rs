use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GripError, Result};
use crate::logging::LoggingConfig;

/// Settings read from a `grip.toml`:
///
/// ```toml
/// classpath = ["build/classes", "libs/dep.jar"]
/// jdk = "/usr/lib/jvm/jdk-21"
///
/// [logging]
/// level = "debug"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GripConfig {
    /// Class directories, archives and module images, in lookup order.
    pub classpath: Vec<PathBuf>,

    /// JDK whose module image is appended to the classpath.
    pub jdk: Option<PathBuf>,

    pub logging: LoggingConfig,
}

impl GripConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| GripError::Config(format!("{}: {err}", path.display())))?;
        Self::load_from_str(&text)
    }

    pub fn load_from_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|err| GripError::Config(err.to_string()))
    }

    /// Classpath roots, followed by the JDK if one is configured.
    pub fn roots(&self) -> Vec<PathBuf> {
        let mut roots = self.classpath.clone();
        roots.extend(self.jdk.clone());
        roots
    }
}
