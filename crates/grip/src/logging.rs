use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

const DEFAULT_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// A level (`info`, `debug`, ...) or a full `EnvFilter` directive string.
    pub level: String,
}

impl LoggingConfig {
    /// Directives for the configured level. Level names are
    /// case-insensitive and `warning` means `warn`; anything else is passed
    /// through as written.
    fn directives(&self) -> String {
        let level = self.level.trim();
        if level.is_empty() {
            return DEFAULT_LEVEL.to_owned();
        }
        let lower = level.to_ascii_lowercase();
        match lower.as_str() {
            "warning" => "warn".to_owned(),
            "trace" | "debug" | "info" | "warn" | "error" | "off" => lower,
            _ => level.to_owned(),
        }
    }

    /// The configured level with `RUST_LOG` layered on top. Directives that
    /// do not parse fall back to `RUST_LOG` alone, then to the configured
    /// level, then to `info`.
    pub fn env_filter(&self) -> EnvFilter {
        let configured = self.directives();
        let mut candidates = Vec::with_capacity(3);
        if let Ok(from_env) = std::env::var("RUST_LOG") {
            let from_env = from_env.trim();
            if !from_env.is_empty() {
                candidates.push(format!("{configured},{from_env}"));
                candidates.push(from_env.to_owned());
            }
        }
        candidates.push(configured);

        candidates
            .into_iter()
            .find_map(|directives| EnvFilter::try_new(directives).ok())
            .unwrap_or_else(|| EnvFilter::default().add_directive(LevelFilter::INFO.into()))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL.to_owned(),
        }
    }
}

/// Install a `fmt` subscriber for `config`. Returns `false` when a global
/// subscriber was already installed, which is left in place.
pub fn init_logging(config: &LoggingConfig) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directives(level: &str) -> String {
        LoggingConfig {
            level: level.to_owned(),
        }
        .directives()
    }

    #[test]
    fn level_names_are_normalised() {
        assert_eq!(directives(" WARNING "), "warn");
        assert_eq!(directives("Debug"), "debug");
        assert_eq!(directives(""), "info");
        assert_eq!(directives("grip=trace,info"), "grip=trace,info");
    }

    #[test]
    fn second_init_is_a_no_op() {
        let config = LoggingConfig::default();
        init_logging(&config);
        assert!(!init_logging(&config));
    }
}
