use facematch_core::{ConfigError, MatchConfig};
use std::path::PathBuf;

/// Which D-Bus bus the daemon registers on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusKind {
    Session,
    System,
}

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Embedding dimension and match tolerance.
    pub matching: MatchConfig,
    /// Path to the SQLite identity store.
    pub db_path: PathBuf,
    /// Bus to serve on (default: session).
    pub bus: BusKind,
    /// Whether to rebuild the index from the store before serving.
    pub sync_on_start: bool,
}

impl Config {
    /// Load configuration from `FACEMATCH_*` environment variables with defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = MatchConfig::default();

        let data_dir = lookup("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("facematch");

        let db_path = lookup("FACEMATCH_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("identities.db"));

        let bus = match lookup("FACEMATCH_BUS").as_deref() {
            Some("system") => BusKind::System,
            _ => BusKind::Session,
        };

        let matching = MatchConfig {
            dimension: parse_or(&lookup, "FACEMATCH_DIMENSION", defaults.dimension),
            tolerance: parse_or(&lookup, "FACEMATCH_TOLERANCE", defaults.tolerance),
        }
        .validate()?;

        Ok(Self {
            matching,
            db_path,
            bus,
            sync_on_start: lookup("FACEMATCH_SYNC_ON_START")
                .map(|v| v != "0")
                .unwrap_or(true),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("HOME", "/home/alice")]).unwrap();
        assert_eq!(config.matching, MatchConfig::default());
        assert_eq!(
            config.db_path,
            PathBuf::from("/home/alice/.local/share/facematch/identities.db")
        );
        assert_eq!(config.bus, BusKind::Session);
        assert!(config.sync_on_start);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("XDG_DATA_HOME", "/data"),
            ("FACEMATCH_DIMENSION", "512"),
            ("FACEMATCH_TOLERANCE", "1.1"),
            ("FACEMATCH_BUS", "system"),
            ("FACEMATCH_SYNC_ON_START", "0"),
        ])
        .unwrap();
        assert_eq!(config.matching.dimension, 512);
        assert!((config.matching.tolerance - 1.1).abs() < 1e-6);
        assert_eq!(config.db_path, PathBuf::from("/data/facematch/identities.db"));
        assert_eq!(config.bus, BusKind::System);
        assert!(!config.sync_on_start);
    }

    #[test]
    fn test_explicit_db_path() {
        let config = load(&[("FACEMATCH_DB_PATH", "/var/lib/facematch.db")]).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/var/lib/facematch.db"));
    }

    #[test]
    fn test_unparseable_falls_back_to_default() {
        let config = load(&[("FACEMATCH_DIMENSION", "lots")]).unwrap();
        assert_eq!(config.matching.dimension, 128);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(load(&[("FACEMATCH_DIMENSION", "0")]).is_err());
        assert!(load(&[("FACEMATCH_TOLERANCE", "-1")]).is_err());
    }
}
