use std::path::PathBuf;

/// Runtime settings, read from `RENTCORE_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub wal_file: String,
    pub metrics_port: Option<u16>,
    /// Compact once this many events were appended since the last compaction.
    pub compact_threshold: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            wal_file: "rentals.wal".into(),
            metrics_port: None,
            compact_threshold: 1000,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unparsable numbers fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: lookup("RENTCORE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            wal_file: lookup("RENTCORE_WAL_FILE")
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.wal_file),
            metrics_port: lookup("RENTCORE_METRICS_PORT").and_then(|s| s.parse().ok()),
            compact_threshold: lookup("RENTCORE_COMPACT_THRESHOLD")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.compact_threshold),
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join(&self.wal_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = Config::from_lookup(lookup(&[]));
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.wal_path(), PathBuf::from("./data/rentals.wal"));
    }

    #[test]
    fn reads_all_keys() {
        let cfg = Config::from_lookup(lookup(&[
            ("RENTCORE_DATA_DIR", "/var/lib/rentcore"),
            ("RENTCORE_WAL_FILE", "fleet.wal"),
            ("RENTCORE_METRICS_PORT", "9100"),
            ("RENTCORE_COMPACT_THRESHOLD", "50"),
        ]));
        assert_eq!(cfg.wal_path(), PathBuf::from("/var/lib/rentcore/fleet.wal"));
        assert_eq!(cfg.metrics_port, Some(9100));
        assert_eq!(cfg.compact_threshold, 50);
    }

    #[test]
    fn bad_numbers_fall_back() {
        let cfg = Config::from_lookup(lookup(&[
            ("RENTCORE_METRICS_PORT", "ninety"),
            ("RENTCORE_COMPACT_THRESHOLD", "-3"),
        ]));
        assert_eq!(cfg.metrics_port, None);
        assert_eq!(cfg.compact_threshold, 1000);
    }
}
