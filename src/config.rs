use serde::Deserialize;
use std::{fs, path::Path, time::Duration};

use crate::error::{FillError, Result};

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pool: PoolConfig,
    pub fill: FillTuning,
}

/// Shape of the random buffer pool.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of buffers in the table.
    pub table_size: usize,
    /// Length of every buffer, which is also the size of a single write.
    pub buffer_len: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            table_size: 4096,
            buffer_len: 4096,
        }
    }
}

/// Knobs of the write loop's throughput tracking and near-full detection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FillTuning {
    /// Samples kept in the sliding throughput window.
    pub window_size: usize,
    /// Minimum time between two throughput samples, in milliseconds.
    pub sample_interval_ms: u64,
    /// Average speed (bytes/s) under which the device counts as nearly full.
    pub slow_speed_floor: f64,
    /// Remaining fraction of the total under which the device counts as nearly full.
    pub remaining_ratio_floor: f64,
}

impl Default for FillTuning {
    fn default() -> Self {
        FillTuning {
            window_size: 10,
            sample_interval_ms: 1000,
            slow_speed_floor: 50.0 * 1024.0,
            remaining_ratio_floor: 0.001,
        }
    }
}

impl FillTuning {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path).map_err(|e| FillError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config: Config = toml::from_str(&config_str).map_err(|e| FillError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool.table_size == 0 {
            return Err(FillError::InvalidConfig("pool.table_size must be > 0"));
        }
        if self.pool.buffer_len == 0 {
            return Err(FillError::InvalidConfig("pool.buffer_len must be > 0"));
        }
        if self.fill.window_size < 2 {
            return Err(FillError::InvalidConfig("fill.window_size must be >= 2"));
        }
        Ok(())
    }
}

/// Parses a byte count such as `1048576`, `512MiB` or `10GB`.
///
/// Binary suffixes (`KiB`, `MiB`, ...) are 1024-based, decimal ones (`KB`,
/// `MB`, ...) are 1000-based. Zero is rejected.
pub fn parse_size(size_str: &str) -> Result<u64> {
    const UNITS: [(&str, u64); 8] = [
        ("KIB", 1 << 10),
        ("MIB", 1 << 20),
        ("GIB", 1 << 30),
        ("TIB", 1 << 40),
        ("KB", 1_000),
        ("MB", 1_000_000),
        ("GB", 1_000_000_000),
        ("TB", 1_000_000_000_000),
    ];

    let normalized = size_str.trim().to_uppercase();
    let (number, multiplier) = UNITS
        .iter()
        .find_map(|(suffix, mult)| normalized.strip_suffix(suffix).map(|n| (n.trim(), *mult)))
        .unwrap_or((normalized.as_str(), 1));

    let value: u64 = number
        .parse()
        .map_err(|e: std::num::ParseIntError| FillError::InvalidSize(format!("{size_str}: {e}")))?;
    let bytes = value
        .checked_mul(multiplier)
        .ok_or_else(|| FillError::InvalidSize(format!("{size_str}: too large")))?;
    if bytes == 0 {
        return Err(FillError::InvalidSize(format!("{size_str}: must be > 0")));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1GB").unwrap(), 1_000_000_000);
        assert_eq!(parse_size("500MB").unwrap(), 500_000_000);
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("4KiB").unwrap(), 4096);
        assert_eq!(parse_size(" 2 mib ").unwrap(), 2 * 1024 * 1024);
    }

    #[test]
    fn test_parse_size_rejects_zero_and_garbage() {
        assert!(parse_size("0").is_err());
        assert!(parse_size("0GiB").is_err());
        assert!(parse_size("ten").is_err());
        assert!(parse_size("-5").is_err());
        assert!(parse_size("99999999999TiB").is_err());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [pool]
            table_size = 64

            [fill]
            slow_speed_floor = 1024.0
            "#,
        )
        .unwrap();
        assert_eq!(config.pool.table_size, 64);
        assert_eq!(config.pool.buffer_len, 4096);
        assert_eq!(config.fill.window_size, 10);
        assert_eq!(config.fill.slow_speed_floor, 1024.0);
        assert_eq!(config.fill.sample_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_load_rejects_empty_table() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("fill.toml");
        fs::write(&path, "[pool]\ntable_size = 0\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, FillError::InvalidConfig(_)));
        assert!(err.is_validation());
    }

    #[test]
    fn test_validate_needs_two_window_samples() {
        let mut config = Config::default();
        config.fill.window_size = 1;
        assert!(matches!(config.validate(), Err(FillError::InvalidConfig(_))));

        config.fill.window_size = 2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, FillError::Config { .. }));
    }
}
