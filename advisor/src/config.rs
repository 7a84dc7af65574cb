use std::{fs, path::Path, time::Duration};

use serde_derive::{Deserialize, Serialize};

use coders::preparation::{DEFAULT_JPEG_QUALITY, DEFAULT_MAX_DIMENSION};

use crate::{AdvisorError, AdvisorResult};

pub const DEFAULT_CACHE_CAPACITY: usize = 20;
pub const DEFAULT_MAX_REQUESTS: usize = 5;
pub const DEFAULT_WINDOW_SECS: u64 = 60;

/// Settings of an [`Advisor`](crate::Advisor). Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Number of suggestions kept in the cache
    pub cache_capacity: usize,
    /// Number of service requests admitted per window
    pub max_requests: usize,
    pub window_secs: u64,
    /// Images are downsized to this side length before they are hashed and sent
    pub max_image_dimension: u32,
    pub jpeg_quality: u8,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            max_requests: DEFAULT_MAX_REQUESTS,
            window_secs: DEFAULT_WINDOW_SECS,
            max_image_dimension: DEFAULT_MAX_DIMENSION,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl AdvisorConfig {
    /// Reads a JSON config file and validates it.
    pub fn from_path<P: AsRef<Path>>(path: P) -> AdvisorResult<AdvisorConfig> {
        let raw = fs::read_to_string(path)?;
        AdvisorConfig::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> AdvisorResult<AdvisorConfig> {
        let config: AdvisorConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AdvisorResult<()> {
        let problem = if self.cache_capacity == 0 {
            "cache_capacity must be positive"
        } else if self.max_requests == 0 {
            "max_requests must be positive"
        } else if self.window_secs == 0 {
            "window_secs must be positive"
        } else if self.max_image_dimension == 0 {
            "max_image_dimension must be positive"
        } else if !(1..=100).contains(&self.jpeg_quality) {
            "jpeg_quality must lie in 1..=100"
        } else {
            return Ok(());
        };
        Err(AdvisorError::InvalidConfig(problem.to_string()))
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = AdvisorConfig::from_json(r#"{"max_requests": 2}"#).unwrap();
        assert_eq!(config.max_requests, 2);
        assert_eq!(config.cache_capacity, 20);
        assert_eq!(config.window(), Duration::from_secs(60));
        assert_eq!(config.max_image_dimension, 512);
        assert_eq!(config.jpeg_quality, 70);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for raw in &[
            r#"{"cache_capacity": 0}"#,
            r#"{"max_requests": 0}"#,
            r#"{"window_secs": 0}"#,
            r#"{"jpeg_quality": 0}"#,
            r#"{"jpeg_quality": 101}"#,
        ] {
            assert!(matches!(
                AdvisorConfig::from_json(raw),
                Err(AdvisorError::InvalidConfig(_))
            ));
        }
        assert!(matches!(
            AdvisorConfig::from_json("{ not json"),
            Err(AdvisorError::ConfigFormat(_))
        ));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"cache_capacity": 3, "window_secs": 10}}"#).unwrap();

        let config = AdvisorConfig::from_path(file.path()).unwrap();
        assert_eq!(config.cache_capacity, 3);
        assert_eq!(config.window_secs, 10);

        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AdvisorConfig::from_path(dir.path().join("missing.json")),
            Err(AdvisorError::ConfigIo(_))
        ));
    }
}
