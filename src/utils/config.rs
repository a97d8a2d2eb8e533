// src/utils/config.rs
use log::info;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::matching::phonetic::{DEFAULT_CACHE_SIZE, DEFAULT_SOUNDEX_LENGTH};
use crate::matching::shallow::DEFAULT_SHALLOW_DEEP_THRESHOLD;
use crate::utils::error::ConfigError;

pub const DEFAULT_LOW_ERROR_CUTOFF: f64 = 0.4;
pub const DEFAULT_HIGH_ERROR_CUTOFF: f64 = 1.0;
pub const DEFAULT_CHUNK_SIZE: usize = 2000;

#[derive(Debug, Clone, PartialEq)]
pub struct DedupeConfig {
    /// Minimum shallow score (0..=4) for a pair to be deep-compared.
    pub shallow_deep_threshold: f64,
    /// Summed field error at or below which a pair is auto-labeled duplicate.
    pub low_error_cutoff: f64,
    /// Summed field error at or above which a pair is auto-labeled unique.
    pub high_error_cutoff: f64,
    pub soundex_length: usize,
    pub phonetic_cache_size: usize,
    pub worker_count: usize,
    /// Candidate pairs per parallel work unit.
    pub chunk_size: usize,
    pub review_timeout: Option<Duration>,
    pub model_path: Option<PathBuf>,
}

impl Default for DedupeConfig {
    fn default() -> Self {
        Self {
            shallow_deep_threshold: DEFAULT_SHALLOW_DEEP_THRESHOLD,
            low_error_cutoff: DEFAULT_LOW_ERROR_CUTOFF,
            high_error_cutoff: DEFAULT_HIGH_ERROR_CUTOFF,
            soundex_length: DEFAULT_SOUNDEX_LENGTH,
            phonetic_cache_size: DEFAULT_CACHE_SIZE,
            worker_count: num_cpus::get(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            review_timeout: None,
            model_path: None,
        }
    }
}

fn env_value<T: FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value: raw }),
        Err(_) => Ok(None),
    }
}

impl DedupeConfig {
    /// Defaults overridden by `DEDUPE_*` environment variables, then validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(v) = env_value("DEDUPE_SHALLOW_DEEP_THRESHOLD")? {
            config.shallow_deep_threshold = v;
        }
        if let Some(v) = env_value("DEDUPE_LOW_ERROR_CUTOFF")? {
            config.low_error_cutoff = v;
        }
        if let Some(v) = env_value("DEDUPE_HIGH_ERROR_CUTOFF")? {
            config.high_error_cutoff = v;
        }
        if let Some(v) = env_value("DEDUPE_SOUNDEX_LENGTH")? {
            config.soundex_length = v;
        }
        if let Some(v) = env_value("DEDUPE_PHONETIC_CACHE_SIZE")? {
            config.phonetic_cache_size = v;
        }
        if let Some(v) = env_value("DEDUPE_WORKERS")? {
            config.worker_count = v;
        }
        if let Some(v) = env_value("DEDUPE_CHUNK_SIZE")? {
            config.chunk_size = v;
        }
        if let Some(secs) = env_value::<u64>("DEDUPE_REVIEW_TIMEOUT_SECS")? {
            config.review_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(path) = env_value::<PathBuf>("DEDUPE_MODEL_PATH")? {
            config.model_path = Some(path);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let thresholds = [
            ("shallow_deep_threshold", self.shallow_deep_threshold),
            ("low_error_cutoff", self.low_error_cutoff),
            ("high_error_cutoff", self.high_error_cutoff),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }
        if self.low_error_cutoff > self.high_error_cutoff {
            return Err(ConfigError::InvertedCutoffs {
                low: self.low_error_cutoff,
                high: self.high_error_cutoff,
            });
        }
        let sizes = [
            ("soundex_length", self.soundex_length),
            ("phonetic_cache_size", self.phonetic_cache_size),
            ("worker_count", self.worker_count),
            ("chunk_size", self.chunk_size),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(ConfigError::ZeroSize { name });
            }
        }
        Ok(())
    }

    pub fn log_config(&self) {
        info!("⚙️  Dedupe configuration:");
        info!(
            "   • Shallow -> deep threshold: {:.2} (of 4.0)",
            self.shallow_deep_threshold
        );
        info!(
            "   • Gray zone (summed field error): ({:.2}, {:.2})",
            self.low_error_cutoff, self.high_error_cutoff
        );
        info!(
            "   • Soundex length: {}, phonetic cache: {} entries",
            self.soundex_length, self.phonetic_cache_size
        );
        info!(
            "   • Workers: {}, chunk size: {}",
            self.worker_count, self.chunk_size
        );
        match self.review_timeout {
            Some(t) => info!("   • Review timeout: {}s", t.as_secs()),
            None => info!("   • Review timeout: none"),
        }
        match &self.model_path {
            Some(p) => info!("   • Model: {}", p.display()),
            None => info!("   • Model: built-in reference weights"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DedupeConfig::default();
        assert_eq!(config.shallow_deep_threshold, 3.4);
        assert_eq!(config.low_error_cutoff, 0.4);
        assert_eq!(config.high_error_cutoff, 1.0);
        assert_eq!(config.soundex_length, 10);
        assert!(config.worker_count > 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = DedupeConfig::default();
        config.shallow_deep_threshold = -0.1;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidThreshold {
                name: "shallow_deep_threshold",
                value: -0.1
            })
        );

        let mut config = DedupeConfig::default();
        config.high_error_cutoff = f64::INFINITY;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThreshold { name: "high_error_cutoff", .. })
        ));

        let mut config = DedupeConfig::default();
        config.low_error_cutoff = 2.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedCutoffs { .. })
        ));

        let mut config = DedupeConfig::default();
        config.soundex_length = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroSize {
                name: "soundex_length"
            })
        );

        let mut config = DedupeConfig::default();
        config.worker_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("DEDUPE_SHALLOW_DEEP_THRESHOLD", "3.0");
        env::set_var("DEDUPE_REVIEW_TIMEOUT_SECS", "30");
        env::set_var("DEDUPE_SOUNDEX_LENGTH", "");
        let config = DedupeConfig::from_env().unwrap();
        assert_eq!(config.shallow_deep_threshold, 3.0);
        assert_eq!(config.review_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.soundex_length, 10);

        env::set_var("DEDUPE_SOUNDEX_LENGTH", "ten");
        assert_eq!(
            DedupeConfig::from_env(),
            Err(ConfigError::InvalidEnv {
                var: "DEDUPE_SOUNDEX_LENGTH",
                value: "ten".into()
            })
        );

        env::remove_var("DEDUPE_SHALLOW_DEEP_THRESHOLD");
        env::remove_var("DEDUPE_REVIEW_TIMEOUT_SECS");
        env::remove_var("DEDUPE_SOUNDEX_LENGTH");
    }
}
