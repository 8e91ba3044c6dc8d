//! Configuration module for the cache core.
//!
//! Loads configuration from environment variables.

use std::env;
use std::time::Duration;

use mongodb::bson::Document;

use crate::cache::CacheConfig;
use crate::database::{RecordDefaults, default_automod};
use crate::error::{CacheError, Result};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // MongoDB
    pub mongodb_uri: String,
    pub mongodb_database: String,

    /// Seconds between two flushes of the same record family.
    pub db_update_interval: Duration,

    /// Prefix used in direct messages and for tenants without an entry.
    pub default_prefix: String,

    /// Default moderation sub-document for new guild configs.
    pub automod_defaults: Document,

    /// Lifetime of entries in the invite read-through cache.
    pub invite_cache_ttl: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    /// Returns `CacheError::Config` if a required variable is missing or a
    /// value cannot be parsed.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mongodb_uri = env::var("MONGODB_URI")
            .map_err(|_| CacheError::Config("MONGODB_URI must be set".into()))?;

        let mongodb_database =
            env::var("MONGODB_DATABASE").unwrap_or_else(|_| "tessera".to_string());

        let db_update_interval = parse_secs("DB_UPDATE_INTERVAL", env::var("DB_UPDATE_INTERVAL").ok(), 60)?;
        let invite_cache_ttl = parse_secs("INVITE_CACHE_TTL", env::var("INVITE_CACHE_TTL").ok(), 300)?;

        let default_prefix = env::var("DEFAULT_PREFIX")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "e!".to_string());

        let automod_defaults = match env::var("AUTOMOD_DEFAULTS") {
            Ok(raw) => parse_automod(&raw)?,
            Err(_) => default_automod(),
        };

        Ok(Self {
            mongodb_uri,
            mongodb_database,
            db_update_interval,
            default_prefix,
            automod_defaults,
            invite_cache_ttl,
        })
    }

    /// Cache settings for the invite ledger.
    pub fn invite_cache(&self) -> CacheConfig {
        CacheConfig::default().ttl(self.invite_cache_ttl)
    }

    /// Defaults table handed to the record defaulter.
    pub fn record_defaults(&self) -> RecordDefaults {
        RecordDefaults {
            automod: self.automod_defaults.clone(),
            prefix: self.default_prefix.clone(),
        }
    }
}

fn parse_secs(name: &str, raw: Option<String>, default: u64) -> Result<Duration> {
    let secs = match raw {
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|_| CacheError::Config(format!("{name} must be a whole number of seconds")))?,
        None => default,
    };

    if secs == 0 {
        return Err(CacheError::Config(format!("{name} must be greater than zero")));
    }

    Ok(Duration::from_secs(secs))
}

fn parse_automod(raw: &str) -> Result<Document> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| CacheError::Config(format!("AUTOMOD_DEFAULTS is not valid JSON: {e}")))?;

    if !value.is_object() {
        return Err(CacheError::Config("AUTOMOD_DEFAULTS must be a JSON object".into()));
    }

    mongodb::bson::to_document(&value)
        .map_err(|e| CacheError::Config(format!("AUTOMOD_DEFAULTS cannot be stored: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_secs() {
        assert_eq!(parse_secs("X", None, 60).unwrap(), Duration::from_secs(60));
        assert_eq!(parse_secs("X", Some(" 15 ".into()), 60).unwrap(), Duration::from_secs(15));
        assert!(parse_secs("X", Some("0".into()), 60).is_err());
        assert!(parse_secs("X", Some("soon".into()), 60).is_err());
    }

    #[test]
    fn test_record_defaults_and_invite_cache() {
        let config = Config {
            mongodb_uri: "mongodb://localhost".into(),
            mongodb_database: "tessera".into(),
            db_update_interval: Duration::from_secs(60),
            default_prefix: "t!".into(),
            automod_defaults: default_automod(),
            invite_cache_ttl: Duration::from_secs(30),
        };

        assert_eq!(config.record_defaults().prefix, "t!");
        assert_eq!(config.invite_cache().ttl, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_parse_automod() {
        let doc = parse_automod(r#"{"links": {"enabled": true}}"#).unwrap();
        let links = doc.get_document("links").unwrap();
        assert!(links.get_bool("enabled").unwrap());

        assert!(parse_automod("[1, 2]").is_err());
        assert!(parse_automod("{").is_err());
    }
}
