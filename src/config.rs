use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Core configuration (§6 "Environment variables"), layered
/// defaults → TOML file → `FAAS_`-prefixed environment variables, following
/// the teacher's `figment` dependency even though its own `config.rs` only
/// exercises `toml::from_str` directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub server: ServerConfig,
    pub data: DataConfig,
    pub defaults: DefaultsConfig,
    pub limits: LimitsConfig,
    pub kv: KvConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Listener bind address.
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataConfig {
    pub db_url: String,
    /// Blob-store path: directory holding `{content_hash}.zip` archives.
    pub blob_store_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DefaultsConfig {
    pub timeout_ms: u64,
    pub heap_cap_mib: u64,
    /// Retention applied to functions with no explicit policy of their own, in
    /// days. `0` means no expiry (`RetentionPolicy::None`).
    pub retention_days: u32,
    pub max_archive_size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LimitsConfig {
    pub max_global_concurrency: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KvDriverKind {
    JsonFile,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KvConfig {
    /// KV driver selector.
    pub driver: KvDriverKind,
    pub json_file_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind: "0.0.0.0".to_string(),
                port: 8080,
            },
            data: DataConfig {
                db_url: "sqlite://data/faas-core.db".to_string(),
                blob_store_path: "data/blobs".to_string(),
            },
            defaults: DefaultsConfig {
                timeout_ms: 30_000,
                heap_cap_mib: 256,
                retention_days: 30,
                max_archive_size_bytes: 64 * 1024 * 1024,
            },
            limits: LimitsConfig {
                max_global_concurrency: 256,
            },
            kv: KvConfig {
                driver: KvDriverKind::JsonFile,
                json_file_path: "data/kv.json".to_string(),
            },
        }
    }
}

impl Config {
    /// Loads defaults, then an optional TOML file, then `FAAS_`-prefixed env
    /// vars (`FAAS_SERVER__PORT`, `FAAS_DEFAULTS__TIMEOUT_MS`, ...).
    pub fn load(config_path: Option<&str>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment
            .merge(Env::prefixed("FAAS_").split("__"))
            .extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_figment() {
        let config = Config::load(None).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn env_override_wins_over_defaults() {
        std::env::set_var("FAAS_SERVER__PORT", "9999");
        let config = Config::load(None).unwrap();
        std::env::remove_var("FAAS_SERVER__PORT");
        assert_eq!(config.server.port, 9999);
    }
}
