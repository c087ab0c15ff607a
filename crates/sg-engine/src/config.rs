//! The `--cfg=key:value` configuration surface (spec.md §6).
//!
//! A typed struct with documented defaults, the same shape
//! [`crate::Simulation::new`] uses for its own (single, seed) knob —
//! generalized here to the handful of keys spec.md §6 lists. Kept
//! `clap`-free: this crate is a library, not a CLI, so parsing a flat
//! `"--cfg=key:value"` string is the whole job.

use std::fmt;

/// One `--cfg=key:value` entry failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `key` isn't one of the keys spec.md §6 lists.
    UnknownKey(String),
    /// `key` is known but `value` doesn't parse as the expected type.
    InvalidValue {
        /// The offending key.
        key: String,
        /// The offending value.
        value: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownKey(key) => write!(f, "unknown --cfg key '{key}'"),
            ConfigError::InvalidValue { key, value } => write!(f, "invalid value '{value}' for --cfg key '{key}'"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parsed `--cfg=key:value` surface (spec.md §6).
///
/// `network/model` and `host/model` are accepted and stored for
/// forward-compatibility with the CLI grammar, but this crate implements
/// only one resource-model family per kind (spec.md Non-goals exclude
/// alternate model families) — they're not dispatched anywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// `contexts/stack-size`, in bytes (parsed from KiB). Default matches
    /// `sg_actors::DEFAULT_STACK_SIZE`'s 8 MiB.
    pub stack_size_bytes: usize,
    /// `network/model`, stored but not dispatched (see struct docs).
    pub network_model: String,
    /// `network/crosstraffic`: whether Comms add the reverse-direction ACK
    /// touch described in `sg_resources::network`.
    pub network_crosstraffic: bool,
    /// `network/TCP-gamma`, stored for forward-compatibility; not consumed
    /// by the single network model this crate ships.
    pub network_tcp_gamma: f64,
    /// `host/model`, stored but not dispatched (see struct docs).
    pub host_model: String,
    /// `plugin`: name of a plugin to enable at engine startup, if any.
    pub plugin: Option<String>,
    /// `maxmin/precision`: documented but not threaded into `sg_solver`,
    /// which compiles in its own `EPSILON` — recorded here so the CLI
    /// surface round-trips, not silently dropped.
    pub maxmin_precision: f64,
    /// `surf/precision`: the epsilon the engine loop uses when comparing
    /// remaining work/Δt against zero.
    pub surf_precision: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stack_size_bytes: sg_actors_stack_default(),
            network_model: "default".to_string(),
            network_crosstraffic: false,
            network_tcp_gamma: 1.0,
            host_model: "default".to_string(),
            plugin: None,
            maxmin_precision: 1e-9,
            surf_precision: 1e-9,
        }
    }
}

/// `sg_actors::DEFAULT_STACK_SIZE` duplicated as a literal so this crate
/// doesn't need to depend on `sg-actors` just for one constant — `sg`
/// keeps the two in sync (see its `Cargo.toml`/`engine.rs`).
fn sg_actors_stack_default() -> usize {
    8 * 1024 * 1024
}

impl Config {
    /// Parses a sequence of `--cfg=key:value` arguments (the `--cfg=`
    /// prefix is optional; bare `"key:value"` is also accepted) into a
    /// [`Config`], starting from [`Config::default`].
    pub fn parse<I, S>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Self::default();
        for arg in args {
            let arg = arg.as_ref();
            let entry = arg.strip_prefix("--cfg=").unwrap_or(arg);
            let (key, value) = entry
                .split_once(':')
                .ok_or_else(|| ConfigError::InvalidValue { key: entry.to_string(), value: String::new() })?;
            config.apply(key, value)?;
        }
        Ok(config)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue { key: key.to_string(), value: value.to_string() };
        match key {
            "contexts/stack-size" => {
                let kib: usize = value.parse().map_err(|_| invalid())?;
                self.stack_size_bytes = kib * 1024;
            }
            "network/model" => self.network_model = value.to_string(),
            "network/crosstraffic" => {
                self.network_crosstraffic = match value {
                    "1" => true,
                    "0" => false,
                    _ => return Err(invalid()),
                };
            }
            "network/TCP-gamma" => self.network_tcp_gamma = value.parse().map_err(|_| invalid())?,
            "host/model" => self.host_model = value.to_string(),
            "plugin" => self.plugin = Some(value.to_string()),
            "maxmin/precision" => self.maxmin_precision = value.parse().map_err(|_| invalid())?,
            "surf/precision" => self.surf_precision = value.parse().map_err(|_| invalid())?,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_documented() {
        let config = Config::default();
        assert_eq!(config.stack_size_bytes, 8 * 1024 * 1024);
        assert!(!config.network_crosstraffic);
        assert_eq!(config.plugin, None);
    }

    #[test]
    fn parses_cfg_prefixed_and_bare_entries() {
        let config = Config::parse(["--cfg=contexts/stack-size:16384", "network/crosstraffic:1", "plugin:hostload"]).unwrap();
        assert_eq!(config.stack_size_bytes, 16384 * 1024);
        assert!(config.network_crosstraffic);
        assert_eq!(config.plugin.as_deref(), Some("hostload"));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = Config::parse(["bogus/key:1"]).unwrap_err();
        assert_eq!(err, ConfigError::UnknownKey("bogus/key".to_string()));
    }

    #[test]
    fn malformed_value_is_rejected() {
        let err = Config::parse(["maxmin/precision:not-a-number"]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
