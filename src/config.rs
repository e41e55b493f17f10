//! # Cover Configuration
//!
//! Each cover is declared as a `[[cover]]` table. Every field is optional; missing or
//! malformed values fall back to fixed defaults instead of failing the load.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:3000"
//!
//! [[cover]]
//! name = "Front Gate"
//! open_duration = 25
//! close_duration = 22
//! tolerance_percent = 10.0
//! open_sensor = "binary_sensor.gate_opening"
//! close_sensor = "binary_sensor.gate_closing"
//! script_entity_id = "/usr/local/bin/gate-rf-pulse"
//! ```
//!
//! - `open_duration` / `close_duration` are full-travel estimates in seconds;
//!   zero, negative or malformed values use the default of 25, fractions floor to at least 1.
//! - `tolerance_percent` is clamped to `[0, 50]`; values above 25 produce a warning.

// src/config.rs - Cover host configuration
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use thiserror::Error;

pub const DEFAULT_NAME: &str = "Gate";
pub const DEFAULT_OPEN_DURATION: u32 = 25;
pub const DEFAULT_CLOSE_DURATION: u32 = 25;
pub const DEFAULT_TOLERANCE: f64 = 10.0;
pub const MAX_TOLERANCE: f64 = 50.0;
pub const TOLERANCE_WARNING_THRESHOLD: f64 = 25.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Duplicate cover entity id: {0}")]
    DuplicateEntity(String),
}

/// Top-level configuration: the HTTP listener and the covers it hosts.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default, rename = "cover")]
    pub covers: Vec<CoverConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// Per-cover configuration. Immutable for the lifetime of the cover instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoverConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default, deserialize_with = "non_empty")]
    pub entity_id: Option<String>,
    #[serde(default = "default_entry_id")]
    pub entry_id: String,
    #[serde(default = "default_open_duration", deserialize_with = "lenient_open_duration")]
    pub open_duration: u32,
    #[serde(default = "default_close_duration", deserialize_with = "lenient_close_duration")]
    pub close_duration: u32,
    #[serde(default = "default_tolerance", deserialize_with = "lenient_tolerance")]
    pub tolerance_percent: f64,
    #[serde(default, deserialize_with = "non_empty")]
    pub open_sensor: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub close_sensor: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub script_entity_id: Option<String>,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            entity_id: None,
            entry_id: default_entry_id(),
            open_duration: default_open_duration(),
            close_duration: default_close_duration(),
            tolerance_percent: default_tolerance(),
            open_sensor: None,
            close_sensor: None,
            script_entity_id: None,
        }
    }
}

impl CoverConfig {
    /// Entity id used by the host registry and the `activate_script` service.
    pub fn entity_id(&self) -> String {
        match &self.entity_id {
            Some(id) => id.clone(),
            None => format!("cover.{}", slugify(&self.name)),
        }
    }

    pub fn unique_id(&self) -> String {
        format!("{}_cover", self.entry_id)
    }

    /// Tolerance clamped to `[0, 50]`, even for configs built in code.
    pub fn tolerance(&self) -> f64 {
        clamp_tolerance(self.tolerance_percent)
    }

    /// Full-travel durations; zero falls back to the default, as it does when parsed.
    pub fn open_duration_secs(&self) -> u32 {
        non_zero_or(self.open_duration, DEFAULT_OPEN_DURATION)
    }

    pub fn close_duration_secs(&self) -> u32 {
        non_zero_or(self.close_duration, DEFAULT_CLOSE_DURATION)
    }

    /// User-facing warning for tolerances above 25%, `None` otherwise.
    pub fn tolerance_warning(&self) -> Option<String> {
        let tol = self.tolerance();
        if tol > TOLERANCE_WARNING_THRESHOLD {
            Some(format!(
                "Configured tolerance ({:.1}%) for '{}' is high (>25%). This can cause unexpected results at the travel extremes and in the displayed state.",
                tol, self.name
            ))
        } else {
            None
        }
    }
}

impl Config {
    /// Reject configurations where two covers would share an entity id.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for cover in &self.covers {
            let id = cover.entity_id();
            if !seen.insert(id.clone()) {
                return Err(ConfigError::DuplicateEntity(id));
            }
        }
        Ok(())
    }
}

pub fn clamp_tolerance(value: f64) -> f64 {
    if value.is_nan() {
        return DEFAULT_TOLERANCE;
    }
    value.clamp(0.0, MAX_TOLERANCE)
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "cover".to_string()
    } else {
        slug.to_string()
    }
}

fn parse_tolerance(raw: &toml::Value) -> f64 {
    let parsed = match raw {
        toml::Value::Float(f) => Some(*f),
        toml::Value::Integer(i) => Some(*i as f64),
        toml::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => clamp_tolerance(v),
        _ => {
            tracing::warn!("Malformed tolerance_percent {:?}, using {}", raw, DEFAULT_TOLERANCE);
            DEFAULT_TOLERANCE
        }
    }
}

fn non_zero_or(value: u32, fallback: u32) -> u32 {
    if value == 0 { fallback } else { value }
}

fn parse_duration(raw: &toml::Value, fallback: u32) -> u32 {
    let parsed = match raw {
        toml::Value::Integer(i) if *i > 0 => Some(u32::try_from(*i).unwrap_or(u32::MAX)),
        toml::Value::Float(f) if f.is_finite() && *f > 0.0 => Some((*f as u32).max(1)),
        toml::Value::String(s) => s.trim().parse::<u32>().ok().filter(|v| *v > 0),
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        tracing::warn!("Invalid travel duration {:?}, using {}s", raw, fallback);
        fallback
    })
}

fn lenient_tolerance<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let raw = toml::Value::deserialize(d)?;
    Ok(parse_tolerance(&raw))
}

fn lenient_open_duration<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let raw = toml::Value::deserialize(d)?;
    Ok(parse_duration(&raw, DEFAULT_OPEN_DURATION))
}

fn lenient_close_duration<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let raw = toml::Value::deserialize(d)?;
    Ok(parse_duration(&raw, DEFAULT_CLOSE_DURATION))
}

fn non_empty<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let raw = Option::<String>::deserialize(d)?;
    Ok(raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
}

// Default value functions
fn default_listen() -> String { "0.0.0.0:3000".to_string() }
fn default_name() -> String { DEFAULT_NAME.to_string() }
fn default_entry_id() -> String { uuid::Uuid::new_v4().to_string() }
fn default_open_duration() -> u32 { DEFAULT_OPEN_DURATION }
fn default_close_duration() -> u32 { DEFAULT_CLOSE_DURATION }
fn default_tolerance() -> f64 { DEFAULT_TOLERANCE }

/// Load configuration from a TOML file at the given path.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            return Err(ConfigError::Io(e));
        }
    };
    let config: Config = match toml::from_str(&contents) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to parse config TOML: {}", e);
            return Err(ConfigError::Toml(e));
        }
    };
    config.validate()?;
    Ok(config)
}
