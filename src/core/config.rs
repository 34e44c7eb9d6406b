//! # Global execution configuration.
//!
//! Provides [`Config`] centralized settings shared by every macro controller.
//!
//! ## Sentinel values
//! - `buffered_macro_codes = 0` → treated as 1 (no look-ahead, strictly one code at a time)
//! - `hostname = None` → resolved from the environment (see [`Config::hostname`])
//! - `output_capacity = 0` → treated as 1 (clamped by the output bus)

use std::borrow::Cow;

/// Global configuration for macro execution.
///
/// Defines:
/// - **Pipelining**: how many codes a macro may read ahead of execution
/// - **Startup files**: names of the configuration file, its fallback and the override file
/// - **Bootstrap**: the hostname reported before the configuration file runs
/// - **Output**: ring size of the output bus
///
/// ## Notes
/// All fields are public. Prefer the accessors; they normalize sentinels.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of codes a macro keeps in flight (read and started, not yet drained).
    pub buffered_macro_codes: usize,

    /// File name of the startup configuration file.
    pub config_file: String,

    /// File name used when the startup configuration file is broken.
    pub config_file_fallback: String,

    /// File name of the post-configuration override file.
    pub config_override_file: String,

    /// Hostname sent to the firmware before the configuration file runs.
    ///
    /// `None` = resolve from the environment.
    pub hostname: Option<String>,

    /// Capacity of the output bus ring buffer.
    pub output_capacity: usize,
}

impl Config {
    /// Returns the look-ahead depth, at least 1.
    #[inline]
    pub fn buffer_depth(&self) -> usize {
        self.buffered_macro_codes.max(1)
    }

    /// Returns the output bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn output_capacity_clamped(&self) -> usize {
        self.output_capacity.max(1)
    }

    /// Returns `true` if `name` is the configuration file or its fallback.
    pub fn is_config_file(&self, name: &str) -> bool {
        name == self.config_file || name == self.config_file_fallback
    }

    /// Returns `true` if `name` is the configuration fallback file.
    pub fn is_config_fallback(&self, name: &str) -> bool {
        name == self.config_file_fallback
    }

    /// Returns `true` if `name` is the configuration override file.
    pub fn is_config_override(&self, name: &str) -> bool {
        name == self.config_override_file
    }

    /// Returns the hostname to report to the firmware.
    ///
    /// Resolution order: `hostname` field, `HOSTNAME` environment variable,
    /// `/etc/hostname`, then `"localhost"`.
    ///
    /// May read a file; [`MacroRuntimeBuilder::build`](crate::MacroRuntimeBuilder::build)
    /// calls it once.
    pub fn hostname(&self) -> Cow<'_, str> {
        if let Some(name) = self.hostname.as_deref().filter(|n| !n.is_empty()) {
            return Cow::Borrowed(name);
        }
        if let Some(name) = std::env::var("HOSTNAME").ok().filter(|n| !n.trim().is_empty()) {
            return Cow::Owned(name.trim().to_string());
        }
        match std::fs::read_to_string("/etc/hostname") {
            Ok(name) if !name.trim().is_empty() => Cow::Owned(name.trim().to_string()),
            _ => Cow::Borrowed("localhost"),
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `buffered_macro_codes = 16`
    /// - `config_file = "config.g"`, `config_file_fallback = "config.g.bak"`
    /// - `config_override_file = "config-override.g"`
    /// - `hostname = None` (resolved from the environment)
    /// - `output_capacity = 1024`
    fn default() -> Self {
        Self {
            buffered_macro_codes: 16,
            config_file: "config.g".to_string(),
            config_file_fallback: "config.g.bak".to_string(),
            config_override_file: "config-override.g".to_string(),
            hostname: None,
            output_capacity: 1024,
        }
    }
}
