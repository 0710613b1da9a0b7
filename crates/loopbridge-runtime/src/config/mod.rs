//! Bridge configuration
//!
//! Provides library defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder methods (programmatic)
//! 2. Environment variables (runtime)
//! 3. Library defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use loopbridge_runtime::config::BridgeConfig;
//!
//! // Use defaults with env overrides
//! let config = BridgeConfig::from_env();
//!
//! // Or customize programmatically
//! let config = BridgeConfig::from_env()
//!     .batch_size(4)
//!     .batch_timeout_ms(2);
//! ```

pub mod defaults;

use loopbridge_core::env::{env_get, env_get_str};
use loopbridge_core::error::{BridgeError, BridgeResult};
use loopbridge_core::kprintln;

/// Bridge configuration with builder pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Extra non-blocking iterations per batch (0 = leading iteration only)
    pub batch_size: usize,
    /// Batch time budget in embedded-loop milliseconds
    pub batch_timeout_ms: u64,
    /// Name of the poller thread
    pub poller_thread_name: String,
    /// Poller stack size (None = system default)
    pub poller_stack_size: Option<usize>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeConfig {
    /// Create config from library defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `LB_BATCH_SIZE` - Extra iterations per batch
    /// - `LB_BATCH_TIMEOUT_MS` - Batch time budget in milliseconds
    /// - `LB_POLLER_THREAD_NAME` - Poller thread name
    /// - `LB_POLLER_STACK_SIZE` - Poller stack size in bytes (0 = system default)
    pub fn from_env() -> Self {
        let stack_size = env_get("LB_POLLER_STACK_SIZE", defaults::POLLER_STACK_SIZE);
        Self {
            batch_size: env_get("LB_BATCH_SIZE", defaults::BATCH_SIZE),
            batch_timeout_ms: env_get("LB_BATCH_TIMEOUT_MS", defaults::BATCH_TIMEOUT_MS),
            poller_thread_name: env_get_str("LB_POLLER_THREAD_NAME", defaults::POLLER_THREAD_NAME),
            poller_stack_size: (stack_size != 0).then_some(stack_size),
        }
    }

    /// Create config with library defaults (no env override).
    /// Useful for testing or when you want full control.
    pub fn new() -> Self {
        Self {
            batch_size: defaults::BATCH_SIZE,
            batch_timeout_ms: defaults::BATCH_TIMEOUT_MS,
            poller_thread_name: defaults::POLLER_THREAD_NAME.to_string(),
            poller_stack_size: None,
        }
    }

    // Builder methods

    pub fn batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    pub fn batch_timeout_ms(mut self, ms: u64) -> Self {
        self.batch_timeout_ms = ms;
        self
    }

    pub fn poller_thread_name(mut self, name: impl Into<String>) -> Self {
        self.poller_thread_name = name.into();
        self
    }

    pub fn poller_stack_size(mut self, size: Option<usize>) -> Self {
        self.poller_stack_size = size;
        self
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> BridgeResult<()> {
        if self.batch_timeout_ms == 0 {
            return Err(BridgeError::InvalidConfig("batch_timeout_ms must be at least 1"));
        }
        if self.poller_thread_name.trim().is_empty() {
            return Err(BridgeError::InvalidConfig("poller_thread_name must not be empty"));
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        kprintln!("Bridge Configuration:");
        kprintln!("  batch_size:          {}", self.batch_size);
        kprintln!("  batch_timeout_ms:    {}", self.batch_timeout_ms);
        kprintln!("  poller_thread_name:  {}", self.poller_thread_name);
        kprintln!("  poller_stack_size:   {:?}", self.poller_stack_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::new();
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.batch_timeout_ms, 8);
        assert_eq!(config.poller_thread_name, "loopbridge-poller");
        assert_eq!(config.poller_stack_size, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = BridgeConfig::new()
            .batch_size(4)
            .batch_timeout_ms(2)
            .poller_thread_name("uv-poller")
            .poller_stack_size(Some(256 * 1024));

        assert_eq!(config.batch_size, 4);
        assert_eq!(config.batch_timeout_ms, 2);
        assert_eq!(config.poller_thread_name, "uv-poller");
        assert_eq!(config.poller_stack_size, Some(256 * 1024));
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            BridgeConfig::new().batch_timeout_ms(0).validate(),
            Err(BridgeError::InvalidConfig("batch_timeout_ms must be at least 1"))
        );
        assert!(BridgeConfig::new().poller_thread_name("  ").validate().is_err());

        // Leading iteration only is allowed
        assert!(BridgeConfig::new().batch_size(0).validate().is_ok());
    }

    #[test]
    fn test_from_env_overrides() {
        std::env::set_var("LB_BATCH_SIZE", "3");
        std::env::set_var("LB_POLLER_STACK_SIZE", "65536");
        let config = BridgeConfig::from_env();
        std::env::remove_var("LB_BATCH_SIZE");
        std::env::remove_var("LB_POLLER_STACK_SIZE");

        assert_eq!(config.batch_size, 3);
        assert_eq!(config.poller_stack_size, Some(65536));
        assert_eq!(config.batch_timeout_ms, defaults::BATCH_TIMEOUT_MS);
    }
}
