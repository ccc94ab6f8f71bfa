//! Logging initialization module

use std::sync::Once;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

/// Logging profile configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    /// Human-readable output, `trackable=debug` unless `RUST_LOG` is set
    #[default]
    Development,
    /// JSON structured output, `trackable=info` unless `RUST_LOG` is set
    Production,
    /// Bare registry; tests install the capture layer instead
    Test,
}

impl Profile {
    /// Filter directive used when `RUST_LOG` is absent
    pub fn default_directive(&self) -> &'static str {
        match self {
            Profile::Development => "trackable=debug",
            Profile::Production => "trackable=info",
            Profile::Test => "trackable=trace",
        }
    }
}

static INIT_ONCE: Once = Once::new();

/// Initialize the logging facility
///
/// Only the first call installs a subscriber; later calls are no-ops.
///
/// # Example
///
/// ```
/// use trackable_core::logging_facility::{init, Profile};
///
/// init(Profile::Production);
/// ```
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(profile.default_directive()));
        match profile {
            Profile::Development => {
                tracing_subscriber::fmt().with_env_filter(filter).init();
            }
            Profile::Production => {
                tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(filter)
                    .init();
            }
            Profile::Test => {
                tracing_subscriber::registry().init();
            }
        }
    });
}
