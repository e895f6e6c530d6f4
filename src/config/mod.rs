//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable for a proxy run)
//!     → command-line overrides applied by the binary
//! ```
//!
//! # Design Decisions
//! - Config is immutable once a proxy run starts
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_overrides, load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, ClientsConfig, LimitsConfig, ListenerConfig, ObservabilityConfig, ProxyConfig,
    TimeoutConfig, DEFAULT_PORT,
};
pub use validation::{validate_config, ValidationError};
