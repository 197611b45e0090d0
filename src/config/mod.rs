//! Configuration module for the game server supervisor.
//!
//! This module handles parsing, validation, and access to the settings a
//! supervisor is constructed with. Configurations can be loaded from JSON or
//! YAML files, from strings, or from environment variables (`SERVICE_NAME`,
//! `CHECK_INTERVAL`, `RCON_PASSWORD` and friends).
//!
//! # Examples
//!
//! Loading a configuration from a file:
//!
//! ```no_run
//! use gameserver_supervisor::config::{SupervisorConfig, validate_config};
//!
//! let config = SupervisorConfig::from_file("supervisor.yaml").unwrap();
//! validate_config(&config).unwrap();
//! println!("Supervising service {}", config.service_name);
//! ```
//!
//! Creating a configuration programmatically:
//!
//! ```
//! use gameserver_supervisor::config::{ProtocolConfig, SupervisorConfig, validate_config};
//! use std::time::Duration;
//!
//! let config = SupervisorConfig {
//!     shutdown_delay: Duration::from_secs(300),
//!     protocol: ProtocolConfig {
//!         password: "secret".to_string(),
//!         ..ProtocolConfig::default()
//!     },
//!     ..SupervisorConfig::default()
//! };
//! assert!(validate_config(&config).is_ok());
//! ```
mod parser;
pub mod validator;

pub use parser::{
    CommandConfig, DEFAULT_OCCUPANCY_PATTERN, DEFAULT_WORKERS, HttpConfig, ProtocolConfig,
    SupervisorConfig,
};
pub use validator::validate_config;
pub(crate) use parser::duration_ms;
