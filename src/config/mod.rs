// src/config/mod.rs

//! Configuration loading and validation for killcord.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate it into a `ConfigFile` (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, parse_str};
pub use model::{
    CommandSpec, ConfigFile, MonitorSection, RawCommand, RawConfigFile, ShutdownConfig,
    ShutdownSection,
};
