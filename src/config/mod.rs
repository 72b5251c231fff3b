//! Configuration module for Mastodonte
//!
//! This module handles loading, parsing, and validating the optional TOML
//! configuration file. Every key has a default, so the crawler also runs
//! without one.
//!
//! # Example
//!
//! ```no_run
//! use mastodonte::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("mastodonte.toml")).unwrap();
//! println!("Workers: {}", config.crawler.workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ApiConfig, CheckpointBackend, Config, CrawlerConfig, OutputConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
