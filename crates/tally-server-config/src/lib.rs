// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the Tally ingest worker.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`TALLY_*`)
//!
//! # Usage
//!
//! ```ignore
//! use tally_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("Ingesting into {}", config.database.url);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved worker configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
	pub ingest: IngestConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`TALLY_*`)
/// 2. Config file (`/etc/tally/ingest.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path, which must exist.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::required(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let database = layer.database.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();
	let ingest = layer.ingest.unwrap_or_default().finalize();

	validate_config(&database, &ingest)?;

	info!(
		database = %database.url,
		max_connections = database.max_connections,
		concurrency = ingest.concurrency,
		"Ingest configuration loaded"
	);

	Ok(ServerConfig {
		database,
		logging,
		ingest,
	})
}

/// Validate cross-field configuration rules.
fn validate_config(database: &DatabaseConfig, ingest: &IngestConfig) -> Result<(), ConfigError> {
	if ingest.concurrency == 0 {
		return Err(ConfigError::Validation(
			"ingest.concurrency must be at least 1".to_string(),
		));
	}
	if database.max_connections == 0 {
		return Err(ConfigError::Validation(
			"database.max_connections must be at least 1".to_string(),
		));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_finalize_defaults() {
		let config = finalize(ServerConfigLayer::default()).unwrap();
		assert_eq!(config.database.url, "sqlite:./tally.db");
		assert_eq!(config.ingest.concurrency, 16);
	}

	#[test]
	fn test_zero_concurrency_rejected() {
		let layer = ServerConfigLayer {
			ingest: Some(IngestConfigLayer {
				concurrency: Some(0),
				..Default::default()
			}),
			..Default::default()
		};
		let err = finalize(layer).unwrap_err();
		assert!(err.to_string().contains("ingest.concurrency"));
	}

	#[test]
	fn test_zero_connections_rejected() {
		let layer = ServerConfigLayer {
			database: Some(DatabaseConfigLayer {
				max_connections: Some(0),
				..Default::default()
			}),
			..Default::default()
		};
		assert!(matches!(finalize(layer), Err(ConfigError::Validation(_))));
	}

	#[test]
	fn test_file_overrides_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("ingest.toml");
		std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

		let config = load_from_sources(vec![
			Box::new(TomlSource::new(&path)),
			Box::new(DefaultsSource),
		])
		.unwrap();
		assert_eq!(config.logging.level, "debug");
	}

	#[test]
	fn test_explicit_missing_file_is_error() {
		let dir = tempfile::tempdir().unwrap();
		let err = load_config_with_file(dir.path().join("missing.toml")).unwrap_err();
		assert!(matches!(err, ConfigError::FileRead { .. }));
	}
}
