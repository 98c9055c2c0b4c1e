mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Api, Config, Search, Security, Service};

use std::{env, fs, net::SocketAddr, path::Path};

pub const API_KEY_ENV: &str = "AIERA_API_KEY";

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg, env::var(API_KEY_ENV).ok());

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.mcp_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.mcp_bind must be non-empty.".to_string(),
		});
	}
	if cfg.service.mcp_bind.parse::<SocketAddr>().is_err() {
		return Err(Error::Validation {
			message: "service.mcp_bind must be a valid socket address.".to_string(),
		});
	}
	if !cfg.api.base_url.starts_with("http://") && !cfg.api.base_url.starts_with("https://") {
		return Err(Error::Validation {
			message: "api.base_url must start with http:// or https://.".to_string(),
		});
	}
	if cfg.api.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: format!("api.api_key must be non-empty (or set {API_KEY_ENV})."),
		});
	}
	if cfg.api.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "api.timeout_ms must be greater than zero.".to_string(),
		});
	}

	for (key, value) in &cfg.api.default_headers {
		if !value.is_string() {
			return Err(Error::Validation {
				message: format!("api.default_headers.{key} must be a string."),
			});
		}
	}

	validate_search(&cfg.search)?;

	match cfg.security.auth_mode.trim() {
		"off" => {
			let bind: SocketAddr = cfg.service.mcp_bind.parse().map_err(|_| Error::Validation {
				message: "service.mcp_bind must be a valid socket address.".to_string(),
			})?;

			if !bind.ip().is_loopback() {
				return Err(Error::Validation {
					message: "service.mcp_bind must be a loopback address when security.auth_mode=off."
						.to_string(),
				});
			}
		},
		"static_keys" =>
			if cfg.security.auth_token.as_deref().map(str::trim).unwrap_or_default().is_empty() {
				return Err(Error::Validation {
					message: "security.auth_token is required when security.auth_mode=static_keys."
						.to_string(),
				});
			},
		other => {
			return Err(Error::Validation {
				message: format!("security.auth_mode must be one of off or static_keys, got {other}."),
			});
		},
	}

	Ok(())
}

fn validate_search(search: &Search) -> Result<()> {
	if search.pipeline.trim().is_empty() {
		return Err(Error::Validation {
			message: "search.pipeline must be non-empty.".to_string(),
		});
	}

	for (label, value) in [
		("search.hybrid_timeout_ms", search.hybrid_timeout_ms),
		("search.fallback_timeout_ms", search.fallback_timeout_ms),
		("search.filings_timeout_ms", search.filings_timeout_ms),
	] {
		if value == 0 {
			return Err(Error::Validation { message: format!("{label} must be greater than zero.") });
		}
	}

	if !search.validation_threshold.is_finite() {
		return Err(Error::Validation {
			message: "search.validation_threshold must be a finite number.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&search.validation_threshold) {
		return Err(Error::Validation {
			message: "search.validation_threshold must be in the range 0.0-1.0.".to_string(),
		});
	}

	for (label, value) in [
		("search.max_discovery_variations", search.max_discovery_variations),
		("search.max_context_variations", search.max_context_variations),
		("search.max_name_variations", search.max_name_variations),
		("search.fallback_max_results", search.fallback_max_results as usize),
		("search.neural_k_multiplier", search.neural_k_multiplier as usize),
		("search.neural_k_cap", search.neural_k_cap as usize),
	] {
		if value == 0 {
			return Err(Error::Validation { message: format!("{label} must be greater than zero.") });
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config, env_api_key: Option<String>) {
	cfg.api.base_url = cfg.api.base_url.trim().trim_end_matches('/').to_string();

	if cfg.api.api_key.trim().is_empty()
		&& let Some(key) = env_api_key.filter(|key| !key.trim().is_empty())
	{
		cfg.api.api_key = key.trim().to_string();
	}
	if cfg.security.auth_token.as_deref().map(|token| token.trim().is_empty()).unwrap_or(false) {
		cfg.security.auth_token = None;
	}
}

#[cfg(test)]
mod tests {
	use crate::{Config, normalize};

	fn parse(raw: &str) -> Config {
		toml::from_str(raw).expect("Failed to parse config.")
	}

	#[test]
	fn normalize_reads_api_key_from_env_when_missing() {
		let mut cfg = parse(
			r#"
[service]
mcp_bind = "127.0.0.1:9090"

[api]
base_url = "https://example.test/api/"

[security]
auth_mode = "off"
"#,
		);

		normalize(&mut cfg, Some("env-key".to_string()));

		assert_eq!(cfg.api.api_key, "env-key");
		assert_eq!(cfg.api.base_url, "https://example.test/api");
	}

	#[test]
	fn normalize_keeps_explicit_api_key() {
		let mut cfg = parse(
			r#"
[service]
mcp_bind = "127.0.0.1:9090"

[api]
api_key = "file-key"

[security]
auth_mode = "static_keys"
auth_token = "   "
"#,
		);

		normalize(&mut cfg, Some("env-key".to_string()));

		assert_eq!(cfg.api.api_key, "file-key");
		assert!(cfg.security.auth_token.is_none());
	}
}
