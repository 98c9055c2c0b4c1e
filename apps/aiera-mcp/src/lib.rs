pub mod server;

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use color_eyre::{Result, eyre};
use tracing_subscriber::EnvFilter;

use aiera_client::AieraClient;
use aiera_config::Security;
use aiera_search::SearchService;

#[derive(Debug, Parser)]
#[command(
	version = aiera_cli::VERSION,
	rename_all = "kebab",
	styles = aiera_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum McpAuthState {
	Off,
	StaticKeys { bearer_token: String },
}

pub async fn run(args: Args) -> Result<()> {
	let config = aiera_config::load(&args.config)?;

	init_tracing(&config.service.log_level);

	let auth_state = build_auth_state(&config.security)?;
	let client = AieraClient::new(&config.api)?;
	let service = SearchService::new(config.search.clone(), Arc::new(client));

	tracing::info!(
		base_url = %config.api.base_url,
		pipeline = %config.search.pipeline,
		auth_mode = %config.security.auth_mode,
		"Search service ready."
	);

	server::serve_mcp(&config.service.mcp_bind, auth_state, Arc::new(service)).await
}

fn init_tracing(log_level: &str) {
	let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_auth_state(security: &Security) -> Result<McpAuthState> {
	match security.auth_mode.trim() {
		"off" => Ok(McpAuthState::Off),
		"static_keys" => {
			let token = security.auth_token.as_deref().map(str::trim).unwrap_or_default();

			if token.is_empty() {
				return Err(eyre::eyre!(
					"security.auth_mode=static_keys requires a non-empty security.auth_token."
				));
			}

			Ok(McpAuthState::StaticKeys { bearer_token: token.to_string() })
		},
		other => Err(eyre::eyre!(
			"security.auth_mode must be one of off or static_keys for aiera-mcp, got {other}."
		)),
	}
}

#[cfg(test)]
mod tests {
	use crate::{McpAuthState, build_auth_state};
	use aiera_config::Security;

	fn security(auth_mode: &str, auth_token: Option<&str>) -> Security {
		Security { auth_mode: auth_mode.to_string(), auth_token: auth_token.map(str::to_string) }
	}

	#[test]
	fn off_mode_needs_no_token() {
		let auth_state = build_auth_state(&security("off", None)).expect("auth state");

		assert_eq!(auth_state, McpAuthState::Off);
	}

	#[test]
	fn static_keys_mode_trims_configured_token() {
		let auth_state =
			build_auth_state(&security("static_keys", Some(" token-a "))).expect("auth state");

		assert_eq!(auth_state, McpAuthState::StaticKeys { bearer_token: "token-a".to_string() });
	}

	#[test]
	fn static_keys_mode_rejects_blank_token() {
		let err = build_auth_state(&security("static_keys", Some("  "))).expect_err("expected error");

		assert!(err.to_string().contains("auth_token"), "unexpected error: {err}");
	}

	#[test]
	fn unknown_mode_is_rejected() {
		let err = build_auth_state(&security("oauth", None)).expect_err("expected error");

		assert!(err.to_string().contains("got oauth"), "unexpected error: {err}");
	}
}
