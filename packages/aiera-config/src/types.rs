use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub api: Api,
	#[serde(default)]
	pub search: Search,
	pub security: Security,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub mcp_bind: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Api {
	#[serde(default = "default_base_url")]
	pub base_url: String,
	/// Falls back to `AIERA_API_KEY` when left empty.
	#[serde(default)]
	pub api_key: String,
	/// Ambient timeout applied to every request without an explicit override.
	#[serde(default = "default_api_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default = "default_user_agent")]
	pub user_agent: String,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

/// Tuned constants for the search pipeline.
///
/// The defaults were picked empirically against the backing service. They are exposed here so
/// deployments can adjust them without a rebuild.
#[derive(Clone, Debug, Deserialize)]
pub struct Search {
	#[serde(default = "default_pipeline")]
	pub pipeline: String,
	#[serde(default = "default_hybrid_timeout_ms")]
	pub hybrid_timeout_ms: u64,
	#[serde(default = "default_fallback_timeout_ms")]
	pub fallback_timeout_ms: u64,
	/// Server-side time budget embedded in non-fallback filings queries.
	#[serde(default = "default_filings_timeout_ms")]
	pub filings_timeout_ms: u64,
	/// Minimum share of hits that must mention the target company.
	#[serde(default = "default_validation_threshold")]
	pub validation_threshold: f32,
	#[serde(default = "default_max_discovery_variations")]
	pub max_discovery_variations: usize,
	#[serde(default = "default_max_context_variations")]
	pub max_context_variations: usize,
	#[serde(default = "default_fallback_max_results")]
	pub fallback_max_results: u32,
	#[serde(default = "default_max_name_variations")]
	pub max_name_variations: usize,
	#[serde(default = "default_neural_k_multiplier")]
	pub neural_k_multiplier: u32,
	#[serde(default = "default_neural_k_cap")]
	pub neural_k_cap: u32,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			pipeline: default_pipeline(),
			hybrid_timeout_ms: default_hybrid_timeout_ms(),
			fallback_timeout_ms: default_fallback_timeout_ms(),
			filings_timeout_ms: default_filings_timeout_ms(),
			validation_threshold: default_validation_threshold(),
			max_discovery_variations: default_max_discovery_variations(),
			max_context_variations: default_max_context_variations(),
			fallback_max_results: default_fallback_max_results(),
			max_name_variations: default_max_name_variations(),
			neural_k_multiplier: default_neural_k_multiplier(),
			neural_k_cap: default_neural_k_cap(),
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct Security {
	pub auth_mode: String,
	pub auth_token: Option<String>,
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_base_url() -> String {
	"https://premium.aiera.com/api".to_string()
}

fn default_api_timeout_ms() -> u64 {
	30_000
}

fn default_user_agent() -> String {
	"Aiera-MCP/1.0.0".to_string()
}

fn default_pipeline() -> String {
	"hybrid_search_pipeline".to_string()
}

fn default_hybrid_timeout_ms() -> u64 {
	15_000
}

fn default_fallback_timeout_ms() -> u64 {
	10_000
}

fn default_filings_timeout_ms() -> u64 {
	15_000
}

fn default_validation_threshold() -> f32 {
	0.3
}

fn default_max_discovery_variations() -> usize {
	5
}

fn default_max_context_variations() -> usize {
	5
}

fn default_fallback_max_results() -> u32 {
	30
}

fn default_max_name_variations() -> usize {
	10
}

fn default_neural_k_multiplier() -> u32 {
	100
}

fn default_neural_k_cap() -> u32 {
	10_000
}
