mod error;

pub use error::{Error, Result};
pub use reqwest::Method;

use std::time::Duration;

use reqwest::{
	Client, StatusCode,
	header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT},
};
use serde_json::{Map, Value};

pub const HEADER_API_KEY: &str = "X-API-Key";
pub const HEADER_MCP_ORIGIN: &str = "X-MCP-Origin";
pub const MCP_ORIGIN: &str = "local_mcp";

/// Thin wrapper over a pooled `reqwest::Client` that talks to the Aiera REST API.
#[derive(Clone, Debug)]
pub struct AieraClient {
	http: Client,
	base_url: String,
	headers: HeaderMap,
}
impl AieraClient {
	pub fn new(cfg: &aiera_config::Api) -> Result<Self> {
		if cfg.api_key.trim().is_empty() {
			return Err(Error::InvalidConfig { message: "Aiera API key is missing.".to_string() });
		}

		let http = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
		let headers = auth_headers(&cfg.api_key, &cfg.user_agent, &cfg.default_headers)?;

		Ok(Self { http, base_url: cfg.base_url.trim_end_matches('/').to_string(), headers })
	}

	/// Sends one request and returns the decoded JSON body.
	///
	/// `timeout` overrides the client's ambient timeout for this call only.
	pub async fn request(
		&self,
		method: Method,
		endpoint: &str,
		params: &[(String, String)],
		body: Option<&Value>,
		timeout: Option<Duration>,
	) -> Result<Value> {
		let url = format!("{}{}", self.base_url, endpoint);
		let mut builder =
			self.http.request(method.clone(), url).headers(self.headers.clone()).query(params);

		if let Some(body) = body {
			builder = builder.json(body);
		}
		if let Some(timeout) = timeout {
			builder = builder.timeout(timeout);
		}

		tracing::info!(%method, endpoint, param_count = params.len(), "Aiera API request.");

		let response = builder.send().await.map_err(|err| classify(endpoint, err))?;
		let status = response.status();
		let bytes = response.bytes().await.map_err(|err| classify(endpoint, err))?;

		if !matches!(status, StatusCode::OK | StatusCode::CREATED) {
			let body = String::from_utf8_lossy(&bytes).to_string();

			tracing::error!(endpoint, status = status.as_u16(), body = %body, "Aiera API error.");

			return Err(Error::Status { endpoint: endpoint.to_string(), status: status.as_u16(), body });
		}

		parse_body(endpoint, &bytes)
	}
}

pub fn auth_headers(
	api_key: &str,
	user_agent: &str,
	default_headers: &Map<String, Value>,
) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
	headers.insert(USER_AGENT, user_agent.parse()?);
	headers.insert(HeaderName::from_static("x-mcp-origin"), HeaderValue::from_static(MCP_ORIGIN));

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	let mut key: HeaderValue = api_key.parse()?;

	key.set_sensitive(true);
	headers.insert(HeaderName::from_static("x-api-key"), key);

	Ok(headers)
}

fn classify(endpoint: &str, err: reqwest::Error) -> Error {
	if err.is_timeout() {
		tracing::warn!(endpoint, "Aiera API request timed out.");

		return Error::Timeout { endpoint: endpoint.to_string() };
	}

	tracing::error!(endpoint, error = %err, "Aiera API transport failure.");

	Error::Transport(err)
}

fn parse_body(endpoint: &str, bytes: &[u8]) -> Result<Value> {
	if bytes.iter().all(u8::is_ascii_whitespace) {
		return Ok(Value::Null);
	}

	serde_json::from_slice(bytes).map_err(|err| Error::InvalidResponse {
		message: format!("Aiera API returned invalid JSON for {endpoint}: {err}"),
	})
}
