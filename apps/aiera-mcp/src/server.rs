use std::{net::SocketAddr, sync::Arc};

use axum::{
	Router,
	body::Body,
	extract::State,
	http::{HeaderMap, Request, StatusCode},
	middleware::{self, Next},
	response::IntoResponse,
};
use color_eyre::Result;
use rmcp::{
	ErrorData, ServerHandler,
	handler::server::router::tool::ToolRouter,
	model::{CallToolResult, JsonObject, ServerCapabilities, ServerInfo},
	transport::streamable_http_server::{
		StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
	},
};
use serde_json::Value;
use tokio::net::TcpListener;

use crate::McpAuthState;
use aiera_search::{
	Error, SearchFilingChunksRequest, SearchFilingsRequest, SearchResponse, SearchService,
	SearchTranscriptsRequest,
};

const HEADER_AUTHORIZATION: &str = "authorization";
const SERVER_INSTRUCTIONS: &str = "Search Aiera earnings call transcripts, SEC filings and filing chunks. Transcript and filing chunk searches combine semantic and keyword ranking and fall back to phrase matching. Filings searches resolve company names through direct, discovery, alias and broad fallback strategies.";

#[derive(Clone)]
struct AieraMcp {
	service: Arc<SearchService>,
	tool_router: ToolRouter<Self>,
}
impl AieraMcp {
	fn new(service: Arc<SearchService>) -> Self {
		Self { service, tool_router: Self::tool_router() }
	}
}

#[rmcp::tool_router]
impl AieraMcp {
	#[rmcp::tool(
		name = "search_transcripts",
		description = "Search earnings call transcript segments by meaning and keywords. Leave query_text empty to browse by filters, newest first.",
		input_schema = search_transcripts_schema()
	)]
	async fn search_transcripts(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let request: SearchTranscriptsRequest = parse_arguments(params)?;
		let response = self.service.search_transcripts(request).await.map_err(map_search_error)?;

		structured(&response)
	}

	#[rmcp::tool(
		name = "search_filings",
		description = "Find SEC filings for a company. Name variations, known aliases and a broad fallback are tried until results mention the company.",
		input_schema = search_filings_schema()
	)]
	async fn search_filings(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let request: SearchFilingsRequest = parse_arguments(params)?;
		let response = self.service.search_filings(request).await.map_err(map_search_error)?;

		structured(&response)
	}

	#[rmcp::tool(
		name = "search_filing_chunks",
		description = "Search passages inside SEC filings by meaning and keywords, optionally narrowed by company, filing type, ids and dates.",
		input_schema = search_filing_chunks_schema()
	)]
	async fn search_filing_chunks(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let request: SearchFilingChunksRequest = parse_arguments(params)?;
		let response = self.service.search_filing_chunks(request).await.map_err(map_search_error)?;

		structured(&response)
	}
}

#[rmcp::tool_handler]
impl ServerHandler for AieraMcp {
	fn get_info(&self) -> ServerInfo {
		ServerInfo {
			instructions: Some(SERVER_INSTRUCTIONS.to_string()),
			capabilities: ServerCapabilities::builder().enable_tools().build(),
			..Default::default()
		}
	}
}

pub async fn serve_mcp(
	bind_addr: &str,
	auth_state: McpAuthState,
	service: Arc<SearchService>,
) -> Result<()> {
	let bind_addr: SocketAddr = bind_addr.parse()?;
	let session_manager: Arc<LocalSessionManager> = Default::default();
	let mcp = StreamableHttpService::new(
		move || Ok(AieraMcp::new(service.clone())),
		session_manager,
		StreamableHttpServerConfig::default(),
	);
	let router = Router::new()
		.fallback_service(mcp)
		.layer(middleware::from_fn_with_state(auth_state, mcp_auth_middleware));
	let listener = TcpListener::bind(bind_addr).await?;

	tracing::info!(%bind_addr, "MCP server listening.");

	axum::serve(listener, router).await?;

	Ok(())
}

fn parse_arguments<T>(params: JsonObject) -> Result<T, ErrorData>
where
	T: serde::de::DeserializeOwned,
{
	serde_json::from_value(Value::Object(params))
		.map_err(|err| ErrorData::invalid_params(format!("Invalid tool arguments: {err}"), None))
}

fn structured(response: &SearchResponse) -> Result<CallToolResult, ErrorData> {
	let value = serde_json::to_value(response).map_err(|err| {
		ErrorData::internal_error(format!("Failed to encode search response: {err}"), None)
	})?;

	Ok(CallToolResult::structured(value))
}

fn map_search_error(err: Error) -> ErrorData {
	match err {
		Error::InvalidArgument { message } => ErrorData::invalid_params(message, None),
		other => {
			tracing::error!(error = %other, "Search tool failed.");

			ErrorData::internal_error(other.to_string(), None)
		},
	}
}

fn is_authorized(headers: &HeaderMap, auth_state: &McpAuthState) -> bool {
	match auth_state {
		McpAuthState::Off => true,
		McpAuthState::StaticKeys { bearer_token } =>
			read_bearer_token(headers).is_some_and(|token| token == bearer_token),
	}
}

fn read_bearer_token(headers: &HeaderMap) -> Option<&str> {
	let raw = headers.get(HEADER_AUTHORIZATION)?;
	let value = raw.to_str().ok()?.trim();
	let token = value.strip_prefix("Bearer ")?.trim();

	if token.is_empty() { None } else { Some(token) }
}

async fn mcp_auth_middleware(
	State(auth_state): State<McpAuthState>,
	req: Request<Body>,
	next: Next,
) -> axum::response::Response {
	if !is_authorized(req.headers(), &auth_state) {
		return (
			StatusCode::UNAUTHORIZED,
			"Authentication required for security.auth_mode=static_keys with a Bearer token.",
		)
			.into_response();
	}

	next.run(req).await
}

fn search_transcripts_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"properties": {
			"query_text": {
				"type": ["string", "null"],
				"description": "Natural language query. Omit or leave empty to browse by filters."
			},
			"event_ids": {
				"type": ["array", "string", "null"],
				"items": { "type": "integer" },
				"description": "Transcript event ids, as an array or a comma-separated string."
			},
			"equity_ids": {
				"type": ["array", "string", "null"],
				"items": { "type": "integer" },
				"description": "Primary equity ids, as an array or a comma-separated string."
			},
			"start_date": { "type": ["string", "null"], "description": "Inclusive lower bound, YYYY-MM-DD." },
			"end_date": { "type": ["string", "null"], "description": "Inclusive upper bound, YYYY-MM-DD." },
			"transcript_section": {
				"type": ["string", "null"],
				"description": "presentation or q_and_a."
			},
			"max_results": { "type": "integer", "minimum": 1, "default": 20 },
			"min_score": { "type": "number", "minimum": 0, "default": 0.2 }
		}
	}))
}

fn search_filings_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"required": ["company_name"],
		"properties": {
			"company_name": { "type": "string", "description": "Company name or ticker." },
			"document_types": {
				"type": ["array", "string", "null"],
				"items": { "type": "string" },
				"description": "Filing forms such as 10-K or 8-K, as an array or a comma-separated string."
			},
			"start_date": { "type": ["string", "null"], "description": "Inclusive lower bound, YYYY-MM-DD." },
			"end_date": { "type": ["string", "null"], "description": "Inclusive upper bound, YYYY-MM-DD." },
			"include_amendments": { "type": "boolean", "default": false },
			"sort_by": { "type": "string", "enum": ["desc", "asc", "relevance"], "default": "desc" },
			"max_results": { "type": "integer", "minimum": 1, "default": 20 }
		}
	}))
}

fn search_filing_chunks_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"properties": {
			"query_text": {
				"type": ["string", "null"],
				"description": "Natural language query. Omit or leave empty to browse by filters."
			},
			"company_name": { "type": ["string", "null"] },
			"filing_type": { "type": ["string", "null"], "description": "Filing form such as 10-K." },
			"filing_ids": {
				"type": ["array", "string", "null"],
				"items": { "type": "integer" }
			},
			"content_ids": {
				"type": ["array", "string", "null"],
				"items": { "type": "string" }
			},
			"start_date": { "type": ["string", "null"], "description": "Inclusive lower bound, YYYY-MM-DD." },
			"end_date": { "type": ["string", "null"], "description": "Inclusive upper bound, YYYY-MM-DD." },
			"max_results": { "type": "integer", "minimum": 1, "default": 20 },
			"min_score": { "type": "number", "minimum": 0, "default": 0.2 }
		}
	}))
}
