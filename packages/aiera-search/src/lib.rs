pub mod company;
pub mod filings;
pub mod hybrid;
pub mod query;
pub mod request;
pub mod response;
pub mod validator;

mod error;

pub use company::CompanyAliases;
pub use error::{Error, Result};
pub use filings::{FilingsMultiStrategySearch, SearchStrategyResult, Strategy};
pub use hybrid::{HybridOutcome, HybridSearchExecutor, HybridState};
pub use query::{Collection, FilterClause, QueryBuilder, QueryDocument, SearchRequest};
pub use request::{SearchFilingChunksRequest, SearchFilingsRequest, SearchTranscriptsRequest};
pub use response::{NormalizedHit, SearchMetadata, SearchResponse};
pub use validator::ResultValidator;

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use serde_json::Value;

use aiera_client::{AieraClient, Method};

pub const SEARCH_PIPELINE_PARAM: &str = "search_pipeline";

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One query sent to a search endpoint.
#[derive(Clone, Debug)]
pub struct BackendRequest<'a> {
	pub endpoint: &'a str,
	pub document: Value,
	/// Ranking pipeline hint; `None` selects the endpoint's default ranking.
	pub pipeline: Option<&'a str>,
	/// Overrides the backend's ambient timeout.
	pub timeout: Option<Duration>,
}

pub trait SearchBackend
where
	Self: Send + Sync,
{
	fn search<'a>(&'a self, request: BackendRequest<'a>) -> BoxFuture<'a, Result<Value>>;
}

impl SearchBackend for AieraClient {
	fn search<'a>(&'a self, request: BackendRequest<'a>) -> BoxFuture<'a, Result<Value>> {
		Box::pin(async move {
			let params: Vec<(String, String)> = request
				.pipeline
				.map(|pipeline| (SEARCH_PIPELINE_PARAM.to_string(), pipeline.to_string()))
				.into_iter()
				.collect();
			let body = self
				.request(Method::POST, request.endpoint, &params, Some(&request.document), request.timeout)
				.await?;

			Ok(body)
		})
	}
}

pub struct SearchService {
	pub cfg: aiera_config::Search,
	backend: Arc<dyn SearchBackend>,
	builder: QueryBuilder,
	validator: ResultValidator,
	aliases: CompanyAliases,
}
impl SearchService {
	pub fn new(cfg: aiera_config::Search, backend: Arc<dyn SearchBackend>) -> Self {
		let builder = QueryBuilder::new(&cfg);
		let validator = ResultValidator::new(cfg.validation_threshold);

		Self { cfg, backend, builder, validator, aliases: CompanyAliases::builtin() }
	}

	pub fn with_aliases(mut self, aliases: CompanyAliases) -> Self {
		self.aliases = aliases;

		self
	}

	pub async fn search_transcripts(&self, request: SearchTranscriptsRequest) -> Result<SearchResponse> {
		let search = request.to_search_request()?;

		tracing::info!(
			query = search.query_text().unwrap_or_default(),
			filters = search.filters.len(),
			max_results = search.max_results,
			"Transcript search requested."
		);

		self.execute(Collection::Transcripts, &search).await
	}

	pub async fn search_filing_chunks(
		&self,
		request: SearchFilingChunksRequest,
	) -> Result<SearchResponse> {
		let search = request.to_search_request()?;

		tracing::info!(
			query = search.query_text().unwrap_or_default(),
			filters = search.filters.len(),
			max_results = search.max_results,
			"Filing chunk search requested."
		);

		self.execute(Collection::FilingChunks, &search).await
	}

	pub async fn search_filings(&self, request: SearchFilingsRequest) -> Result<SearchResponse> {
		let (company, criteria) = request.to_criteria()?;

		tracing::info!(
			company = %company,
			document_types = ?criteria.document_types,
			include_amendments = criteria.include_amendments,
			"Filings search requested."
		);

		let search = FilingsMultiStrategySearch::new(
			self.backend.as_ref(),
			&self.builder,
			&self.validator,
			&self.aliases,
			&self.cfg,
		);

		Ok(search.run(&company, &criteria).await)
	}

	async fn execute(&self, collection: Collection, search: &SearchRequest) -> Result<SearchResponse> {
		let executor = HybridSearchExecutor {
			backend: self.backend.as_ref(),
			builder: &self.builder,
			pipeline: &self.cfg.pipeline,
			hybrid_timeout: Duration::from_millis(self.cfg.hybrid_timeout_ms),
		};
		let outcome = executor.execute(collection, search).await?;

		tracing::info!(
			collection = collection.as_str(),
			state = ?outcome.state,
			backend_calls = outcome.backend_calls,
			hits = outcome.response.hits().len(),
			"Search finished."
		);

		Ok(outcome.response)
	}
}
