use std::time::Duration;

use crate::{
	BackendRequest, Result, SearchBackend,
	query::{Collection, QueryBuilder, SearchRequest},
	response::SearchResponse,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HybridState {
	AttemptingHybrid,
	AttemptingFallback,
	Success,
	Empty,
}

#[derive(Clone, Debug)]
pub struct HybridOutcome {
	pub state: HybridState,
	pub response: SearchResponse,
	pub backend_calls: usize,
}

/// Runs one transcript or filing-chunk search with lexical fallback.
pub struct HybridSearchExecutor<'a> {
	pub backend: &'a dyn SearchBackend,
	pub builder: &'a QueryBuilder,
	pub pipeline: &'a str,
	pub hybrid_timeout: Duration,
}
impl HybridSearchExecutor<'_> {
	/// Filter-only requests go straight to the backend and surface its errors. Text requests try
	/// the hybrid query under a timeout, then a lexical fallback, and end empty rather than fail.
	pub async fn execute(
		&self,
		collection: Collection,
		request: &SearchRequest,
	) -> Result<HybridOutcome> {
		let document = self.builder.build(collection, request)?;

		if request.is_browse() {
			let body = self
				.backend
				.search(BackendRequest {
					endpoint: collection.endpoint(),
					document: document.to_value(),
					pipeline: None,
					timeout: None,
				})
				.await?;
			let response = SearchResponse::from_body(&body, request.max_results)?;

			tracing::info!(
				collection = collection.as_str(),
				hits = response.hits().len(),
				"Filtered browse completed."
			);

			return Ok(HybridOutcome { state: HybridState::Success, response, backend_calls: 1 });
		}

		tracing::info!(
			collection = collection.as_str(),
			state = ?HybridState::AttemptingHybrid,
			timeout_ms = self.hybrid_timeout.as_millis() as u64,
			"Starting hybrid search."
		);

		let attempt = tokio::time::timeout(
			self.hybrid_timeout,
			self.backend.search(BackendRequest {
				endpoint: collection.endpoint(),
				document: document.to_value(),
				pipeline: Some(self.pipeline),
				timeout: Some(self.hybrid_timeout),
			}),
		)
		.await;
		let reason = match attempt {
			Ok(Ok(body)) => match SearchResponse::from_body(&body, request.max_results) {
				Ok(response) if !response.is_empty() => {
					return Ok(HybridOutcome {
						state: HybridState::Success,
						response,
						backend_calls: 1,
					});
				},
				Ok(_) => "empty".to_string(),
				Err(err) => format!("malformed: {err}"),
			},
			Ok(Err(err)) => format!("error: {err}"),
			Err(_) => "timeout".to_string(),
		};

		tracing::warn!(
			collection = collection.as_str(),
			state = ?HybridState::AttemptingFallback,
			reason = %reason,
			"Hybrid search failed. Falling back to lexical search."
		);

		if let Some(response) = self.fallback(collection, request).await {
			return Ok(HybridOutcome { state: HybridState::Success, response, backend_calls: 2 });
		}

		tracing::warn!(
			collection = collection.as_str(),
			state = ?HybridState::Empty,
			"Search returned no results."
		);

		Ok(HybridOutcome {
			state: HybridState::Empty,
			response: SearchResponse::empty(request.max_results),
			backend_calls: 2,
		})
	}

	async fn fallback(&self, collection: Collection, request: &SearchRequest) -> Option<SearchResponse> {
		let document = match self.builder.build_fallback(collection, request) {
			Ok(document) => document,
			Err(err) => {
				tracing::warn!(error = %err, "Failed to build fallback query.");

				return None;
			},
		};
		let body = match self
			.backend
			.search(BackendRequest {
				endpoint: collection.endpoint(),
				document: document.to_value(),
				pipeline: None,
				timeout: None,
			})
			.await
		{
			Ok(body) => body,
			Err(err) => {
				tracing::warn!(error = %err, "Fallback search failed.");

				return None;
			},
		};

		match SearchResponse::from_body(&body, request.max_results) {
			Ok(response) if !response.is_empty() => Some(response),
			Ok(_) => None,
			Err(err) => {
				tracing::warn!(error = %err, "Fallback search returned a malformed body.");

				None
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use std::{
		collections::VecDeque,
		sync::{
			Arc, Mutex,
			atomic::{AtomicUsize, Ordering},
		},
		time::Duration,
	};

	use serde_json::Value;

	use crate::{
		BackendRequest, BoxFuture, Result, SearchBackend,
		hybrid::{HybridSearchExecutor, HybridState},
		query::{Collection, QueryBuilder, SearchRequest},
	};

	struct QueuedBackend {
		calls: Arc<AtomicUsize>,
		bodies: Mutex<VecDeque<Value>>,
	}
	impl QueuedBackend {
		fn new(bodies: Vec<Value>) -> Self {
			Self { calls: Arc::new(AtomicUsize::new(0)), bodies: Mutex::new(bodies.into()) }
		}
	}
	impl SearchBackend for QueuedBackend {
		fn search<'a>(&'a self, _request: BackendRequest<'a>) -> BoxFuture<'a, Result<Value>> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			let body = self.bodies.lock().expect("bodies lock poisoned").pop_front().unwrap_or(Value::Null);

			Box::pin(async move { Ok(body) })
		}
	}

	fn request() -> SearchRequest {
		SearchRequest {
			query_text: Some("guidance".to_string()),
			filters: Vec::new(),
			max_results: 10,
			min_score: 0.2,
		}
	}

	async fn run(backend: &QueuedBackend) -> crate::hybrid::HybridOutcome {
		let builder = QueryBuilder::new(&aiera_config::Search::default());
		let executor = HybridSearchExecutor {
			backend,
			builder: &builder,
			pipeline: "hybrid_search_pipeline",
			hybrid_timeout: Duration::from_secs(15),
		};

		executor.execute(Collection::Transcripts, &request()).await.expect("execute failed")
	}

	#[tokio::test]
	async fn malformed_hybrid_body_triggers_one_fallback() {
		let backend = QueuedBackend::new(vec![
			serde_json::json!({ "response": 3 }),
			serde_json::json!({ "response": [{ "content_id": 4, "text": "Guidance raised." }] }),
		]);
		let outcome = run(&backend).await;

		assert_eq!(outcome.state, HybridState::Success);
		assert_eq!(outcome.backend_calls, 2);
		assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
		assert_eq!(outcome.response.hits()[0].content_id, 4);
	}

	#[tokio::test]
	async fn hybrid_hits_need_no_fallback() {
		let backend = QueuedBackend::new(vec![serde_json::json!({ "data": [{ "content_id": 1 }] })]);
		let outcome = run(&backend).await;

		assert_eq!(outcome.state, HybridState::Success);
		assert_eq!(outcome.backend_calls, 1);
	}

	#[tokio::test]
	async fn empty_fallback_ends_empty() {
		let backend = QueuedBackend::new(Vec::new());
		let outcome = run(&backend).await;

		assert_eq!(outcome.state, HybridState::Empty);
		assert_eq!(outcome.backend_calls, 2);
		assert!(outcome.response.is_empty());
	}
}
