use std::{
	collections::VecDeque,
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use serde_json::Value;

use aiera_search::{
	BackendRequest, BoxFuture, CompanyAliases, Error, Result, SearchBackend, SearchFilingsRequest,
	SearchResponse, SearchService, SearchTranscriptsRequest, Strategy,
};

enum Reply {
	Body(Value),
	Fail,
	Hang,
}

struct Seen {
	endpoint: String,
	document: Value,
	pipeline: Option<String>,
	timeout: Option<Duration>,
}

/// Replays scripted replies in order and records every request. An exhausted script answers with
/// an empty result list.
struct ScriptedBackend {
	calls: Arc<AtomicUsize>,
	replies: Mutex<VecDeque<Reply>>,
	seen: Mutex<Vec<Seen>>,
}
impl ScriptedBackend {
	fn new(replies: Vec<Reply>) -> Arc<Self> {
		Arc::new(Self {
			calls: Arc::new(AtomicUsize::new(0)),
			replies: Mutex::new(replies.into()),
			seen: Mutex::new(Vec::new()),
		})
	}

	fn count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	fn seen<T>(&self, f: impl FnOnce(&[Seen]) -> T) -> T {
		f(&self.seen.lock().expect("seen lock poisoned"))
	}
}
impl SearchBackend for ScriptedBackend {
	fn search<'a>(&'a self, request: BackendRequest<'a>) -> BoxFuture<'a, Result<Value>> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		self.seen.lock().expect("seen lock poisoned").push(Seen {
			endpoint: request.endpoint.to_string(),
			document: request.document.clone(),
			pipeline: request.pipeline.map(str::to_string),
			timeout: request.timeout,
		});

		let reply = self
			.replies
			.lock()
			.expect("replies lock poisoned")
			.pop_front()
			.unwrap_or_else(|| Reply::Body(serde_json::json!({ "response": [] })));

		Box::pin(async move {
			match reply {
				Reply::Body(body) => Ok(body),
				Reply::Fail => Err(Error::Backend { message: "backend unavailable".to_string() }),
				Reply::Hang => {
					tokio::time::sleep(Duration::from_secs(3_600)).await;

					Ok(Value::Null)
				},
			}
		})
	}
}

fn service(backend: &Arc<ScriptedBackend>) -> SearchService {
	SearchService::new(aiera_config::Search::default(), backend.clone())
}

fn paginated(hits: Vec<Value>) -> Value {
	serde_json::json!({
		"response": {
			"pagination": { "total_count": hits.len(), "current_page": 1, "page_size": 20 },
			"result": hits
		}
	})
}

fn segment(content_id: i64, text: &str, score: f64) -> Value {
	serde_json::json!({
		"content_id": content_id,
		"text": text,
		"title": "Q4 2023 Earnings Call",
		"transcript_event_id": 2_108_591,
		"date": "2024-01-25T17:00:00",
		"_score": score
	})
}

fn filing(content_id: i64, title: &str) -> Value {
	serde_json::json!({ "content_id": content_id, "title": title, "date": "2024-02-01", "_score": 5.0 })
}

fn transcripts_request(raw: Value) -> SearchTranscriptsRequest {
	serde_json::from_value(raw).expect("Failed to parse transcripts request.")
}

fn filings_request(company: &str) -> SearchFilingsRequest {
	serde_json::from_value(serde_json::json!({ "company_name": company }))
		.expect("Failed to parse filings request.")
}

fn strategy(response: &SearchResponse) -> Option<Strategy> {
	response.search_metadata.as_ref().and_then(|metadata| metadata.strategy)
}

#[tokio::test]
async fn hybrid_search_returns_scored_hits_in_backend_order() {
	let backend = ScriptedBackend::new(vec![Reply::Body(paginated(vec![
		segment(11, "Input cost inflation moderated.", 9.1),
		segment(12, "We expect inflation costs to ease.", 4.2),
	]))]);
	let response = service(&backend)
		.search_transcripts(transcripts_request(serde_json::json!({
			"query_text": "inflation costs",
			"max_results": 20,
		})))
		.await
		.expect("Search failed.");

	assert_eq!(backend.count(), 1);
	assert_eq!(response.hits().len(), 2);
	assert_eq!(response.hits()[0].content_id, 11);
	assert_eq!(response.hits()[0].score, Some(9.1));
	assert_eq!(response.hits()[1].score, Some(4.2));
	assert_eq!(response.instructions.len(), 2);

	backend.seen(|seen| {
		let request = &seen[0];
		let neural = &request.document["query"]["hybrid"]["queries"][0]["neural"]["embedding"];

		assert_eq!(request.endpoint, "/chat-support/search/transcripts");
		assert_eq!(request.pipeline.as_deref(), Some("hybrid_search_pipeline"));
		assert_eq!(request.timeout, Some(Duration::from_secs(15)));
		assert_eq!(neural["k"], 40);
		assert!(neural.get("filter").is_none());
	});
}

#[tokio::test(start_paused = true)]
async fn hybrid_timeout_falls_back_to_phrase_query() {
	let backend = ScriptedBackend::new(vec![
		Reply::Hang,
		Reply::Body(paginated(vec![segment(21, "Inflation pressure persisted.", 2.0)])),
	]);
	let response = service(&backend)
		.search_transcripts(transcripts_request(serde_json::json!({
			"query_text": "inflation",
			"event_ids": "2108591",
		})))
		.await
		.expect("Timeout must not propagate.");

	assert_eq!(backend.count(), 2);
	assert_eq!(response.hits().len(), 1);
	assert_eq!(response.hits()[0].content_id, 21);

	backend.seen(|seen| {
		let fallback = &seen[1];
		let query = &fallback.document["query"]["bool"];

		assert_eq!(fallback.endpoint, seen[0].endpoint);
		assert_eq!(fallback.pipeline, None);
		assert_eq!(fallback.timeout, None);
		assert_eq!(query["should"][0]["match_phrase"]["text"]["query"], "inflation");
		assert_eq!(query["filter"][0], serde_json::json!({ "terms": { "transcript_event_id": [2108591] } }));
	});
}

#[tokio::test]
async fn empty_hybrid_result_triggers_fallback() {
	let backend = ScriptedBackend::new(vec![
		Reply::Body(paginated(Vec::new())),
		Reply::Body(serde_json::json!({ "data": [segment(31, "Pricing held.", 1.5)] })),
	]);
	let response = service(&backend)
		.search_transcripts(transcripts_request(serde_json::json!({ "query_text": "pricing" })))
		.await
		.expect("Search failed.");

	assert_eq!(backend.count(), 2);
	assert_eq!(response.hits()[0].content_id, 31);
	assert_eq!(response.response.pagination.total_count, 1);
}

#[tokio::test]
async fn malformed_hybrid_body_triggers_single_fallback() {
	let backend = ScriptedBackend::new(vec![
		Reply::Body(serde_json::json!({ "response": 3 })),
		Reply::Body(paginated(vec![segment(51, "Capex guidance unchanged.", 1.2)])),
	]);
	let response = service(&backend)
		.search_transcripts(transcripts_request(serde_json::json!({ "query_text": "capex" })))
		.await
		.expect("A malformed hybrid body must not propagate.");

	assert_eq!(backend.count(), 2);
	assert_eq!(response.hits()[0].content_id, 51);

	backend.seen(|seen| {
		assert_eq!(seen[0].pipeline.as_deref(), Some("hybrid_search_pipeline"));
		assert_eq!(seen[1].pipeline, None);
	});
}

#[tokio::test]
async fn large_filtered_requests_cap_neural_depth() {
	let backend =
		ScriptedBackend::new(vec![Reply::Body(paginated(vec![segment(61, "Inflation eased.", 3.0)]))]);
	let response = service(&backend)
		.search_transcripts(transcripts_request(serde_json::json!({
			"query_text": "inflation",
			"event_ids": [1],
			"max_results": 150,
		})))
		.await
		.expect("Limits above one hundred are accepted.");

	assert_eq!(response.hits().len(), 1);

	backend.seen(|seen| {
		let neural = &seen[0].document["query"]["hybrid"]["queries"][0]["neural"]["embedding"];

		assert_eq!(neural["k"], 10_000);
		assert_eq!(seen[0].document["size"], 150);
	});
}

#[tokio::test]
async fn failed_fallback_ends_with_empty_envelope() {
	let backend = ScriptedBackend::new(vec![Reply::Fail, Reply::Fail]);
	let response = service(&backend)
		.search_transcripts(transcripts_request(serde_json::json!({
			"query_text": "buybacks",
			"max_results": 15,
		})))
		.await
		.expect("Errors on the hybrid path must be absorbed.");

	assert_eq!(backend.count(), 2);
	assert!(response.is_empty());
	assert!(response.instructions.is_empty());
	assert_eq!(response.response.pagination.total_count, 0);
	assert_eq!(response.response.pagination.current_page, 1);
	assert_eq!(response.response.pagination.page_size, 15);
}

#[tokio::test]
async fn browse_builds_plain_filter_query() {
	let backend = ScriptedBackend::new(vec![Reply::Body(paginated(vec![segment(41, "Welcome.", 1.0)]))]);
	let response = service(&backend)
		.search_transcripts(transcripts_request(serde_json::json!({
			"query_text": "",
			"event_ids": [2108591],
		})))
		.await
		.expect("Browse failed.");

	assert_eq!(response.hits().len(), 1);

	backend.seen(|seen| {
		let document = &seen[0].document;

		assert_eq!(document["query"], serde_json::json!({ "terms": { "transcript_event_id": [2108591] } }));
		assert_eq!(document["sort"], serde_json::json!([{ "date": { "order": "desc" } }]));
		assert_eq!(seen[0].pipeline, None);
		assert!(!document.to_string().contains("neural"));
	});
}

#[tokio::test]
async fn browse_errors_propagate() {
	let backend = ScriptedBackend::new(vec![Reply::Fail]);
	let err = service(&backend)
		.search_transcripts(transcripts_request(serde_json::json!({ "event_ids": "2108591" })))
		.await
		.expect_err("Browse errors must surface.");

	assert!(matches!(err, Error::Backend { .. }), "Unexpected error: {err:?}");
	assert_eq!(backend.count(), 1);
}

#[tokio::test]
async fn validated_direct_stage_short_circuits_cascade() {
	let backend = ScriptedBackend::new(vec![Reply::Body(paginated(vec![
		filing(1, "Apple Inc. - 10-K"),
		filing(2, "Apple Inc. - 10-Q"),
		filing(3, "Apple Inc. - 8-K"),
	]))]);
	let response = service(&backend)
		.search_filings(filings_request("Apple"))
		.await
		.expect("Search failed.");
	let metadata = response.search_metadata.as_ref().expect("metadata missing");

	assert_eq!(backend.count(), 1);
	assert_eq!(metadata.strategy, Some(Strategy::Direct));
	assert_eq!(metadata.backend_calls, 1);
	assert_eq!(metadata.validated_count, 3);
	assert_eq!(response.hits()[0].document_type.as_deref(), Some("10-K"));
	assert_eq!(response.hits()[0].company_name.as_deref(), Some("Apple Inc."));
}

#[tokio::test]
async fn discovery_retries_with_stripped_name() {
	let backend = ScriptedBackend::new(vec![
		Reply::Body(paginated(Vec::new())),
		Reply::Body(paginated(vec![filing(7, "Yum! Brands, Inc. - 10-K")])),
	]);
	let response = service(&backend)
		.search_filings(filings_request("Yum! Brands"))
		.await
		.expect("Search failed.");

	assert_eq!(backend.count(), 2);
	assert_eq!(strategy(&response), Some(Strategy::Discovery));
	assert_eq!(response.hits().len(), 1);

	backend.seen(|seen| {
		let company = &seen[1].document["query"]["bool"]["must"][0]["bool"]["should"][0];

		assert_eq!(company["match_phrase"]["title"]["query"], "Yum Brands");
	});
}

#[tokio::test]
async fn context_stage_uses_known_aliases() {
	let backend = ScriptedBackend::new(vec![
		Reply::Body(paginated(Vec::new())),
		Reply::Body(paginated(vec![filing(8, "Johnson & Johnson - 10-Q")])),
	]);
	let response = service(&backend)
		.search_filings(filings_request("JNJ"))
		.await
		.expect("Search failed.");
	let metadata = response.search_metadata.as_ref().expect("metadata missing");

	assert_eq!(backend.count(), 2);
	assert_eq!(metadata.strategy, Some(Strategy::Context));
	assert_eq!(metadata.matched_names, vec!["Johnson & Johnson"]);
	assert_eq!(response.hits().len(), 1);
}

#[tokio::test]
async fn fallback_hits_are_validated_individually() {
	let backend = ScriptedBackend::new(vec![
		Reply::Fail,
		Reply::Body(paginated(vec![
			filing(9, "Acme Widgets Corp - 10-K"),
			filing(10, "Globex Corp - 8-K"),
		])),
	]);
	let response = service(&backend)
		.search_filings(filings_request("Acme Widgets"))
		.await
		.expect("Stage failures must be absorbed.");
	let metadata = response.search_metadata.as_ref().expect("metadata missing");

	assert_eq!(backend.count(), 2);
	assert_eq!(metadata.strategy, Some(Strategy::Fallback));
	assert_eq!(metadata.candidate_count, 2);
	assert_eq!(metadata.validated_count, 1);
	assert_eq!(response.hits()[0].content_id, 9);

	backend.seen(|seen| {
		assert_eq!(seen[1].timeout, Some(Duration::from_secs(10)));
		assert_eq!(seen[1].document["size"], 20);
	});
}

#[tokio::test]
async fn poorly_matching_stage_is_rejected_and_cascade_continues() {
	let mut first = vec![filing(100, "Widgets Inc - 10-K"), filing(101, "Widgets Inc - 10-Q")];

	first.extend((0..8).map(|idx| filing(200 + idx, "Globex Corp - 8-K")));

	let backend = ScriptedBackend::new(vec![
		Reply::Body(paginated(first)),
		Reply::Body(paginated(vec![filing(300, "Widget Holdings plc - 10-K")])),
	]);
	let aliases = CompanyAliases::from_entries([(
		vec!["widgets".to_string()],
		vec!["Widget Holdings plc".to_string()],
	)]);
	let response = service(&backend)
		.with_aliases(aliases)
		.search_filings(filings_request("Widgets"))
		.await
		.expect("Search failed.");
	let metadata = response.search_metadata.as_ref().expect("metadata missing");

	assert_eq!(backend.count(), 2);
	assert_eq!(metadata.strategy, Some(Strategy::Context));
	assert_eq!(metadata.matched_names, vec!["Widget Holdings plc"]);
	assert_eq!(response.hits().len(), 1);
	assert_eq!(response.hits()[0].content_id, 300);
}

#[tokio::test]
async fn cascade_never_repeats_a_name() {
	let backend = ScriptedBackend::new(Vec::new());
	let response = service(&backend)
		.search_filings(filings_request("Yum! Brands"))
		.await
		.expect("An exhausted cascade is not an error.");

	assert!(response.is_empty());
	assert_eq!(backend.count(), 5);

	backend.seen(|seen| {
		let primaries: Vec<&str> = seen[..4]
			.iter()
			.map(|request| {
				request.document["query"]["bool"]["must"][0]["bool"]["should"][0]["match_phrase"]
					["title"]["query"]
					.as_str()
					.expect("primary phrase missing")
			})
			.collect();

		assert_eq!(primaries, vec!["Yum! Brands", "Yum Brands", "Yum! Brands, Inc.", "YUM"]);
		assert_eq!(seen[4].timeout, Some(Duration::from_secs(10)));
	});
}

#[tokio::test]
async fn exhausted_cascade_reports_suggestions() {
	let backend = ScriptedBackend::new(Vec::new());
	let response = service(&backend)
		.search_filings(filings_request("Acme Widgets"))
		.await
		.expect("An exhausted cascade is not an error.");

	assert_eq!(backend.count(), 2);
	assert!(response.is_empty());
	assert_eq!(response.response.pagination.total_count, 0);
	assert_eq!(response.response.pagination.page_size, 20);
	assert!(
		response.instructions.iter().any(|line| line.contains("expanding the time window")),
		"Missing suggestion: {:?}",
		response.instructions
	);
	assert!(response.instructions.iter().any(|line| line.contains("include_amendments")));
}

#[tokio::test]
async fn blank_company_is_rejected_before_any_call() {
	let backend = ScriptedBackend::new(Vec::new());
	let err = service(&backend)
		.search_filings(filings_request("   "))
		.await
		.expect_err("Expected an invalid argument.");

	assert!(matches!(err, Error::InvalidArgument { .. }), "Unexpected error: {err:?}");
	assert_eq!(backend.count(), 0);
}
