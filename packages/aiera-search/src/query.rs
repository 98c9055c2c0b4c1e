pub mod clause;
pub mod filings;

pub use clause::{BoolClause, FilterClause};

use serde_json::{Map, Value};

use crate::{Error, Result};

pub const NEURAL_FIELD: &str = "embedding";
pub const DATE_FIELD: &str = "date";

const PHRASE_BOOST: f64 = 3.0;
const BROAD_MATCH_BOOST: f64 = 1.0;

/// A searchable collection on the backing service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Collection {
	Transcripts,
	Filings,
	FilingChunks,
}
impl Collection {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Transcripts => "transcripts",
			Self::Filings => "filings",
			Self::FilingChunks => "filing_chunks",
		}
	}

	pub fn endpoint(self) -> &'static str {
		match self {
			Self::Transcripts => "/chat-support/search/transcripts",
			Self::Filings => "/chat-support/search/filings",
			Self::FilingChunks => "/chat-support/search/filing-chunks",
		}
	}

	fn primary_field(self) -> &'static str {
		match self {
			Self::Filings => "title",
			Self::Transcripts | Self::FilingChunks => "text",
		}
	}

	/// Identity fields scored next to text and title.
	fn secondary_fields(self) -> &'static [&'static str] {
		match self {
			Self::Transcripts => &["speaker_name"],
			Self::Filings => &["company_name", "issuer_name"],
			Self::FilingChunks => &["company_common_name"],
		}
	}

	fn lexical_fields(self) -> Vec<String> {
		let primary = self.primary_field();
		let mut fields = vec![format!("{primary}^2")];

		if primary != "title" {
			fields.push("title".to_string());
		}

		fields.extend(self.secondary_fields().iter().map(|field| (*field).to_string()));

		fields
	}

	fn phrase_fields(self) -> Vec<&'static str> {
		let mut fields = vec![self.primary_field()];

		if self.primary_field() != "title" {
			fields.push("title");
		}

		fields.extend(self.secondary_fields());

		fields
	}

	pub fn source_fields(self) -> &'static [&'static str] {
		match self {
			Self::Transcripts => &[
				"content_id",
				"text",
				"title",
				"transcript_event_id",
				"speaker_name",
				"speaker_title",
				"date",
				"section",
				"transcript_section",
				"company_name",
				"primary_company_id",
				"primary_equity_id",
				"citation_information",
			],
			Self::Filings => &[
				"content_id",
				"title",
				"company_name",
				"issuer_name",
				"entity_name",
				"document_type",
				"form_type",
				"filing_type",
				"date",
				"filing_date",
				"filing_id",
				"citation_information",
			],
			Self::FilingChunks => &[
				"content_id",
				"text",
				"title",
				"company_common_name",
				"company_legal_name",
				"filing_id",
				"filing_form_id",
				"filing_type",
				"date",
				"chunk_id",
				"citation_information",
			],
		}
	}
}

/// Collection-agnostic search input produced from a tool request.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchRequest {
	pub query_text: Option<String>,
	pub filters: Vec<FilterClause>,
	pub max_results: u32,
	pub min_score: f64,
}
impl SearchRequest {
	/// Trimmed free text, or `None` for a pure filter/browse request.
	pub fn query_text(&self) -> Option<&str> {
		self.query_text.as_deref().map(str::trim).filter(|text| !text.is_empty())
	}

	pub fn is_browse(&self) -> bool {
		self.query_text().is_none()
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortKey {
	pub field: &'static str,
	pub descending: bool,
}
impl SortKey {
	pub const fn desc(field: &'static str) -> Self {
		Self { field, descending: true }
	}

	pub const fn asc(field: &'static str) -> Self {
		Self { field, descending: false }
	}

	fn to_value(self) -> Value {
		let order = if self.descending { "desc" } else { "asc" };

		serde_json::json!({ self.field: { "order": order } })
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct NeuralQuery {
	pub field: &'static str,
	pub query_text: String,
	pub k: u32,
	pub filter: Option<FilterClause>,
}
impl NeuralQuery {
	fn to_value(&self) -> Value {
		let mut body = Map::new();

		body.insert("query_text".to_string(), Value::String(self.query_text.clone()));
		body.insert("k".to_string(), Value::from(self.k));

		if let Some(filter) = &self.filter {
			body.insert("filter".to_string(), filter.to_value());
		}

		serde_json::json!({ "neural": { self.field: body } })
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct LexicalQuery {
	pub query_text: String,
	pub fields: Vec<String>,
	pub filter: Option<FilterClause>,
}
impl LexicalQuery {
	fn to_value(&self) -> Value {
		let multi_match = FilterClause::MultiMatch {
			query: self.query_text.clone(),
			fields: self.fields.clone(),
			boost: None,
			minimum_should_match: None,
		};

		match &self.filter {
			None => multi_match.to_value(),
			Some(filter) => BoolClause {
				must: vec![multi_match],
				filter: vec![filter.clone()],
				..Default::default()
			}
			.to_value(),
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub enum QueryShape {
	/// Neural and lexical branches, each carrying its own copy of the filter predicate.
	Hybrid { neural: NeuralQuery, lexical: LexicalQuery },
	Plain(FilterClause),
}
impl QueryShape {
	fn to_value(&self) -> Value {
		match self {
			Self::Hybrid { neural, lexical } => serde_json::json!({
				"hybrid": { "queries": [neural.to_value(), lexical.to_value()] }
			}),
			Self::Plain(clause) => clause.to_value(),
		}
	}
}

/// The assembled query sent to the backing search service.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryDocument {
	pub query: QueryShape,
	pub size: u32,
	pub min_score: Option<f64>,
	pub source: &'static [&'static str],
	pub sort: Vec<SortKey>,
	pub timeout: Option<String>,
}
impl QueryDocument {
	pub fn to_value(&self) -> Value {
		let mut body = Map::new();

		body.insert("query".to_string(), self.query.to_value());
		body.insert("size".to_string(), Value::from(self.size));

		if let Some(min_score) = self.min_score {
			body.insert("min_score".to_string(), Value::from(min_score));
		}

		body.insert(
			"_source".to_string(),
			Value::Array(self.source.iter().map(|field| Value::from(*field)).collect()),
		);

		if !self.sort.is_empty() {
			body.insert(
				"sort".to_string(),
				Value::Array(self.sort.iter().map(|key| key.to_value()).collect()),
			);
		}
		if let Some(timeout) = &self.timeout {
			body.insert("timeout".to_string(), Value::String(timeout.clone()));
		}

		Value::Object(body)
	}
}

/// Builds query documents for every collection.
#[derive(Clone, Debug)]
pub struct QueryBuilder {
	neural_k_multiplier: u32,
	neural_k_cap: u32,
	filings_timeout_ms: u64,
	fallback_timeout_ms: u64,
	fallback_max_results: u32,
}
impl QueryBuilder {
	pub fn new(cfg: &aiera_config::Search) -> Self {
		Self {
			neural_k_multiplier: cfg.neural_k_multiplier,
			neural_k_cap: cfg.neural_k_cap,
			filings_timeout_ms: cfg.filings_timeout_ms,
			fallback_timeout_ms: cfg.fallback_timeout_ms,
			fallback_max_results: cfg.fallback_max_results,
		}
	}

	/// Retrieval depth for the neural branch.
	///
	/// Filters are applied inside approximate nearest-neighbour retrieval, so a filtered search
	/// needs a much deeper candidate pool to keep recall.
	pub fn neural_k(&self, max_results: u32, has_filters: bool) -> u32 {
		if has_filters {
			max_results.saturating_mul(self.neural_k_multiplier).min(self.neural_k_cap)
		} else {
			max_results.saturating_mul(2)
		}
	}

	pub fn build(&self, collection: Collection, request: &SearchRequest) -> Result<QueryDocument> {
		validate_limits(request.max_results, request.min_score)?;

		let Some(query_text) = request.query_text() else {
			return Ok(QueryDocument {
				query: QueryShape::Plain(FilterClause::all(request.filters.clone())),
				size: request.max_results,
				min_score: Some(request.min_score),
				source: collection.source_fields(),
				sort: vec![SortKey::desc(DATE_FIELD)],
				timeout: None,
			});
		};
		let filter = if request.filters.is_empty() {
			None
		} else {
			Some(FilterClause::all(request.filters.clone()))
		};
		let neural = NeuralQuery {
			field: NEURAL_FIELD,
			query_text: query_text.to_string(),
			k: self.neural_k(request.max_results, filter.is_some()),
			filter: filter.clone(),
		};
		let lexical = LexicalQuery {
			query_text: query_text.to_string(),
			fields: collection.lexical_fields(),
			filter,
		};

		Ok(QueryDocument {
			query: QueryShape::Hybrid { neural, lexical },
			size: request.max_results,
			min_score: Some(request.min_score),
			source: collection.source_fields(),
			sort: Vec::new(),
			timeout: None,
		})
	}

	/// Pure lexical query used when the hybrid attempt fails.
	pub fn build_fallback(
		&self,
		collection: Collection,
		request: &SearchRequest,
	) -> Result<QueryDocument> {
		validate_limits(request.max_results, request.min_score)?;

		let query_text = request.query_text().ok_or_else(|| Error::InvalidArgument {
			message: "query_text is required for a lexical fallback query.".to_string(),
		})?;
		let mut should: Vec<FilterClause> = collection
			.phrase_fields()
			.into_iter()
			.map(|field| FilterClause::match_phrase(field, query_text, PHRASE_BOOST))
			.collect();

		should.push(FilterClause::MultiMatch {
			query: query_text.to_string(),
			fields: collection.lexical_fields(),
			boost: Some(BROAD_MATCH_BOOST),
			minimum_should_match: None,
		});

		let query = BoolClause {
			should,
			filter: request.filters.clone(),
			minimum_should_match: Some(1),
			..Default::default()
		};

		Ok(QueryDocument {
			query: QueryShape::Plain(FilterClause::Bool(query)),
			size: request.max_results,
			min_score: Some(request.min_score),
			source: collection.source_fields(),
			sort: Vec::new(),
			timeout: None,
		})
	}
}

pub(crate) fn validate_limits(max_results: u32, min_score: f64) -> Result<()> {
	if max_results == 0 {
		return Err(Error::InvalidArgument {
			message: "max_results must be greater than zero.".to_string(),
		});
	}
	if !min_score.is_finite() || min_score < 0.0 {
		return Err(Error::InvalidArgument {
			message: "min_score must be a finite number of zero or greater.".to_string(),
		});
	}

	Ok(())
}
