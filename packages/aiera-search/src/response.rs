use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{Date, OffsetDateTime};

use crate::{Error, Result, filings::Strategy, request::DATE_FORMAT};

pub const CITATION_PROMPT: &str = "IMPORTANT: when referencing this data in your response, ALWAYS include inline citations by using the information found in the `citation_information` block, along with an incrementing counter. Render these citations as markdown (padded with a leading space for readability), like this: [[1]](url \"title\")

Where possible, include inline citations for every fact, figure, or quote that was sourced, directly or indirectly, from a transcript by using transcript-level citations (as opposed to event-level citations).

If multiple citations are relevant, include them all. You can reference the same citation multiple times if needed.

However, if the user has requested a response as JSON, you do NOT need to include any citations.";

/// Longest suffix after `" - "` still treated as a form name when deriving hit metadata.
const MAX_DERIVED_FORM_LEN: usize = 24;

/// The two backing response shapes, plus the absence of any result list.
#[derive(Clone, Debug, PartialEq)]
pub enum Envelope {
	Paginated { hits: Vec<Value>, pagination: Option<Pagination> },
	Bare(Vec<Value>),
	Empty,
}
impl Envelope {
	pub fn into_hits(self) -> (Vec<NormalizedHit>, Option<Pagination>) {
		match self {
			Self::Paginated { hits, pagination } =>
				(hits.iter().filter_map(NormalizedHit::from_raw).collect(), pagination),
			Self::Bare(hits) => (hits.iter().filter_map(NormalizedHit::from_raw).collect(), None),
			Self::Empty => (Vec::new(), None),
		}
	}
}

/// Classifies a backing response body.
pub fn decode_envelope(body: &Value) -> Result<Envelope> {
	match body {
		Value::Null => Ok(Envelope::Empty),
		Value::Array(items) => Ok(bare(items)),
		Value::Object(object) => {
			let inner = object.get("response").or_else(|| object.get("data"));

			match inner {
				Some(Value::Null) => Ok(Envelope::Empty),
				Some(Value::Array(items)) => Ok(bare(items)),
				Some(Value::Object(inner)) => paginated(inner),
				Some(other) => Err(Error::InvalidResponse {
					message: format!("Unexpected response payload type: {}.", type_name(other)),
				}),
				None if object.contains_key("result") => paginated(object),
				None if object.contains_key("hits") => raw_hits(object),
				None => Err(Error::InvalidResponse {
					message: "Response body carries neither response, data, result nor hits.".to_string(),
				}),
			}
		},
		other => Err(Error::InvalidResponse {
			message: format!("Unexpected response body type: {}.", type_name(other)),
		}),
	}
}

fn bare(items: &[Value]) -> Envelope {
	if items.is_empty() { Envelope::Empty } else { Envelope::Bare(items.to_vec()) }
}

fn paginated(object: &Map<String, Value>) -> Result<Envelope> {
	let hits = match object.get("result") {
		Some(Value::Array(items)) => items.clone(),
		Some(Value::Null) | None => Vec::new(),
		Some(other) => {
			return Err(Error::InvalidResponse {
				message: format!("Unexpected result type: {}.", type_name(other)),
			});
		},
	};
	let pagination =
		object.get("pagination").and_then(|raw| serde_json::from_value(raw.clone()).ok());

	Ok(Envelope::Paginated { hits, pagination })
}

/// Raw search-engine shape: `{ "hits": { "total": { "value": n }, "hits": [...] } }`.
fn raw_hits(object: &Map<String, Value>) -> Result<Envelope> {
	let hits = object.get("hits").and_then(|hits| hits.get("hits")).and_then(Value::as_array);
	let Some(hits) = hits else {
		return Err(Error::InvalidResponse { message: "Malformed hits section.".to_string() });
	};
	let total = object
		.get("hits")
		.and_then(|hits| hits.get("total"))
		.and_then(|total| total.get("value").or(Some(total)))
		.and_then(Value::as_u64);
	let pagination = total.map(|total_count| Pagination {
		total_count,
		current_page: 1,
		page_size: hits.len() as u32,
	});

	Ok(Envelope::Paginated { hits: hits.clone(), pagination })
}

fn type_name(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "bool",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
	#[serde(default)]
	pub total_count: u64,
	#[serde(default = "default_page")]
	pub current_page: u32,
	#[serde(default)]
	pub page_size: u32,
}

/// Public result record.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NormalizedHit {
	pub content_id: Value,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub text: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub company_name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub date: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub document_type: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub score: Option<f64>,
	/// Every other source field, passed through unchanged.
	#[serde(flatten)]
	pub fields: Map<String, Value>,
}
impl NormalizedHit {
	/// Builds a hit from one raw result item, merging `_source` when present.
	///
	/// Returns `None` for items that are not JSON objects.
	pub fn from_raw(raw: &Value) -> Option<Self> {
		let object = raw.as_object()?;
		let mut fields = match object.get("_source") {
			Some(Value::Object(source)) => {
				let mut merged = source.clone();

				for (key, value) in object {
					if key != "_source" {
						merged.entry(key.clone()).or_insert_with(|| value.clone());
					}
				}

				merged
			},
			_ => object.clone(),
		};
		let content_id =
			fields.remove("content_id").or_else(|| fields.remove("_id")).unwrap_or(Value::Null);
		let score = take_score(&mut fields);
		let title = take_string(&mut fields, "title");
		let text = take_string(&mut fields, "text");
		let mut company_name = take_string(&mut fields, "company_name");
		let date = take_string(&mut fields, "date");
		let mut document_type = take_string(&mut fields, "document_type").or_else(|| {
			["form_type", "filing_type"]
				.iter()
				.find_map(|key| fields.get(*key).and_then(Value::as_str).map(str::to_string))
		});

		if (company_name.is_none() || document_type.is_none())
			&& let Some((company, form)) = title.as_deref().and_then(split_title)
		{
			company_name = company_name.or(Some(company));
			document_type = document_type.or(Some(form));
		}

		Some(Self { content_id, title, text, company_name, date, document_type, score, fields })
	}

	pub fn field_str(&self, key: &str) -> Option<&str> {
		self.fields.get(key).and_then(Value::as_str)
	}

	/// Calendar date from the first ten characters of `date`, if it parses.
	pub fn parsed_date(&self) -> Option<Date> {
		let raw = self.date.as_deref()?;

		Date::parse(raw.get(..10)?, DATE_FORMAT).ok()
	}
}

/// Splits titles shaped like `"<Company> - <FORM>"`.
fn split_title(title: &str) -> Option<(String, String)> {
	let (company, form) = title.rsplit_once(" - ")?;
	let (company, form) = (company.trim(), form.trim());

	if company.is_empty() || form.is_empty() || form.len() > MAX_DERIVED_FORM_LEN {
		return None;
	}

	Some((company.to_string(), form.to_string()))
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
	match fields.remove(key)? {
		Value::String(value) => Some(value),
		Value::Null => None,
		other => Some(other.to_string()),
	}
}

fn take_score(fields: &mut Map<String, Value>) -> Option<f64> {
	let primary = fields.remove("_score").and_then(|score| score.as_f64());
	let secondary = fields.remove("score").and_then(|score| score.as_f64());

	primary.or(secondary)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultPage {
	pub pagination: Pagination,
	pub result: Vec<NormalizedHit>,
}

/// Diagnostics attached to filings responses.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchMetadata {
	pub strategy: Option<Strategy>,
	pub matched_names: Vec<String>,
	pub backend_calls: usize,
	pub candidate_count: usize,
	pub validated_count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchResponse {
	pub instructions: Vec<String>,
	pub response: ResultPage,
	#[serde(rename = "_search_metadata", skip_serializing_if = "Option::is_none")]
	pub search_metadata: Option<SearchMetadata>,
}
impl SearchResponse {
	/// Zero results with an empty but well-formed envelope.
	pub fn empty(page_size: u32) -> Self {
		Self::from_hits(Vec::new(), page_size, Vec::new())
	}

	pub fn from_hits(hits: Vec<NormalizedHit>, page_size: u32, instructions: Vec<String>) -> Self {
		let pagination =
			Pagination { total_count: hits.len() as u64, current_page: 1, page_size };

		Self { instructions, response: ResultPage { pagination, result: hits }, search_metadata: None }
	}

	/// Normalizes a backing body, defaulting pagination and instructions when absent.
	pub fn from_body(body: &Value, page_size: u32) -> Result<Self> {
		let (hits, pagination) = decode_envelope(body)?.into_hits();
		let instructions = body_instructions(body).unwrap_or_else(standard_instructions);
		let mut response = Self::from_hits(hits, page_size, instructions);

		if let Some(pagination) = pagination {
			response.response.pagination = pagination;
		}

		Ok(response)
	}

	pub fn hits(&self) -> &[NormalizedHit] {
		&self.response.result
	}

	pub fn is_empty(&self) -> bool {
		self.response.result.is_empty()
	}
}

/// Usage preamble stamped with today's date, followed by the citation prompt.
pub fn standard_instructions() -> Vec<String> {
	let today = OffsetDateTime::now_utc().date();

	vec![
		format!(
			"This data is provided for institutional finance professionals. Responses should be composed of accurate, concise, and well-structured financial insights.
The current date is **{today}**.
Relative dates and times (e.g., \"last 3 months\" or \"next 3 months\" or \"later today\") should be calculated based on this date.
All dates and times are in eastern time (ET) unless specifically stated otherwise.

## Usage Hints:
- Questions about guidance will always require the transcript from at least one earnings event, and often will require multiple earnings transcripts from the last year in order to provide sufficient context.
- Answers to guidance questions should focus on management commentary, and avoid analyst commentary unless specifically asked for.

Some endpoints may require specific permissions based on a subscription plan. If access is denied, the user should talk to their Aiera representative about gaining access."
		),
		CITATION_PROMPT.to_string(),
	]
}

fn body_instructions(body: &Value) -> Option<Vec<String>> {
	let items = body.get("instructions")?.as_array()?;

	Some(items.iter().filter_map(Value::as_str).map(str::to_string).collect())
}

fn default_page() -> u32 {
	1
}
