use serde::{Deserialize, Deserializer};
use serde_json::Value;
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use crate::{
	Error, Result,
	query::{FilterClause, SearchRequest, filings::FilingsCriteria},
};

pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

const SECTION_FIELDS: [&str; 4] =
	["section", "section.keyword", "transcript_section", "transcript_section.keyword"];

#[derive(Clone, Debug, Deserialize)]
pub struct SearchTranscriptsRequest {
	#[serde(default)]
	pub query_text: Option<String>,
	#[serde(default, deserialize_with = "id_list")]
	pub event_ids: Vec<i64>,
	#[serde(default, deserialize_with = "id_list")]
	pub equity_ids: Vec<i64>,
	#[serde(default)]
	pub start_date: Option<String>,
	#[serde(default)]
	pub end_date: Option<String>,
	#[serde(default)]
	pub transcript_section: Option<String>,
	#[serde(default = "default_max_results")]
	pub max_results: u32,
	#[serde(default = "default_min_score")]
	pub min_score: f64,
}
impl SearchTranscriptsRequest {
	pub fn to_search_request(&self) -> Result<SearchRequest> {
		validate_max_results(self.max_results)?;

		let mut filters = Vec::new();

		if !self.event_ids.is_empty() {
			filters.push(FilterClause::terms("transcript_event_id", self.event_ids.iter().copied()));
		}
		if !self.equity_ids.is_empty() {
			filters.push(FilterClause::terms("primary_equity_id", self.equity_ids.iter().copied()));
		}
		if let Some(section) = normalize_section(self.transcript_section.as_deref())? {
			filters.push(FilterClause::any(
				SECTION_FIELDS.iter().map(|field| FilterClause::term(field, section)).collect(),
			));
		}
		if let Some(range) = DateRange::parse(self.start_date.as_deref(), self.end_date.as_deref())? {
			filters.push(range.to_clause());
		}

		Ok(SearchRequest {
			query_text: self.query_text.clone(),
			filters,
			max_results: self.max_results,
			min_score: self.min_score,
		})
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct SearchFilingChunksRequest {
	#[serde(default)]
	pub query_text: Option<String>,
	#[serde(default)]
	pub company_name: Option<String>,
	#[serde(default)]
	pub filing_type: Option<String>,
	#[serde(default, deserialize_with = "id_list")]
	pub filing_ids: Vec<i64>,
	#[serde(default, deserialize_with = "string_list")]
	pub content_ids: Vec<String>,
	#[serde(default)]
	pub start_date: Option<String>,
	#[serde(default)]
	pub end_date: Option<String>,
	#[serde(default = "default_max_results")]
	pub max_results: u32,
	#[serde(default = "default_min_score")]
	pub min_score: f64,
}
impl SearchFilingChunksRequest {
	pub fn to_search_request(&self) -> Result<SearchRequest> {
		validate_max_results(self.max_results)?;

		let mut filters = Vec::new();

		if let Some(company) = non_blank(self.company_name.as_deref()) {
			filters.push(chunk_company_clause(company));
		}
		if let Some(range) = DateRange::parse(self.start_date.as_deref(), self.end_date.as_deref())? {
			filters.push(range.to_clause());
		}
		if let Some(filing_type) = non_blank(self.filing_type.as_deref()) {
			filters.push(FilterClause::any(vec![
				FilterClause::term("filing_type", filing_type),
				FilterClause::Wildcard {
					field: "title".to_string(),
					pattern: format!("*{}*", filing_type.to_uppercase()),
					case_insensitive: true,
					boost: None,
				},
			]));
		}
		if !self.filing_ids.is_empty() {
			filters.push(FilterClause::terms("filing_id", self.filing_ids.iter().copied()));
		}
		if !self.content_ids.is_empty() {
			filters.push(FilterClause::terms("content_id", self.content_ids.iter().cloned()));
		}

		Ok(SearchRequest {
			query_text: self.query_text.clone(),
			filters,
			max_results: self.max_results,
			min_score: self.min_score,
		})
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
	#[default]
	Desc,
	Asc,
	Relevance,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SearchFilingsRequest {
	pub company_name: String,
	#[serde(default, deserialize_with = "string_list")]
	pub document_types: Vec<String>,
	#[serde(default)]
	pub start_date: Option<String>,
	#[serde(default)]
	pub end_date: Option<String>,
	#[serde(default)]
	pub include_amendments: bool,
	#[serde(default)]
	pub sort_by: SortBy,
	#[serde(default = "default_max_results")]
	pub max_results: u32,
}
impl SearchFilingsRequest {
	/// Returns the trimmed company name and the non-company criteria.
	pub fn to_criteria(&self) -> Result<(String, FilingsCriteria)> {
		validate_max_results(self.max_results)?;

		let company = self.company_name.trim();

		if company.is_empty() {
			return Err(Error::InvalidArgument {
				message: "company_name must be non-empty.".to_string(),
			});
		}

		let criteria = FilingsCriteria {
			document_types: self.document_types.clone(),
			date_range: DateRange::parse(self.start_date.as_deref(), self.end_date.as_deref())?,
			include_amendments: self.include_amendments,
			sort_by: self.sort_by,
			max_results: self.max_results,
		};

		Ok((company.to_string(), criteria))
	}
}

/// Inclusive calendar-date bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateRange {
	pub start: Option<Date>,
	pub end: Option<Date>,
}
impl DateRange {
	/// Parses optional `YYYY-MM-DD` bounds. Blank bounds count as absent.
	pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Option<Self>> {
		let start = non_blank(start).map(|raw| parse_date("start_date", raw)).transpose()?;
		let end = non_blank(end).map(|raw| parse_date("end_date", raw)).transpose()?;

		if let (Some(start), Some(end)) = (start, end)
			&& start > end
		{
			return Err(Error::InvalidArgument {
				message: "start_date must not be after end_date.".to_string(),
			});
		}
		if start.is_none() && end.is_none() {
			return Ok(None);
		}

		Ok(Some(Self { start, end }))
	}

	pub fn contains(&self, date: Date) -> bool {
		self.start.is_none_or(|start| date >= start) && self.end.is_none_or(|end| date <= end)
	}

	pub fn to_clause(&self) -> FilterClause {
		FilterClause::Range {
			field: "date".to_string(),
			gte: self.start.map(|date| date.to_string()),
			lte: self.end.map(|date| date.to_string()),
		}
	}
}

pub fn parse_id_list(value: &Value) -> Vec<i64> {
	let parse = |raw: &str| {
		let raw = raw.trim();
		let parsed = raw.parse::<i64>().ok();

		if parsed.is_none() && !raw.is_empty() {
			tracing::debug!(entry = raw, "Skipping invalid id entry.");
		}

		parsed
	};

	match value {
		Value::Number(number) => number.as_i64().into_iter().collect(),
		Value::String(raw) => raw.split(',').filter_map(parse).collect(),
		Value::Array(items) => items
			.iter()
			.filter_map(|item| match item {
				Value::Number(number) => number.as_i64(),
				Value::String(raw) => parse(raw),
				_ => None,
			})
			.collect(),
		_ => Vec::new(),
	}
}

pub fn parse_string_list(value: &Value) -> Vec<String> {
	let entries: Vec<String> = match value {
		Value::String(raw) => raw.split(',').map(str::to_string).collect(),
		Value::Array(items) => items
			.iter()
			.filter_map(|item| match item {
				Value::String(raw) => Some(raw.clone()),
				Value::Number(number) => Some(number.to_string()),
				_ => None,
			})
			.collect(),
		Value::Number(number) => vec![number.to_string()],
		_ => Vec::new(),
	};

	entries
		.into_iter()
		.map(|entry| entry.trim().to_string())
		.filter(|entry| !entry.is_empty())
		.collect()
}

fn id_list<'de, D>(deserializer: D) -> std::result::Result<Vec<i64>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(parse_id_list(&Value::deserialize(deserializer)?))
}

fn string_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(parse_string_list(&Value::deserialize(deserializer)?))
}

fn chunk_company_clause(company: &str) -> FilterClause {
	let mut clauses = Vec::new();

	for field in ["company_common_name.keyword", "company_legal_name.keyword"] {
		clauses.push(FilterClause::Term {
			field: field.to_string(),
			value: Value::String(company.to_string()),
			boost: Some(5.0),
		});
	}
	for field in ["company_common_name", "company_legal_name"] {
		clauses.push(FilterClause::match_phrase(field, company, 4.0));
	}
	for field in ["company_common_name", "company_legal_name"] {
		clauses.push(FilterClause::Match {
			field: field.to_string(),
			query: company.to_string(),
			boost: Some(3.0),
			operator: Some("and"),
			minimum_should_match: None,
		});
	}
	for field in ["company_common_name", "company_legal_name"] {
		clauses.push(FilterClause::Fuzzy {
			field: field.to_string(),
			value: company.to_string(),
			fuzziness: Value::from(1),
			boost: Some(2.0),
		});
	}

	clauses.push(FilterClause::match_phrase("title", company, 2.5));

	FilterClause::any(clauses)
}

fn normalize_section(raw: Option<&str>) -> Result<Option<&'static str>> {
	let Some(raw) = non_blank(raw) else {
		return Ok(None);
	};

	match raw.to_lowercase().replace([' ', '-'], "_").as_str() {
		"presentation" => Ok(Some("presentation")),
		"q_and_a" | "q&a" | "qa" | "q_a" => Ok(Some("q_and_a")),
		_ => Err(Error::InvalidArgument {
			message: format!("transcript_section must be presentation or q_and_a, got {raw}."),
		}),
	}
}

fn parse_date(label: &str, raw: &str) -> Result<Date> {
	Date::parse(raw, DATE_FORMAT).map_err(|_| Error::InvalidArgument {
		message: format!("{label} must be a YYYY-MM-DD date, got {raw}."),
	})
}

fn validate_max_results(max_results: u32) -> Result<()> {
	if max_results == 0 {
		return Err(Error::InvalidArgument {
			message: "max_results must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
	raw.map(str::trim).filter(|raw| !raw.is_empty())
}

fn default_max_results() -> u32 {
	20
}

fn default_min_score() -> f64 {
	0.2
}
