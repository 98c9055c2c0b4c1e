use std::collections::HashSet;

use serde_json::Value;

use crate::{
	Result,
	query::{
		BoolClause, Collection, FilterClause, QueryBuilder, QueryDocument, QueryShape, SortKey,
		validate_limits,
	},
	request::{DateRange, SortBy},
};

const COMPANY_KEYWORD_FIELDS: [&str; 4] =
	["company_name.keyword", "issuer_name.keyword", "entity_name.keyword", "filer_name.keyword"];
const DOCUMENT_TYPE_KEYWORD_FIELDS: [&str; 3] =
	["document_type.keyword", "form_type.keyword", "filing_type.keyword"];
/// Key SEC forms boosted when the caller asked for no specific document type.
const PRIORITY_FORMS: [(&str, f64); 7] = [
	("10-K", 15.0),
	("10-Q", 12.0),
	("8-K", 10.0),
	("20-F", 8.0),
	("DEF 14A", 7.0),
	("S-1", 6.0),
	("S-3", 5.0),
];
const AMENDMENT_PATTERN: &str = ".*[/]A";

/// Non-company constraints of a filings search.
#[derive(Clone, Debug, PartialEq)]
pub struct FilingsCriteria {
	pub document_types: Vec<String>,
	pub date_range: Option<DateRange>,
	pub include_amendments: bool,
	pub sort_by: SortBy,
	pub max_results: u32,
}
impl FilingsCriteria {
	pub fn filters(&self) -> Vec<FilterClause> {
		let mut filters = Vec::new();

		if !self.document_types.is_empty() {
			filters.push(document_type_clause(&self.document_types));
		}
		if let Some(range) = &self.date_range {
			filters.push(range.to_clause());
		}
		if !self.include_amendments {
			filters.push(FilterClause::Bool(BoolClause {
				must_not: vec![FilterClause::Regexp {
					field: "filing_type".to_string(),
					pattern: AMENDMENT_PATTERN.to_string(),
				}],
				..Default::default()
			}));
		}

		filters
	}

	fn sort(&self) -> Vec<SortKey> {
		match self.sort_by {
			SortBy::Desc => vec![SortKey::desc("date"), SortKey::desc("_score")],
			SortBy::Asc => vec![SortKey::asc("date"), SortKey::desc("_score")],
			SortBy::Relevance => vec![SortKey::desc("_score"), SortKey::desc("date")],
		}
	}
}

impl QueryBuilder {
	/// Company-name query for one set of name variations.
	pub fn build_filings(&self, names: &[String], criteria: &FilingsCriteria) -> Result<QueryDocument> {
		validate_limits(criteria.max_results, 0.0)?;

		let query = BoolClause {
			must: vec![FilterClause::any(company_clauses(names))],
			should: priority_boosts(criteria),
			filter: criteria.filters(),
			..Default::default()
		};

		Ok(QueryDocument {
			query: QueryShape::Plain(FilterClause::Bool(query)),
			size: criteria.max_results,
			min_score: None,
			source: Collection::Filings.source_fields(),
			sort: criteria.sort(),
			timeout: Some(format!("{}ms", self.filings_timeout_ms)),
		})
	}

	/// Broad last-resort query with relaxed term-match thresholds and a smaller page.
	pub fn build_filings_fallback(
		&self,
		company: &str,
		criteria: &FilingsCriteria,
	) -> Result<QueryDocument> {
		validate_limits(criteria.max_results, 0.0)?;

		let mut should = vec![
			FilterClause::Match {
				field: "title".to_string(),
				query: company.to_string(),
				boost: Some(4.0),
				operator: None,
				minimum_should_match: Some("50%".to_string()),
			},
			FilterClause::Match {
				field: "company_name".to_string(),
				query: company.to_string(),
				boost: Some(3.0),
				operator: None,
				minimum_should_match: Some("75%".to_string()),
			},
			FilterClause::MultiMatch {
				query: company.to_string(),
				fields: ["title", "company_name", "issuer_name", "entity_name"]
					.iter()
					.map(|field| (*field).to_string())
					.collect(),
				boost: Some(2.0),
				minimum_should_match: Some("50%".to_string()),
			},
		];

		should.extend(
			name_words(company)
				.into_iter()
				.map(|word| FilterClause::wildcard("title", format!("*{word}*"), 1.0)),
		);

		let query = BoolClause {
			should,
			filter: criteria.filters(),
			minimum_should_match: Some(1),
			..Default::default()
		};

		Ok(QueryDocument {
			query: QueryShape::Plain(FilterClause::Bool(query)),
			size: criteria.max_results.min(self.fallback_max_results),
			min_score: None,
			source: Collection::Filings.source_fields(),
			sort: criteria.sort(),
			timeout: Some(format!("{}ms", self.fallback_timeout_ms)),
		})
	}
}

fn company_clauses(names: &[String]) -> Vec<FilterClause> {
	let folded = dedup_folded(names);
	let mut clauses = Vec::new();

	for name in &folded {
		clauses.push(FilterClause::match_phrase("title", name, 15.0));
		clauses.push(FilterClause::wildcard("title", format!("*{name}*"), 8.0));
	}

	let mut seen_words = HashSet::new();

	for name in &folded {
		for word in name_words(name) {
			if seen_words.insert(word.to_lowercase()) {
				clauses.push(FilterClause::wildcard("title", format!("*{word}*"), 6.0));
			}
		}
	}

	if let Some(primary) = folded.first() {
		clauses.push(FilterClause::Fuzzy {
			field: "company_name.keyword".to_string(),
			value: (*primary).to_string(),
			fuzziness: Value::String("AUTO".to_string()),
			boost: Some(3.0),
		});
	}

	for field in COMPANY_KEYWORD_FIELDS {
		clauses.push(FilterClause::terms(field, names.iter().cloned()));
	}

	clauses
}

fn document_type_clause(document_types: &[String]) -> FilterClause {
	let mut clauses = Vec::new();

	for document_type in document_types {
		let upper = document_type.to_uppercase();

		clauses.push(FilterClause::match_phrase("title", &upper, 10.0));
		clauses.push(FilterClause::match_phrase("title", &document_type.to_lowercase(), 8.0));

		for field in DOCUMENT_TYPE_KEYWORD_FIELDS {
			clauses.push(FilterClause::term(field, upper.clone()));
		}
	}

	FilterClause::any(clauses)
}

fn priority_boosts(criteria: &FilingsCriteria) -> Vec<FilterClause> {
	if !criteria.document_types.is_empty() {
		return Vec::new();
	}

	PRIORITY_FORMS
		.iter()
		.flat_map(|(form, boost)| {
			[
				FilterClause::wildcard("title", format!("*- {form}"), boost * 0.8),
				FilterClause::wildcard("title", format!("*{form}*"), boost * 0.6),
			]
		})
		.collect()
}

/// Words long enough to be distinctive, with `&` treated as a separator.
fn name_words(name: &str) -> Vec<&str> {
	name.split(|c: char| c.is_whitespace() || c == '&')
		.map(|word| word.trim_matches(|c: char| c == ',' || c == '.'))
		.filter(|word| word.chars().count() > 2)
		.collect()
}

/// Drops names that differ only by case, keeping the first spelling.
fn dedup_folded(names: &[String]) -> Vec<&str> {
	let mut seen = HashSet::new();

	names
		.iter()
		.map(|name| name.trim())
		.filter(|name| !name.is_empty() && seen.insert(name.to_lowercase()))
		.collect()
}
