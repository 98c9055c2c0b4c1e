use serde_json::{Map, Value};

/// One structured predicate in a backing-service query.
///
/// Clauses render to the backing service's JSON query DSL through [`FilterClause::to_value`].
#[derive(Clone, Debug, PartialEq)]
pub enum FilterClause {
	MatchAll,
	Term { field: String, value: Value, boost: Option<f64> },
	Terms { field: String, values: Vec<Value> },
	Range { field: String, gte: Option<String>, lte: Option<String> },
	Wildcard { field: String, pattern: String, case_insensitive: bool, boost: Option<f64> },
	Fuzzy { field: String, value: String, fuzziness: Value, boost: Option<f64> },
	Match {
		field: String,
		query: String,
		boost: Option<f64>,
		operator: Option<&'static str>,
		minimum_should_match: Option<String>,
	},
	MatchPhrase { field: String, query: String, boost: Option<f64> },
	MultiMatch {
		query: String,
		fields: Vec<String>,
		boost: Option<f64>,
		minimum_should_match: Option<String>,
	},
	Regexp { field: String, pattern: String },
	Bool(BoolClause),
}
impl FilterClause {
	pub fn term(field: &str, value: impl Into<Value>) -> Self {
		Self::Term { field: field.to_string(), value: value.into(), boost: None }
	}

	pub fn terms<T>(field: &str, values: impl IntoIterator<Item = T>) -> Self
	where
		T: Into<Value>,
	{
		Self::Terms { field: field.to_string(), values: values.into_iter().map(Into::into).collect() }
	}

	pub fn wildcard(field: &str, pattern: String, boost: f64) -> Self {
		Self::Wildcard { field: field.to_string(), pattern, case_insensitive: true, boost: Some(boost) }
	}

	pub fn match_phrase(field: &str, query: &str, boost: f64) -> Self {
		Self::MatchPhrase { field: field.to_string(), query: query.to_string(), boost: Some(boost) }
	}

	/// ANDs clauses together: none becomes match-all, one is returned verbatim.
	pub fn all(mut clauses: Vec<Self>) -> Self {
		match clauses.len() {
			0 => Self::MatchAll,
			1 => clauses.remove(0),
			_ => Self::Bool(BoolClause { must: clauses, ..Default::default() }),
		}
	}

	/// ORs clauses together with a minimum match of one.
	pub fn any(clauses: Vec<Self>) -> Self {
		Self::Bool(BoolClause { should: clauses, minimum_should_match: Some(1), ..Default::default() })
	}

	pub fn to_value(&self) -> Value {
		match self {
			Self::MatchAll => serde_json::json!({ "match_all": {} }),
			Self::Term { field, value, boost: None } => serde_json::json!({ "term": { field: value } }),
			Self::Term { field, value, boost: Some(boost) } => {
				serde_json::json!({ "term": { field: { "value": value, "boost": boost } } })
			},
			Self::Terms { field, values } => serde_json::json!({ "terms": { field: values } }),
			Self::Range { field, gte, lte } => {
				let mut bounds = Map::new();

				if let Some(gte) = gte {
					bounds.insert("gte".to_string(), Value::String(gte.clone()));
				}
				if let Some(lte) = lte {
					bounds.insert("lte".to_string(), Value::String(lte.clone()));
				}

				serde_json::json!({ "range": { field: bounds } })
			},
			Self::Wildcard { field, pattern, case_insensitive, boost } => {
				let mut body = Map::new();

				body.insert("value".to_string(), Value::String(pattern.clone()));
				body.insert("case_insensitive".to_string(), Value::Bool(*case_insensitive));
				insert_boost(&mut body, *boost);

				serde_json::json!({ "wildcard": { field: body } })
			},
			Self::Fuzzy { field, value, fuzziness, boost } => {
				let mut body = Map::new();

				body.insert("value".to_string(), Value::String(value.clone()));
				body.insert("fuzziness".to_string(), fuzziness.clone());
				insert_boost(&mut body, *boost);

				serde_json::json!({ "fuzzy": { field: body } })
			},
			Self::Match { field, query, boost, operator, minimum_should_match } => {
				let mut body = Map::new();

				body.insert("query".to_string(), Value::String(query.clone()));
				insert_boost(&mut body, *boost);

				if let Some(operator) = operator {
					body.insert("operator".to_string(), Value::String((*operator).to_string()));
				}
				if let Some(minimum) = minimum_should_match {
					body.insert("minimum_should_match".to_string(), Value::String(minimum.clone()));
				}

				serde_json::json!({ "match": { field: body } })
			},
			Self::MatchPhrase { field, query, boost } => {
				let mut body = Map::new();

				body.insert("query".to_string(), Value::String(query.clone()));
				insert_boost(&mut body, *boost);

				serde_json::json!({ "match_phrase": { field: body } })
			},
			Self::MultiMatch { query, fields, boost, minimum_should_match } => {
				let mut body = Map::new();

				body.insert("query".to_string(), Value::String(query.clone()));
				body.insert(
					"fields".to_string(),
					Value::Array(fields.iter().cloned().map(Value::String).collect()),
				);
				body.insert("type".to_string(), Value::String("best_fields".to_string()));
				insert_boost(&mut body, *boost);

				if let Some(minimum) = minimum_should_match {
					body.insert("minimum_should_match".to_string(), Value::String(minimum.clone()));
				}

				serde_json::json!({ "multi_match": body })
			},
			Self::Regexp { field, pattern } => serde_json::json!({ "regexp": { field: pattern } }),
			Self::Bool(clause) => clause.to_value(),
		}
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoolClause {
	pub must: Vec<FilterClause>,
	pub should: Vec<FilterClause>,
	pub filter: Vec<FilterClause>,
	pub must_not: Vec<FilterClause>,
	pub minimum_should_match: Option<u32>,
}
impl BoolClause {
	pub fn to_value(&self) -> Value {
		let mut body = Map::new();

		for (key, clauses) in [
			("must", &self.must),
			("should", &self.should),
			("filter", &self.filter),
			("must_not", &self.must_not),
		] {
			if !clauses.is_empty() {
				body.insert(
					key.to_string(),
					Value::Array(clauses.iter().map(FilterClause::to_value).collect()),
				);
			}
		}

		if let Some(minimum) = self.minimum_should_match {
			body.insert("minimum_should_match".to_string(), Value::from(minimum));
		}

		serde_json::json!({ "bool": body })
	}
}

fn insert_boost(body: &mut Map<String, Value>, boost: Option<f64>) {
	if let Some(boost) = boost {
		body.insert("boost".to_string(), Value::from(boost));
	}
}
