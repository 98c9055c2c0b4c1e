use crate::{request::DateRange, response::NormalizedHit};

/// Identity fields checked for a company mention, besides `title` and `company_name`.
const COMPANY_FIELDS: [&str; 5] =
	["issuer_name", "entity_name", "company_common_name", "company_legal_name", "filer_name"];
const TYPE_FIELDS: [&str; 2] = ["form_type", "filing_type"];
const THRESHOLD_TOLERANCE: f32 = 1e-6;

/// Relevance gate for result sets and individual hits.
#[derive(Clone, Debug)]
pub struct ResultValidator {
	threshold: f32,
}
impl ResultValidator {
	pub fn new(threshold: f32) -> Self {
		Self { threshold }
	}

	/// Accepts `hits` when the share mentioning any target name reaches the threshold.
	///
	/// An empty hit list is never valid.
	pub fn validate_set(&self, hits: &[NormalizedHit], targets: &[String]) -> bool {
		let targets = fold_targets(targets);

		if hits.is_empty() || targets.is_empty() {
			return false;
		}

		let matched = hits.iter().filter(|hit| mentions_company(hit, &targets)).count();
		let share = matched as f32 / hits.len() as f32;

		share + THRESHOLD_TOLERANCE >= self.threshold
	}

	/// Checks one hit for a company mention, a requested document type and the date range.
	///
	/// Dates that do not parse are never grounds for rejection.
	pub fn validate_hit(
		&self,
		hit: &NormalizedHit,
		targets: &[String],
		document_types: &[String],
		date_range: Option<&DateRange>,
	) -> bool {
		if !mentions_company(hit, &fold_targets(targets)) {
			return false;
		}
		if !document_types.is_empty() && !mentions_document_type(hit, document_types) {
			return false;
		}
		if let Some(range) = date_range
			&& let Some(date) = hit.parsed_date()
			&& !range.contains(date)
		{
			return false;
		}

		true
	}
}

fn mentions_company(hit: &NormalizedHit, folded_targets: &[String]) -> bool {
	let mut candidates = [hit.title.as_deref(), hit.company_name.as_deref()]
		.into_iter()
		.chain(COMPANY_FIELDS.iter().map(|field| hit.field_str(field)))
		.flatten()
		.map(fold);

	candidates.any(|candidate| folded_targets.iter().any(|target| candidate.contains(target.as_str())))
}

fn mentions_document_type(hit: &NormalizedHit, document_types: &[String]) -> bool {
	let candidates: Vec<String> = [hit.title.as_deref(), hit.document_type.as_deref()]
		.into_iter()
		.chain(TYPE_FIELDS.iter().map(|field| hit.field_str(field)))
		.flatten()
		.map(str::to_lowercase)
		.collect();

	document_types.iter().map(|document_type| document_type.trim().to_lowercase()).any(
		|document_type| {
			!document_type.is_empty()
				&& candidates.iter().any(|candidate| candidate.contains(&document_type))
		},
	)
}

fn fold_targets(targets: &[String]) -> Vec<String> {
	targets.iter().map(|target| fold(target)).filter(|target| !target.is_empty()).collect()
}

/// Lowercases and reduces punctuation to single spaces so `"Yum! Brands"` matches `"YUM BRANDS"`.
fn fold(raw: &str) -> String {
	let spaced: String =
		raw.chars().map(|c| if c.is_alphanumeric() { c } else { ' ' }).collect();

	spaced.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[cfg(test)]
mod tests {
	use crate::{request::DateRange, response::NormalizedHit, validator::ResultValidator};

	fn hit(raw: serde_json::Value) -> NormalizedHit {
		NormalizedHit::from_raw(&raw).expect("hit missing")
	}

	fn titled(title: &str) -> NormalizedHit {
		hit(serde_json::json!({ "content_id": 1, "title": title }))
	}

	fn set(matching: usize, total: usize) -> Vec<NormalizedHit> {
		(0..total)
			.map(|idx| {
				if idx < matching { titled("Apple Inc. - 10-K") } else { titled("Microsoft Corp - 10-Q") }
			})
			.collect()
	}

	fn targets() -> Vec<String> {
		vec!["Apple".to_string()]
	}

	#[test]
	fn thirty_percent_is_accepted() {
		let validator = ResultValidator::new(0.30);

		assert!(validator.validate_set(&set(3, 10), &targets()));
		assert!(!validator.validate_set(&set(2, 10), &targets()));
	}

	#[test]
	fn empty_sets_are_never_valid() {
		let validator = ResultValidator::new(0.0);

		assert!(!validator.validate_set(&[], &targets()));
	}

	#[test]
	fn company_match_ignores_punctuation_and_case() {
		let validator = ResultValidator::new(0.30);
		let hits = vec![hit(serde_json::json!({ "content_id": 1, "issuer_name": "YUM BRANDS INC" }))];

		assert!(validator.validate_set(&hits, &["Yum! Brands".to_string()]));
	}

	#[test]
	fn unparseable_dates_fail_open() {
		let validator = ResultValidator::new(0.30);
		let range = DateRange::parse(Some("2024-01-01"), Some("2024-12-31"))
			.expect("parse failed")
			.expect("range missing");
		let undated = hit(serde_json::json!({ "title": "Apple Inc. - 10-K", "date": "n/a" }));
		let early = hit(serde_json::json!({ "title": "Apple Inc. - 10-K", "date": "2023-12-31T09:00:00" }));
		let inside = hit(serde_json::json!({ "title": "Apple Inc. - 10-K", "date": "2024-06-30" }));

		assert!(validator.validate_hit(&undated, &targets(), &[], Some(&range)));
		assert!(!validator.validate_hit(&early, &targets(), &[], Some(&range)));
		assert!(validator.validate_hit(&inside, &targets(), &[], Some(&range)));
	}

	#[test]
	fn hit_requires_company_and_requested_type() {
		let validator = ResultValidator::new(0.30);
		let annual = titled("Apple Inc. - 10-K");

		assert!(validator.validate_hit(&annual, &targets(), &["10-k".to_string()], None));
		assert!(!validator.validate_hit(&annual, &targets(), &["8-K".to_string()], None));
		assert!(!validator.validate_hit(&titled("Microsoft Corp - 10-K"), &targets(), &[], None));

		let structured = hit(serde_json::json!({ "title": "Annual report", "company_name": "Apple", "form_type": "10-K" }));

		assert!(validator.validate_hit(&structured, &targets(), &["10-K".to_string()], None));
	}
}
