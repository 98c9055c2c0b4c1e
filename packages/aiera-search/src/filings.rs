use std::{
	collections::HashSet,
	sync::{
		Mutex, PoisonError,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use serde::Serialize;

use crate::{
	BackendRequest, Error, Result, SearchBackend,
	company::{self, CompanyAliases},
	query::{Collection, QueryBuilder, QueryDocument, filings::FilingsCriteria},
	response::{NormalizedHit, SearchMetadata, SearchResponse, standard_instructions},
	validator::ResultValidator,
};

/// Cascade order; evaluation stops at the first stage whose output validates.
const CASCADE: [Strategy; 4] =
	[Strategy::Direct, Strategy::Discovery, Strategy::Context, Strategy::Fallback];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
	Direct,
	Discovery,
	Context,
	Fallback,
}
impl Strategy {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Direct => "direct",
			Self::Discovery => "discovery",
			Self::Context => "context",
			Self::Fallback => "fallback",
		}
	}
}

/// Outcome of one cascade attempt.
#[derive(Clone, Debug)]
pub struct SearchStrategyResult {
	pub strategy: Strategy,
	pub names: Vec<String>,
	pub hits: Vec<NormalizedHit>,
}

pub struct FilingsMultiStrategySearch<'a> {
	pub backend: &'a dyn SearchBackend,
	pub builder: &'a QueryBuilder,
	pub validator: &'a ResultValidator,
	pub aliases: &'a CompanyAliases,
	pub cfg: &'a aiera_config::Search,
	calls: AtomicUsize,
	/// Folded primary names already searched during the current run.
	tried: Mutex<HashSet<String>>,
}
impl<'a> FilingsMultiStrategySearch<'a> {
	pub fn new(
		backend: &'a dyn SearchBackend,
		builder: &'a QueryBuilder,
		validator: &'a ResultValidator,
		aliases: &'a CompanyAliases,
		cfg: &'a aiera_config::Search,
	) -> Self {
		Self {
			backend,
			builder,
			validator,
			aliases,
			cfg,
			calls: AtomicUsize::new(0),
			tried: Mutex::new(HashSet::new()),
		}
	}

	/// Number of backend calls issued so far.
	pub fn backend_calls(&self) -> usize {
		self.calls.load(Ordering::Relaxed)
	}

	/// Runs the cascade, then validates each surviving hit individually.
	///
	/// Stage failures are absorbed. An exhausted cascade yields a no-results response with
	/// suggestions, never an error.
	pub async fn run(&self, company: &str, criteria: &FilingsCriteria) -> SearchResponse {
		self.tried.lock().unwrap_or_else(PoisonError::into_inner).clear();

		let mut winner = None;

		for strategy in CASCADE {
			if let Some(result) = self.run_stage(strategy, company, criteria).await {
				winner = Some(result);

				break;
			}
		}

		let Some(result) = winner else {
			return self.no_results(company, criteria, None, Vec::new(), 0);
		};
		let mut targets = vec![company.to_string()];

		targets.extend(result.names.iter().cloned());

		let candidate_count = result.hits.len();
		let validated: Vec<NormalizedHit> = result
			.hits
			.into_iter()
			.filter(|hit| {
				self.validator.validate_hit(
					hit,
					&targets,
					&criteria.document_types,
					criteria.date_range.as_ref(),
				)
			})
			.collect();

		tracing::info!(
			company,
			strategy = result.strategy.as_str(),
			candidates = candidate_count,
			validated = validated.len(),
			backend_calls = self.backend_calls(),
			"Filings search completed."
		);

		if validated.is_empty() {
			return self.no_results(
				company,
				criteria,
				Some(result.strategy),
				result.names,
				candidate_count,
			);
		}

		let metadata = SearchMetadata {
			strategy: Some(result.strategy),
			matched_names: result.names,
			backend_calls: self.backend_calls(),
			candidate_count,
			validated_count: validated.len(),
		};
		let mut response =
			SearchResponse::from_hits(validated, criteria.max_results, standard_instructions());

		response.search_metadata = Some(metadata);

		response
	}

	async fn run_stage(
		&self,
		strategy: Strategy,
		company: &str,
		criteria: &FilingsCriteria,
	) -> Option<SearchStrategyResult> {
		match strategy {
			Strategy::Direct => self.direct(company, criteria).await,
			Strategy::Discovery => self.discovery(company, criteria).await,
			Strategy::Context => self.context(company, criteria).await,
			Strategy::Fallback => self.fallback(company, criteria).await,
		}
	}

	async fn direct(&self, company: &str, criteria: &FilingsCriteria) -> Option<SearchStrategyResult> {
		let names = company::generate_variations(company, self.cfg.max_name_variations);

		self.tried.lock().unwrap_or_else(PoisonError::into_inner).insert(fold_name(company));

		self.attempt(Strategy::Direct, names.clone(), &names, criteria).await
	}

	async fn discovery(
		&self,
		company: &str,
		criteria: &FilingsCriteria,
	) -> Option<SearchStrategyResult> {
		let variations =
			self.untried(company::discovery_variations(company), self.cfg.max_discovery_variations);

		for variation in variations {
			let names = company::generate_variations(&variation, self.cfg.max_name_variations);
			let mut targets = names.clone();

			targets.push(company.to_string());

			if let Some(result) = self.attempt(Strategy::Discovery, names, &targets, criteria).await {
				return Some(result);
			}
		}

		None
	}

	async fn context(&self, company: &str, criteria: &FilingsCriteria) -> Option<SearchStrategyResult> {
		let aliases =
			self.untried(self.aliases.known_aliases(company), self.cfg.max_context_variations);

		for alias in aliases {
			let targets = vec![alias.clone(), company.to_string()];

			if let Some(result) =
				self.attempt(Strategy::Context, vec![alias], &targets, criteria).await
			{
				return Some(result);
			}
		}

		None
	}

	async fn fallback(&self, company: &str, criteria: &FilingsCriteria) -> Option<SearchStrategyResult> {
		let names = company::generate_variations(company, self.cfg.max_name_variations);

		self.attempt(Strategy::Fallback, names.clone(), &names, criteria).await
	}

	/// Issues one backend call for `strategy`; `None` unless the output is accepted.
	async fn attempt(
		&self,
		strategy: Strategy,
		names: Vec<String>,
		targets: &[String],
		criteria: &FilingsCriteria,
	) -> Option<SearchStrategyResult> {
		let built = match strategy {
			Strategy::Fallback => names
				.first()
				.map(|name| self.builder.build_filings_fallback(name, criteria))
				.transpose(),
			_ => self.builder.build_filings(&names, criteria).map(Some),
		};
		let document = match built {
			Ok(Some(document)) => document,
			Ok(None) => return None,
			Err(err) => {
				tracing::warn!(strategy = strategy.as_str(), error = %err, "Failed to build filings query.");

				return None;
			},
		};
		let timeout = match strategy {
			Strategy::Fallback => Some(Duration::from_millis(self.cfg.fallback_timeout_ms)),
			_ => None,
		};

		self.calls.fetch_add(1, Ordering::Relaxed);

		let hits = match self.execute(document, timeout).await {
			Ok(found) => found,
			Err(err) => {
				tracing::warn!(strategy = strategy.as_str(), error = %err, "Filings stage failed.");

				return None;
			},
		};
		let validated = strategy == Strategy::Fallback || self.validator.validate_set(&hits, targets);

		tracing::info!(
			strategy = strategy.as_str(),
			names = ?names,
			candidates = hits.len(),
			validated,
			"Filings stage finished."
		);

		validated.then_some(SearchStrategyResult { strategy, names, hits })
	}

	async fn execute(
		&self,
		document: QueryDocument,
		timeout: Option<Duration>,
	) -> Result<Vec<NormalizedHit>> {
		let search = self.backend.search(BackendRequest {
			endpoint: Collection::Filings.endpoint(),
			document: document.to_value(),
			pipeline: None,
			timeout,
		});
		let body = match timeout {
			Some(limit) => tokio::time::timeout(limit, search).await.map_err(|_| Error::Timeout {
				message: format!("filings search exceeded {} ms", limit.as_millis()),
			})??,
			None => search.await?,
		};
		let response = SearchResponse::from_body(&body, document.size)?;

		Ok(response.response.result)
	}

	/// Candidates not searched yet in this run, at most `max`; the returned names are marked as
	/// tried.
	fn untried(&self, candidates: Vec<String>, max: usize) -> Vec<String> {
		let mut tried = self.tried.lock().unwrap_or_else(PoisonError::into_inner);

		take_untried(&mut tried, candidates, max)
	}

	fn no_results(
		&self,
		company: &str,
		criteria: &FilingsCriteria,
		strategy: Option<Strategy>,
		matched_names: Vec<String>,
		candidate_count: usize,
	) -> SearchResponse {
		tracing::warn!(company, backend_calls = self.backend_calls(), "No validated filings found.");

		let mut instructions = vec![
			format!(
				"No filings for '{company}' passed validation after direct, discovery, alias and broad fallback searches."
			),
			"Try expanding the time window by moving start_date earlier or end_date later."
				.to_string(),
			"Check the company name spelling, or retry with the official legal name or ticker symbol."
				.to_string(),
		];

		if !criteria.document_types.is_empty() {
			instructions.push("Broaden or remove document_types to include more filing forms.".to_string());
		}
		if !criteria.include_amendments {
			instructions.push("Set include_amendments to true to include amended filings.".to_string());
		}

		let mut response = SearchResponse::from_hits(Vec::new(), criteria.max_results, instructions);

		response.search_metadata = Some(SearchMetadata {
			strategy,
			matched_names,
			backend_calls: self.backend_calls(),
			candidate_count,
			validated_count: 0,
		});

		response
	}
}

/// Keeps candidates whose folded form is not in `tried`, in order and without case-only
/// duplicates, up to `max`.
fn take_untried(tried: &mut HashSet<String>, candidates: Vec<String>, max: usize) -> Vec<String> {
	let mut fresh = Vec::new();

	for candidate in candidates {
		if fresh.len() == max {
			break;
		}

		let folded = fold_name(&candidate);

		if !folded.is_empty() && tried.insert(folded) {
			fresh.push(candidate);
		}
	}

	fresh
}

fn fold_name(name: &str) -> String {
	name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}
