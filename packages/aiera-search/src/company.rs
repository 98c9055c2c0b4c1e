use std::collections::{HashMap, HashSet};

use regex::Regex;

/// Trailing corporate designators removed when building name variations.
pub const CORPORATE_SUFFIXES: [&str; 20] = [
	"inc",
	"incorporated",
	"corp",
	"corporation",
	"co",
	"company",
	"ltd",
	"limited",
	"llc",
	"lp",
	"l.p",
	"plc",
	"holdings",
	"group",
	"n.v",
	"nv",
	"s.a",
	"sa",
	"ag",
	"se",
];
/// Suffixes appended to a bare name.
pub const APPENDED_SUFFIXES: [&str; 4] = ["Inc", "Inc.", "Corp", "Corporation"];

const SUFFIX_SWAPS: [(&str, &str); 4] =
	[("corp", "Corporation"), ("inc", "Incorporated"), ("co", "Company"), ("ltd", "Limited")];
/// Hand-maintained expansions for names the generic heuristics handle badly.
const SPECIAL_EXPANSIONS: [(&str, &[&str]); 6] = [
	("j&j", &["Johnson & Johnson", "Johnson and Johnson"]),
	("p&g", &["Procter & Gamble", "Procter and Gamble"]),
	("at&t", &["AT and T", "ATT"]),
	("s&p global", &["S and P Global", "SP Global"]),
	("h&r block", &["H and R Block", "HR Block"]),
	("m&t bank", &["M and T Bank", "MT Bank"]),
];
const BUILTIN_ALIASES: [(&[&str], &[&str]); 12] = [
	(&["apple", "aapl"], &["Apple Inc.", "Apple Inc", "Apple", "AAPL"]),
	(&["microsoft", "msft"], &["Microsoft Corporation", "Microsoft Corp", "Microsoft", "MSFT"]),
	(&["alphabet", "google", "googl"], &["Alphabet Inc.", "Alphabet Inc", "Google", "GOOGL"]),
	(&["amazon", "amzn"], &["Amazon.com, Inc.", "Amazon.com Inc", "Amazon.com", "AMZN"]),
	(&["meta", "facebook"], &["Meta Platforms, Inc.", "Meta Platforms", "Facebook", "META"]),
	(&["j&j", "jnj", "johnson & johnson", "johnson and johnson"], &[
		"Johnson & Johnson",
		"Johnson and Johnson",
		"J&J",
		"JNJ",
	]),
	(&["p&g", "procter & gamble", "procter and gamble"], &[
		"The Procter & Gamble Company",
		"Procter & Gamble",
		"Procter and Gamble",
		"PG",
	]),
	(&["yum", "yum! brands", "yum brands"], &["Yum! Brands, Inc.", "Yum! Brands", "Yum Brands", "YUM"]),
	(&["jpmorgan", "jp morgan", "jpm"], &["JPMorgan Chase & Co.", "JPMorgan Chase", "JPMorgan", "JPM"]),
	(&["nvidia", "nvda"], &["NVIDIA Corporation", "NVIDIA Corp", "NVIDIA", "NVDA"]),
	(&["berkshire", "berkshire hathaway"], &[
		"Berkshire Hathaway Inc.",
		"Berkshire Hathaway",
		"BRK.A",
		"BRK.B",
	]),
	(&["coca-cola", "coca cola", "coke"], &["The Coca-Cola Company", "Coca-Cola", "Coca Cola", "KO"]),
];

/// Immutable lookup of known company aliases keyed by lowercased common name.
#[derive(Clone, Debug)]
pub struct CompanyAliases {
	entries: HashMap<String, Vec<String>>,
}
impl CompanyAliases {
	pub fn builtin() -> Self {
		Self::from_entries(BUILTIN_ALIASES.iter().map(|(keys, aliases)| {
			(
				keys.iter().map(|key| (*key).to_string()).collect(),
				aliases.iter().map(|alias| (*alias).to_string()).collect(),
			)
		}))
	}

	pub fn from_entries<I>(entries: I) -> Self
	where
		I: IntoIterator<Item = (Vec<String>, Vec<String>)>,
	{
		let mut table = HashMap::new();

		for (keys, aliases) in entries {
			for key in keys {
				table.insert(key.trim().to_lowercase(), aliases.clone());
			}
		}

		Self { entries: table }
	}

	/// Aliases for an exact case-insensitive match, or the plain case forms of `name`.
	pub fn known_aliases(&self, name: &str) -> Vec<String> {
		let name = name.trim();

		if let Some(aliases) = self.entries.get(&name.to_lowercase()) {
			return aliases.clone();
		}

		dedup(vec![name.to_string(), name.to_lowercase(), name.to_uppercase(), title_case(name)])
	}
}
impl Default for CompanyAliases {
	fn default() -> Self {
		Self::builtin()
	}
}

/// Case, suffix and cleaned variants of `name`, most specific first.
pub fn generate_variations(name: &str, max: usize) -> Vec<String> {
	let original = name.trim();

	if original.is_empty() {
		return Vec::new();
	}

	let cleaned = clean_name(original);
	let mut variations = vec![original.to_string(), cleaned.clone()];
	let stripped = strip_suffixes(&cleaned);

	if stripped.is_empty() {
		variations.extend(APPENDED_SUFFIXES.iter().map(|suffix| format!("{cleaned} {suffix}")));
	} else {
		variations.extend(stripped);
	}

	variations.push(original.to_uppercase());
	variations.push(original.to_lowercase());
	variations.push(title_case(original));

	let mut variations = dedup(variations);

	variations.truncate(max);

	variations
}

/// Broader heuristic variations used once a direct search fails.
///
/// Degrades to `[name]` when the heuristics cannot run.
pub fn discovery_variations(name: &str) -> Vec<String> {
	match try_discovery_variations(name) {
		Ok(variations) => variations,
		Err(err) => {
			tracing::warn!(error = %err, company = name, "Failed to derive discovery variations.");

			vec![name.to_string()]
		},
	}
}

fn try_discovery_variations(name: &str) -> Result<Vec<String>, regex::Error> {
	let name = name.trim();
	let mut variations = Vec::new();
	let folded = name.to_lowercase();

	for (key, expansions) in SPECIAL_EXPANSIONS {
		if folded == key {
			variations.extend(expansions.iter().map(|expansion| (*expansion).to_string()));
		}
	}

	let stripped = strip_special(name);

	variations.push(stripped.clone());

	if name.contains('&') {
		variations.push(collapse_whitespace(&name.replace('&', " and ")));
		variations.push(collapse_whitespace(&name.replace('&', "")));
	} else {
		let and = Regex::new(r"(?i)\band\b")?;

		if and.is_match(name) {
			variations.push(collapse_whitespace(&and.replace_all(name, "&")));
		}
	}

	for (short, long) in SUFFIX_SWAPS {
		let short_form = Regex::new(&format!(r"(?i)\b{short}\.?$"))?;
		let long_form = Regex::new(&format!(r"(?i)\b{long}$"))?;

		if short_form.is_match(&stripped) {
			variations.push(short_form.replace(&stripped, long).into_owned());
		} else if long_form.is_match(&stripped) {
			variations.push(long_form.replace(&stripped, title_case(short)).into_owned());
		}
	}

	let base = strip_suffixes(&stripped).pop().unwrap_or_else(|| stripped.clone());
	let words: Vec<&str> = base.split_whitespace().collect();

	if words.len() >= 3 {
		let acronym: String = words.iter().filter_map(|word| word.chars().next()).collect();

		variations.push(acronym.to_uppercase());
	}

	variations.push(stripped.to_uppercase());
	variations.push(stripped.to_lowercase());
	variations.push(title_case(&stripped));

	Ok(dedup(variations))
}

/// Keeps letters, digits and the punctuation found inside legal names (`&`, `-`, `.`).
fn clean_name(name: &str) -> String {
	let kept: String = name
		.chars()
		.map(|c| if c.is_alphanumeric() || matches!(c, '&' | '-' | '.') { c } else { ' ' })
		.collect();

	collapse_whitespace(&kept)
}

/// Keeps only letters, digits and whitespace.
fn strip_special(name: &str) -> String {
	let kept: String =
		name.chars().filter(|c| c.is_alphanumeric() || c.is_whitespace()).collect();

	collapse_whitespace(&kept)
}

/// Progressive removals of trailing corporate suffixes, shortest removal first.
fn strip_suffixes(name: &str) -> Vec<String> {
	let mut words: Vec<&str> = name.split_whitespace().collect();
	let mut stripped = Vec::new();

	while words.len() > 1 {
		let Some(last) = words.last() else {
			break;
		};
		let folded = last.trim_end_matches(['.', ',']).to_lowercase();

		if !CORPORATE_SUFFIXES.contains(&folded.as_str()) {
			break;
		}

		words.pop();

		let remaining = words.join(" ");

		stripped.push(remaining.trim_end_matches(',').to_string());
	}

	stripped
}

fn title_case(name: &str) -> String {
	name.split_whitespace()
		.map(|word| {
			let mut chars = word.chars();

			match chars.next() {
				Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
				None => String::new(),
			}
		})
		.collect::<Vec<String>>()
		.join(" ")
}

fn collapse_whitespace(raw: &str) -> String {
	raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn dedup(values: Vec<String>) -> Vec<String> {
	let mut seen = HashSet::new();

	values.into_iter().filter(|value| !value.is_empty() && seen.insert(value.clone())).collect()
}
