//! Heuristic model tier routing

use std::fmt::{self, Debug};

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Coarse generation tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Simple,
    Complex,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Complex => "complex",
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chooses a generation tier for a query
///
/// Implementations must be pure: the same query always yields the same tier.
pub trait ModelRouter: Send + Sync + Debug {
    fn select_tier(&self, query: &str) -> ModelTier;
}

/// Financial, legal and analytical vocabulary that warrants the complex tier
pub const DEFAULT_TRIGGER_TERMS: &[&str] = &[
    "roi",
    "return on investment",
    "yield",
    "investment",
    "invest",
    "profit",
    "cash flow",
    "rental income",
    "cap rate",
    "appreciation",
    "depreciation",
    "valuation",
    "mortgage",
    "financing",
    "loan",
    "interest rate",
    "tax",
    "taxes",
    "capital gains",
    "legal",
    "law",
    "lawyer",
    "contract",
    "deed",
    "title",
    "zoning",
    "permit",
    "regulation",
    "compare",
    "comparison",
    "analysis",
    "analyze",
    "forecast",
    "projection",
];

static DEFAULT_ROUTER: Lazy<KeywordModelRouter> = Lazy::new(|| {
    KeywordModelRouter::build(DEFAULT_TRIGGER_TERMS.iter().copied())
});

/// Routes to the complex tier when any trigger term appears as a whole word
///
/// Matching is case-insensitive and respects word boundaries, so "tax" matches
/// "Tax rules?" but not "taxi".
#[derive(Debug, Clone)]
pub struct KeywordModelRouter {
    terms: Vec<String>,
    pattern: Option<Regex>,
}

impl KeywordModelRouter {
    /// Creates a router from a trigger vocabulary, ignoring blank entries
    pub fn new<I, S>(terms: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms: Vec<String> = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        let pattern = if terms.is_empty() {
            None
        } else {
            let alternation = terms
                .iter()
                .map(|t| regex::escape(t).replace(' ', r"\s+"))
                .collect::<Vec<_>>()
                .join("|");

            let regex = RegexBuilder::new(&format!(r"\b(?:{})\b", alternation))
                .case_insensitive(true)
                .build()
                .map_err(|e| {
                    DomainError::configuration(format!("Invalid trigger vocabulary: {}", e))
                })?;

            Some(regex)
        };

        Ok(Self { terms, pattern })
    }

    fn build<'a>(terms: impl Iterator<Item = &'a str>) -> Self {
        // The default vocabulary is plain words; escaping makes it always valid.
        Self::new(terms).unwrap_or(Self {
            terms: Vec::new(),
            pattern: None,
        })
    }

    /// Router with [`DEFAULT_TRIGGER_TERMS`]
    pub fn with_default_terms() -> Self {
        DEFAULT_ROUTER.clone()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }
}

impl Default for KeywordModelRouter {
    fn default() -> Self {
        Self::with_default_terms()
    }
}

impl ModelRouter for KeywordModelRouter {
    fn select_tier(&self, query: &str) -> ModelTier {
        match &self.pattern {
            Some(pattern) if pattern.is_match(query) => ModelTier::Complex,
            _ => ModelTier::Simple,
        }
    }
}
