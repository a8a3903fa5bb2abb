//! Keyword category configuration.
//!
//! Categories are read once per run from a YAML file with three mappings
//! that must name exactly the same categories:
//!
//! ```yaml
//! fatal_risks:
//!   部屋の衛生状態が悪い: [汚い, 不潔]
//! wow_factors:
//!   最高の遊び場: [ドッグラン]
//! scores:
//!   部屋の衛生状態が悪い: -15
//!   最高の遊び場: 3
//! ```
//!
//! Any mismatch is a [`ConfigError`] and aborts the run before harvesting or
//! scoring starts.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{info, instrument, warn};

use crate::error::ConfigError;

/// Whether a category lowers or raises the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryKind {
    Risk,
    Wow,
}

/// A named set of trigger phrases with a signed weight.
///
/// Risk weights are stored negative; their absolute value is what counts.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryDefinition {
    pub name: String,
    pub keywords: Vec<String>,
    pub weight: i64,
    pub kind: CategoryKind,
}

impl CategoryDefinition {
    /// Points contributed by one hit of this category.
    pub fn points(&self) -> i64 {
        match self.kind {
            CategoryKind::Risk => self.weight.abs(),
            CategoryKind::Wow => self.weight,
        }
    }

    /// Whether any keyword occurs in `text`.
    pub fn matches(&self, text: &str) -> bool {
        self.keywords
            .iter()
            .any(|keyword| !keyword.is_empty() && text.contains(keyword.as_str()))
    }
}

#[derive(Debug, Deserialize)]
struct RawCategoryConfig {
    fatal_risks: BTreeMap<String, Vec<String>>,
    wow_factors: BTreeMap<String, Vec<String>>,
    scores: BTreeMap<String, i64>,
}

/// The immutable, validated category list: risk categories first, then wow.
#[derive(Debug, Clone, Default)]
pub struct CategorySet {
    categories: Vec<CategoryDefinition>,
}

impl CategorySet {
    /// Load and validate the YAML category file at `path`.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let set = Self::from_yaml_str(&content)?;
        if set.is_empty() {
            warn!("No categories configured; every venue will score 50");
        }
        info!(
            categories = set.len(),
            risk = set.of_kind(CategoryKind::Risk).count(),
            wow = set.of_kind(CategoryKind::Wow).count(),
            "Loaded category configuration"
        );
        Ok(set)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawCategoryConfig = serde_yaml::from_str(content)?;
        Self::from_groups(raw.fatal_risks, raw.wow_factors, raw.scores)
    }

    /// Build the category list, checking that all three mappings agree.
    pub fn from_groups(
        fatal_risks: BTreeMap<String, Vec<String>>,
        wow_factors: BTreeMap<String, Vec<String>>,
        scores: BTreeMap<String, i64>,
    ) -> Result<Self, ConfigError> {
        let overlap: Vec<String> = fatal_risks
            .keys()
            .filter(|name| wow_factors.contains_key(*name))
            .cloned()
            .collect();
        if !overlap.is_empty() {
            return Err(ConfigError::AmbiguousKind(overlap));
        }

        let named: BTreeSet<&String> = fatal_risks.keys().chain(wow_factors.keys()).collect();
        let missing: Vec<String> = named
            .iter()
            .filter(|name| !scores.contains_key(name.as_str()))
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingWeights(missing));
        }
        let unknown: Vec<String> = scores
            .keys()
            .filter(|name| !named.contains(name))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(ConfigError::UnknownWeights(unknown));
        }

        let risks = fatal_risks
            .into_iter()
            .map(|(name, keywords)| (name, keywords, CategoryKind::Risk));
        let wows = wow_factors
            .into_iter()
            .map(|(name, keywords)| (name, keywords, CategoryKind::Wow));

        let categories = risks
            .chain(wows)
            .map(|(name, keywords, kind)| {
                let weight = scores[&name];
                if keywords.is_empty() {
                    warn!(category = %name, "Category has no keywords and will never match");
                }
                match kind {
                    CategoryKind::Risk if weight > 0 => {
                        warn!(category = %name, weight, "Risk weight is positive; its absolute value is used")
                    }
                    CategoryKind::Wow if weight < 0 => {
                        warn!(category = %name, weight, "Wow weight is negative")
                    }
                    _ => {}
                }
                CategoryDefinition {
                    name,
                    keywords,
                    weight,
                    kind,
                }
            })
            .collect();

        Ok(Self { categories })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CategoryDefinition> {
        self.categories.iter()
    }

    pub fn of_kind(&self, kind: CategoryKind) -> impl Iterator<Item = &CategoryDefinition> {
        self.categories.iter().filter(move |c| c.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
