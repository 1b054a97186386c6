// src/taxonomy.rs
//! Disclosure taxonomy: priority-ordered keyword categories and the classifier
//! that resolves a headline to exactly one of them.
//!
//! Matching is case-insensitive substring search on the raw title. When several
//! categories hit, the lowest `priority` wins; equal priorities resolve to the
//! category declared first. Keyword specificity is not weighed.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_TAXONOMY_CONFIG_PATH: &str = "config/taxonomy.toml";
pub const ENV_TAXONOMY_CONFIG_PATH: &str = "TAXONOMY_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDefinition {
    pub name: String,
    /// Family headline, e.g. "Financial Results" for "Quarterly Results".
    #[serde(default)]
    pub group: Option<String>,
    /// Lower is more urgent.
    pub priority: u32,
    pub emoji: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Whether the attached filing is worth downloading for figures.
    #[serde(default)]
    pub extract_facts: bool,
}

impl CategoryDefinition {
    fn new(
        group: &str,
        name: &str,
        priority: u32,
        emoji: &str,
        keywords: &[&str],
        extract_facts: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            group: Some(group.to_string()),
            priority,
            emoji: emoji.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            extract_facts,
        }
    }

    /// Headline shown in notifications: the family if set, else the name.
    pub fn headline(&self) -> &str {
        self.group.as_deref().unwrap_or(&self.name)
    }

    pub fn is_fallback(&self) -> bool {
        self.keywords.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification<'t> {
    pub category: &'t CategoryDefinition,
    /// Keyword that selected the category; `None` for the fallback.
    pub keyword: Option<&'t str>,
}

#[derive(Debug, Deserialize)]
struct TaxonomyFile {
    #[serde(rename = "category", default)]
    categories: Vec<CategoryDefinition>,
}

#[derive(Debug, Clone)]
pub struct Taxonomy {
    categories: Vec<CategoryDefinition>,
    lowered: Vec<Vec<String>>,
    fallback: usize,
}

impl Taxonomy {
    /// Validates: unique names, no blank keywords, exactly one keyword-less
    /// fallback whose priority is above every other.
    pub fn new(categories: Vec<CategoryDefinition>) -> Result<Self> {
        if categories.is_empty() {
            bail!("taxonomy has no categories");
        }

        let mut names = HashSet::new();
        for c in &categories {
            if c.name.trim().is_empty() {
                bail!("taxonomy category with empty name");
            }
            if !names.insert(c.name.as_str()) {
                bail!("duplicate taxonomy category `{}`", c.name);
            }
            if c.keywords.iter().any(|k| k.trim().is_empty()) {
                bail!("category `{}` has a blank keyword", c.name);
            }
        }

        let fallbacks: Vec<usize> = categories
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_fallback())
            .map(|(i, _)| i)
            .collect();
        let fallback = match fallbacks.as_slice() {
            [one] => *one,
            [] => bail!("taxonomy needs one fallback category (empty keywords)"),
            many => bail!(
                "taxonomy has {} fallback categories, expected exactly one",
                many.len()
            ),
        };

        let fb = &categories[fallback];
        if let Some(c) = categories
            .iter()
            .filter(|c| !c.is_fallback())
            .find(|c| c.priority >= fb.priority)
        {
            bail!(
                "fallback `{}` (priority {}) must rank below `{}` (priority {})",
                fb.name,
                fb.priority,
                c.name,
                c.priority
            );
        }

        let lowered = categories
            .iter()
            .map(|c| c.keywords.iter().map(|k| k.to_lowercase()).collect())
            .collect();

        Ok(Self {
            categories,
            lowered,
            fallback,
        })
    }

    /// Default BSE announcement taxonomy.
    pub fn builtin() -> Self {
        let categories = vec![
            CategoryDefinition::new(
                "Financial Results",
                "Quarterly Results",
                1,
                "📊",
                &["Quarterly Results", "Q1", "Q2", "Q3", "Q4"],
                true,
            ),
            CategoryDefinition::new(
                "Financial Results",
                "Annual Results",
                1,
                "📊",
                &["Annual Results"],
                true,
            ),
            CategoryDefinition::new(
                "Financial Results",
                "Regulation 33 Filing",
                1,
                "📊",
                &["Regulation 33", "Financial Results"],
                true,
            ),
            CategoryDefinition::new("Corporate Action", "Dividend", 2, "💰", &["Dividend"], true),
            CategoryDefinition::new("Corporate Action", "Bonus Issue", 2, "💰", &["Bonus"], true),
            CategoryDefinition::new(
                "Corporate Action",
                "Stock Split",
                2,
                "💰",
                &["Stock Split", "Subdivision", "Sub-division"],
                true,
            ),
            CategoryDefinition::new(
                "Corporate Action",
                "Buyback",
                2,
                "💰",
                &["Buyback", "Buy-back", "Buy Back"],
                true,
            ),
            CategoryDefinition::new(
                "Company Update",
                "Order Win",
                3,
                "🚀",
                &["Order Received", "Bagging", "LOA", "LOI"],
                false,
            ),
            CategoryDefinition::new(
                "Company Update",
                "Press Release",
                3,
                "🚀",
                &["Press Release"],
                false,
            ),
            CategoryDefinition::new(
                "Board Meeting",
                "Board Meeting",
                4,
                "🏛",
                &["Board Meeting"],
                false,
            ),
            CategoryDefinition {
                name: "Other".into(),
                group: None,
                priority: 99,
                emoji: "📌".into(),
                keywords: Vec::new(),
                extract_facts: false,
            },
        ];
        // Statically valid; covered by tests.
        match Self::new(categories) {
            Ok(t) => t,
            Err(e) => unreachable!("builtin taxonomy invalid: {e}"),
        }
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let file: TaxonomyFile = toml::from_str(toml_str).context("parsing taxonomy toml")?;
        Self::new(file.categories)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read taxonomy at {}: {}", path.display(), e))?;
        Self::from_toml_str(&content).with_context(|| format!("taxonomy {}", path.display()))
    }

    /// Explicit path must exist; otherwise the default path is used when present
    /// and the builtin taxonomy when not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(p) = explicit {
            return Self::from_path(p);
        }
        let default = PathBuf::from(DEFAULT_TAXONOMY_CONFIG_PATH);
        if default.exists() {
            return Self::from_path(&default);
        }
        tracing::info!(target: "taxonomy", "no taxonomy file, using builtin");
        Ok(Self::builtin())
    }

    pub fn categories(&self) -> &[CategoryDefinition] {
        &self.categories
    }

    pub fn fallback(&self) -> &CategoryDefinition {
        &self.categories[self.fallback]
    }

    pub fn classify(&self, title: &str) -> Classification<'_> {
        let title = title.to_lowercase();

        // (category index, keyword index), in declaration order
        let mut matches: Vec<(usize, usize)> = Vec::new();
        for (i, keywords) in self.lowered.iter().enumerate() {
            if let Some(k) = keywords.iter().position(|kw| title.contains(kw.as_str())) {
                matches.push((i, k));
            }
        }

        // stable: equal priorities keep declaration order
        matches.sort_by_key(|&(i, _)| self.categories[i].priority);

        match matches.first() {
            Some(&(i, k)) => {
                let category = &self.categories[i];
                Classification {
                    category,
                    keyword: Some(category.keywords[k].as_str()),
                }
            }
            None => Classification {
                category: self.fallback(),
                keyword: None,
            },
        }
    }
}
