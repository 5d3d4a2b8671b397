//! Taxonomy label cleaning.
//!
//! Classifier output arrives as lineage strings such as
//! `d__Bacteria; p__Firmicutes; ...; g__[Ruminococcus]; s__`. These helpers
//! strip rank prefixes and decoration, discard uninformative names and pick
//! a readable label for each feature.

use crate::data::CountMatrix;
use crate::error::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Taxonomic ranks in lineage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rank {
    Kingdom,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
}

impl Rank {
    pub const ALL: [Rank; 7] = [
        Rank::Kingdom,
        Rank::Phylum,
        Rank::Class,
        Rank::Order,
        Rank::Family,
        Rank::Genus,
        Rank::Species,
    ];

    fn from_prefix(prefix: char) -> Option<Self> {
        match prefix {
            'k' | 'd' => Some(Rank::Kingdom),
            'p' => Some(Rank::Phylum),
            'c' => Some(Rank::Class),
            'o' => Some(Rank::Order),
            'f' => Some(Rank::Family),
            'g' => Some(Rank::Genus),
            's' => Some(Rank::Species),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Rank::Kingdom => "Kingdom",
            Rank::Phylum => "Phylum",
            Rank::Class => "Class",
            Rank::Order => "Order",
            Rank::Family => "Family",
            Rank::Genus => "Genus",
            Rank::Species => "Species",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const UNINFORMATIVE: &[&str] = &[
    "uncultured",
    "unidentified",
    "unknown",
    "unclassified",
    "metagenome",
    "gut metagenome",
    "uncultured bacterium",
    "uncultured organism",
    "ambiguous_taxa",
    "na",
];

fn prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([kdpcofgs])_{1,2}").expect("static regex"))
}

fn split_rank(raw: &str) -> (Option<Rank>, &str) {
    let raw = raw.trim();
    match prefix_re().captures(raw) {
        Some(caps) => {
            let rank = caps[1].chars().next().and_then(Rank::from_prefix);
            (rank, &raw[caps[0].len()..])
        }
        None => (None, raw),
    }
}

/// Clean a single taxon name.
///
/// Strips rank prefixes, quotes and square brackets; returns `None` for
/// empty or uninformative names.
pub fn clean_label(raw: &str) -> Option<String> {
    let (_, name) = split_rank(raw);
    let name: String = name
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .chars()
        .filter(|c| *c != '[' && *c != ']')
        .collect();
    let name = name.trim();
    if name.is_empty() || UNINFORMATIVE.contains(&name.to_ascii_lowercase().as_str()) {
        None
    } else {
        Some(name.to_string())
    }
}

/// A parsed lineage with one optional cleaned name per rank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineage {
    names: HashMap<Rank, String>,
}

impl Lineage {
    /// Parse a lineage string split on `sep`.
    ///
    /// Prefixed entries are placed by prefix; unprefixed entries are placed by
    /// position.
    pub fn parse(raw: &str, sep: char) -> Self {
        let mut names = HashMap::new();
        for (pos, part) in raw.split(sep).enumerate() {
            let (rank, _) = split_rank(part);
            let rank = match rank.or_else(|| Rank::ALL.get(pos).copied()) {
                Some(r) => r,
                None => continue,
            };
            if let Some(name) = clean_label(part) {
                names.insert(rank, name);
            }
        }
        Self { names }
    }

    pub fn get(&self, rank: Rank) -> Option<&str> {
        self.names.get(&rank).map(String::as_str)
    }

    /// Deepest informative rank name.
    ///
    /// Species names are joined to the genus when they lack it
    /// (`g__Bacteroides; s__fragilis` → `Bacteroides fragilis`). A lineage
    /// with nothing informative is `Unclassified`.
    pub fn best_label(&self) -> String {
        if let Some(species) = self.get(Rank::Species) {
            return match self.get(Rank::Genus) {
                Some(genus) if !species.starts_with(genus) => format!("{} {}", genus, species),
                _ => species.to_string(),
            };
        }
        Rank::ALL
            .iter()
            .rev()
            .find_map(|&rank| self.get(rank).map(|name| (rank, name)))
            .map(|(rank, name)| match rank {
                Rank::Genus => name.to_string(),
                _ => format!("Unclassified {} ({})", name, rank),
            })
            .unwrap_or_else(|| "Unclassified".to_string())
    }
}

/// Replace lineage-style feature IDs with cleaned, unique labels.
///
/// Duplicate labels get `_2`, `_3`, ... suffixes in feature order.
pub fn clean_feature_ids(counts: &CountMatrix, sep: char) -> Result<CountMatrix> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let ids = counts
        .feature_ids()
        .iter()
        .map(|raw| {
            let label = Lineage::parse(raw, sep).best_label();
            let n = seen.entry(label.clone()).or_insert(0);
            *n += 1;
            if *n == 1 {
                label
            } else {
                format!("{}_{}", label, n)
            }
        })
        .collect();
    counts.clone().with_feature_ids(ids)
}
