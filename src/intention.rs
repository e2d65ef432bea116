//! Intentions: what a scored action most likely represents.
//!
//! Bets and raises are looked up in a data-driven table by street, label,
//! strength band and bet size. Passive actions get a fixed word per strength
//! band. Actions without a score get no intention, except checks.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::hand::{ActionEvent, Street, Token};
use crate::label::ActionLabel;
use crate::scorer::{DecisionScore, SizeCategory};

const EMBEDDED_INTENTIONS: &str = include_str!("../rules/intentions.yml");

#[derive(Debug, thiserror::Error)]
pub enum IntentionError {
    #[error("failed to read intention file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid intention document: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("situation {label} on the {street} declared twice")]
    DuplicateSituation { street: Street, label: ActionLabel },
    #[error("empty intention for {band}/{size} in {situation}")]
    Empty {
        situation: String,
        band: StrengthBand,
        size: String,
    },
}

/// Decision score bucket: low up to 33, medium up to 66, high above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrengthBand {
    Low,
    Medium,
    High,
}

impl StrengthBand {
    pub fn of(score: f64) -> Self {
        if score <= 33.0 {
            StrengthBand::Low
        } else if score <= 66.0 {
            StrengthBand::Medium
        } else {
            StrengthBand::High
        }
    }

    fn passive_word(self) -> &'static str {
        match self {
            StrengthBand::Low => "weak",
            StrengthBand::Medium => "medium",
            StrengthBand::High => "strong",
        }
    }
}

impl Display for StrengthBand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StrengthBand::Low => "low",
            StrengthBand::Medium => "medium",
            StrengthBand::High => "high",
        })
    }
}

/// Coarse grouping of the seven size categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeGroup {
    Small,
    Medium,
    Large,
}

impl SizeGroup {
    pub fn of(size: SizeCategory) -> Self {
        match size {
            SizeCategory::Tiny | SizeCategory::Small => SizeGroup::Small,
            SizeCategory::Medium => SizeGroup::Medium,
            SizeCategory::Big | SizeCategory::Pot | SizeCategory::Over | SizeCategory::Huge => {
                SizeGroup::Large
            }
        }
    }
}

impl Display for SizeGroup {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SizeGroup::Small => "small",
            SizeGroup::Medium => "medium",
            SizeGroup::Large => "large",
        })
    }
}

type Grid<K> = BTreeMap<StrengthBand, BTreeMap<K, String>>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Mappings {
    #[serde(default)]
    detailed: Grid<SizeCategory>,
    #[serde(default)]
    grouped: Grid<SizeGroup>,
}

impl Mappings {
    fn lookup(&self, band: StrengthBand, size: SizeCategory) -> Option<&str> {
        self.detailed
            .get(&band)
            .and_then(|row| row.get(&size))
            .or_else(|| self.grouped.get(&band).and_then(|row| row.get(&SizeGroup::of(size))))
            .map(String::as_str)
    }

    fn validate(&self, situation: &str) -> Result<(), IntentionError> {
        let detailed = self
            .detailed
            .iter()
            .flat_map(|(band, row)| row.iter().map(move |(size, v)| (*band, size.to_string(), v)));
        let grouped = self.grouped.iter().flat_map(|(band, row)| {
            row.iter()
                .map(move |(group, v)| (*band, group.to_string(), v))
        });
        for (band, size, intention) in detailed.chain(grouped) {
            if intention.trim().is_empty() {
                return Err(IntentionError::Empty {
                    situation: situation.to_string(),
                    band,
                    size,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct IntentionDocument {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    defaults: Mappings,
    #[serde(default)]
    situations: Vec<SituationSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SituationSpec {
    street: Street,
    label: ActionLabel,
    #[serde(default)]
    detailed: Grid<SizeCategory>,
    #[serde(default)]
    grouped: Grid<SizeGroup>,
}

/// Validated intention lookup, shared read-only by classification workers.
#[derive(Debug, Clone, Default)]
pub struct IntentionTable {
    version: Option<String>,
    defaults: Mappings,
    situations: HashMap<(Street, ActionLabel), Mappings>,
}

impl IntentionTable {
    pub fn from_yaml(document: &str) -> Result<Self, IntentionError> {
        let document: IntentionDocument = serde_yaml::from_str(document)?;
        document.defaults.validate("defaults")?;

        let mut situations = HashMap::with_capacity(document.situations.len());
        for situation in document.situations {
            let mappings = Mappings {
                detailed: situation.detailed,
                grouped: situation.grouped,
            };
            mappings.validate(&format!("{} {}", situation.street, situation.label))?;
            if situations.insert((situation.street, situation.label), mappings).is_some() {
                return Err(IntentionError::DuplicateSituation {
                    street: situation.street,
                    label: situation.label,
                });
            }
        }

        Ok(Self {
            version: document.version,
            defaults: document.defaults,
            situations,
        })
    }

    pub fn load(path: &Path) -> Result<Self, IntentionError> {
        let text = std::fs::read_to_string(path).map_err(|source| IntentionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// The intention table shipped with the crate.
    pub fn embedded() -> Result<Self, IntentionError> {
        Self::from_yaml(EMBEDDED_INTENTIONS)
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn situations(&self) -> usize {
        self.situations.len()
    }

    /// Intention of a bet or raise. Falls back to the default grid, then to
    /// `{label}-{band}-{size}` when no cell covers the action.
    pub fn lookup(
        &self,
        street: Street,
        label: ActionLabel,
        band: StrengthBand,
        size: SizeCategory,
    ) -> String {
        self.situations
            .get(&(street, label))
            .and_then(|m| m.lookup(band, size))
            .or_else(|| self.defaults.lookup(band, size))
            .map_or_else(|| format!("{label}-{band}-{size}"), str::to_string)
    }

    pub fn intention_of(
        &self,
        event: &ActionEvent,
        label: Option<ActionLabel>,
        score: DecisionScore,
        size: Option<SizeCategory>,
    ) -> Option<String> {
        if event.token == Token::Check {
            return Some("check".to_string());
        }
        let band = StrengthBand::of(score.value()?);
        match label {
            None => Some(format!("{}-{}", event.token, band.passive_word())),
            Some(ActionLabel::Unclassified) => None,
            Some(label) => Some(self.lookup(
                event.street,
                label,
                band,
                size.unwrap_or(SizeCategory::Tiny),
            )),
        }
    }
}
