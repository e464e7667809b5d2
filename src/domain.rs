use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::DredgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProjectSource {
    Global,
    Local,
}

impl ProjectSource {
    pub fn key(&self) -> &'static str {
        match self {
            ProjectSource::Global => "global",
            ProjectSource::Local => "local",
        }
    }

    pub fn persists_saved_transcripts(&self) -> bool {
        matches!(self, ProjectSource::Global)
    }
}

impl fmt::Display for ProjectSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Treatment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub replicates: Vec<String>,
}

impl Treatment {
    pub fn display_label<'a>(&'a self, id: &'a str) -> &'a str {
        match self.label.as_deref() {
            Some(label) if !label.is_empty() => label,
            _ => id,
        }
    }
}

pub type Treatments = IndexMap<String, Treatment>;

pub fn parse_treatments(body: &str) -> Result<Treatments, DredgeError> {
    serde_json::from_str(body).map_err(|_| DredgeError::TreatmentsMalformed)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AbundanceMatrix {
    pub transcripts: Vec<String>,
    pub replicates: Vec<String>,
    pub abundances: Vec<Vec<f64>>,
}

impl AbundanceMatrix {
    pub fn is_consistent(&self) -> bool {
        self.abundances.len() == self.transcripts.len()
            && self
                .abundances
                .iter()
                .all(|row| row.len() == self.replicates.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasEntry {
    pub canonical: String,
    pub aliases: Vec<String>,
}

pub type AliasTable = Vec<AliasEntry>;

pub type Grid = Vec<Vec<Option<String>>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey(String, String);

impl PairKey {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self(a.to_string(), b.to_string())
        } else {
            Self(b.to_string(), a.to_string())
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.0, self.1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = DredgeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(DredgeError::ConfigField {
                field: "order".to_string(),
                reason: format!("expected `asc` or `desc`, got `{other}`"),
            }),
        }
    }
}
