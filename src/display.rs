use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexSet;
use serde::Serialize;

use crate::domain::SortOrder;
use crate::error::DredgeError;
use crate::index::ProjectIndex;
use crate::pairwise::{ComparisonRecord, PairwiseTable};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptStats {
    pub name: String,
    #[serde(rename = "logFC", skip_serializing_if = "Option::is_none")]
    pub log_fc: Option<f64>,
    #[serde(rename = "logATA", skip_serializing_if = "Option::is_none")]
    pub log_ata: Option<f64>,
    #[serde(rename = "pValue", skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
}

impl TranscriptStats {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            log_fc: None,
            log_ata: None,
            p_value: None,
        }
    }
}

impl From<&ComparisonRecord> for TranscriptStats {
    fn from(record: &ComparisonRecord) -> Self {
        Self {
            name: record.name.clone(),
            log_fc: Some(record.log_fc),
            log_ata: Some(record.log_ata),
            p_value: Some(record.p_value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayedRow {
    pub transcript: TranscriptStats,
    pub saved: bool,
    #[serde(rename = "treatmentA_AbundanceMean")]
    pub treatment_a_mean: Option<f64>,
    #[serde(rename = "treatmentA_AbundanceMedian")]
    pub treatment_a_median: Option<f64>,
    #[serde(rename = "treatmentB_AbundanceMean")]
    pub treatment_b_mean: Option<f64>,
    #[serde(rename = "treatmentB_AbundanceMedian")]
    pub treatment_b_median: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Text(String),
    Number(f64),
    Flag(bool),
}

impl SortValue {
    fn compare(&self, other: &SortValue) -> Ordering {
        match (self, other) {
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
            (SortValue::Flag(a), SortValue::Flag(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl DisplayedRow {
    pub fn value_at(&self, path: &SortPath) -> Option<SortValue> {
        let segments = path.0.iter().map(String::as_str).collect::<Vec<_>>();
        let number = |value: Option<f64>| value.filter(|v| !v.is_nan()).map(SortValue::Number);
        match segments.as_slice() {
            ["transcript", "name"] => Some(SortValue::Text(self.transcript.name.clone())),
            ["transcript", "logFC"] => number(self.transcript.log_fc),
            ["transcript", "logATA"] => number(self.transcript.log_ata),
            ["transcript", "pValue"] => number(self.transcript.p_value),
            ["saved"] => Some(SortValue::Flag(self.saved)),
            ["treatmentA_AbundanceMean"] => number(self.treatment_a_mean),
            ["treatmentA_AbundanceMedian"] => number(self.treatment_a_median),
            ["treatmentB_AbundanceMean"] => number(self.treatment_b_mean),
            ["treatmentB_AbundanceMedian"] => number(self.treatment_b_median),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortPath(Vec<String>);

impl SortPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn is_name_like(&self) -> bool {
        self.0.iter().any(|segment| segment == "name")
    }
}

impl Default for SortPath {
    fn default() -> Self {
        Self::new(["transcript", "pValue"])
    }
}

impl FromStr for SortPath {
    type Err = DredgeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let segments = value
            .split('.')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>();
        if segments.is_empty() {
            return Err(DredgeError::ConfigField {
                field: "sort".to_string(),
                reason: "empty sort path".to_string(),
            });
        }
        Ok(Self::new(segments))
    }
}

impl fmt::Display for SortPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SortSpec {
    pub path: SortPath,
    pub order: SortOrder,
}

pub struct DisplayRequest<'a> {
    pub saved: &'a IndexSet<String>,
    pub brushed: &'a IndexSet<String>,
    pub comparison: Option<&'a PairwiseTable>,
    pub treatments: Option<(&'a str, &'a str)>,
    pub sort: &'a SortSpec,
}

pub fn mean(values: &[f64]) -> Option<f64> {
    let valid = values.iter().filter(|v| !v.is_nan()).collect::<Vec<_>>();
    if valid.is_empty() {
        return None;
    }
    Some(valid.iter().copied().sum::<f64>() / valid.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    let mut valid = values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .collect::<Vec<_>>();
    if valid.is_empty() {
        return None;
    }
    valid.sort_by(f64::total_cmp);
    let mid = valid.len() / 2;
    if valid.len() % 2 == 0 {
        Some((valid[mid - 1] + valid[mid]) / 2.0)
    } else {
        Some(valid[mid])
    }
}

pub fn display_rows(
    index: &ProjectIndex,
    request: &DisplayRequest<'_>,
) -> Result<Vec<DisplayedRow>, DredgeError> {
    let listed = if request.brushed.is_empty() {
        request.saved
    } else {
        request.brushed
    };

    let rows = listed
        .iter()
        .map(|name| build_row(index, request, name))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(sort_rows(rows, request.sort))
}

fn build_row(
    index: &ProjectIndex,
    request: &DisplayRequest<'_>,
    name: &str,
) -> Result<DisplayedRow, DredgeError> {
    let saved = request.saved.contains(name);
    let Some(table) = request.comparison else {
        return Ok(DisplayedRow {
            transcript: TranscriptStats::named(name),
            saved,
            treatment_a_mean: None,
            treatment_a_median: None,
            treatment_b_mean: None,
            treatment_b_median: None,
        });
    };

    let transcript = match table.get(name) {
        Some(record) => TranscriptStats::from(record),
        None => TranscriptStats::named(index.canonicalize(name).unwrap_or(name)),
    };
    let (a, b) = request
        .treatments
        .unwrap_or((table.treatment_a.as_str(), table.treatment_b.as_str()));
    let a_values = listed_abundances(index, a, name)?;
    let b_values = listed_abundances(index, b, name)?;

    Ok(DisplayedRow {
        transcript,
        saved,
        treatment_a_mean: mean(&a_values),
        treatment_a_median: median(&a_values),
        treatment_b_mean: mean(&b_values),
        treatment_b_median: median(&b_values),
    })
}

// Saved lists may name transcripts the matrix lacks; those rows get
// undefined statistics. Unknown treatments still fail.
fn listed_abundances(
    index: &ProjectIndex,
    treatment: &str,
    name: &str,
) -> Result<Vec<f64>, DredgeError> {
    match index.abundance_for(treatment, name) {
        Err(DredgeError::UnknownTranscript(_)) => Ok(Vec::new()),
        other => other,
    }
}

pub fn sort_rows(rows: Vec<DisplayedRow>, sort: &SortSpec) -> Vec<DisplayedRow> {
    let name_like = sort.path.is_name_like();
    let mut keyed = rows
        .into_iter()
        .map(|row| {
            let key = row.value_at(&sort.path).map(|value| match value {
                SortValue::Text(text) if name_like => SortValue::Text(text.to_lowercase()),
                other => other,
            });
            (key, row)
        })
        .collect::<Vec<_>>();

    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match sort.order {
            SortOrder::Asc => a.compare(b),
            SortOrder::Desc => b.compare(a),
        },
    });

    keyed.into_iter().map(|(_, row)| row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, p_value: Option<f64>) -> DisplayedRow {
        DisplayedRow {
            transcript: TranscriptStats {
                name: name.to_string(),
                log_fc: None,
                log_ata: None,
                p_value,
            },
            saved: true,
            treatment_a_mean: None,
            treatment_a_median: None,
            treatment_b_mean: None,
            treatment_b_median: None,
        }
    }

    fn names(rows: &[DisplayedRow]) -> Vec<&str> {
        rows.iter().map(|r| r.transcript.name.as_str()).collect()
    }

    #[test]
    fn mean_and_median() {
        assert_eq!(mean(&[2.0, 4.0, 6.0]), Some(4.0));
        assert_eq!(median(&[6.0, 2.0, 4.0]), Some(4.0));
        assert_eq!(median(&[1.0, 2.0, 3.0, 10.0]), Some(2.5));
        assert_eq!(mean(&[f64::NAN, 3.0]), Some(3.0));
        assert_eq!(mean(&[]), None);
        assert_eq!(median(&[f64::NAN]), None);
    }

    #[test]
    fn name_sort_ignores_case() {
        let sort = SortSpec {
            path: "transcript.name".parse().unwrap(),
            order: SortOrder::Asc,
        };
        let sorted = sort_rows(vec![row("banana", None), row("Apple", None)], &sort);
        assert_eq!(names(&sorted), vec!["Apple", "banana"]);
    }

    #[test]
    fn undefined_values_sort_last_both_ways() {
        let rows = vec![
            row("none", None),
            row("low", Some(0.01)),
            row("nan", Some(f64::NAN)),
            row("high", Some(0.5)),
        ];
        for (order, expected) in [
            (SortOrder::Asc, ["low", "high"]),
            (SortOrder::Desc, ["high", "low"]),
        ] {
            let sort = SortSpec {
                path: SortPath::default(),
                order,
            };
            let sorted = sort_rows(rows.clone(), &sort);
            assert_eq!(&names(&sorted)[..2], &expected);
            assert_eq!(&names(&sorted)[2..], &["none", "nan"]);
        }
    }

    #[test]
    fn sort_path_parses_dotted() {
        let path: SortPath = "treatmentA_AbundanceMean".parse().unwrap();
        assert!(!path.is_name_like());
        assert_eq!(path.to_string(), "treatmentA_AbundanceMean");
        assert!("".parse::<SortPath>().is_err());
    }
}
