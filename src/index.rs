use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::iter;
use std::sync::Arc;

use serde::Serialize;

use crate::domain::{AbundanceMatrix, AliasTable, Treatments};
use crate::error::DredgeError;
use crate::scheduler::{ChunkSizes, YieldBudget};

pub const DEFAULT_SEARCH_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub alias: String,
    pub canonical: String,
}

#[derive(Debug)]
pub struct ProjectIndex {
    treatments: Arc<Treatments>,
    matrix: Arc<AbundanceMatrix>,
    corpus: HashMap<String, String>,
    entries: Vec<(String, String)>,
    transcript_rows: HashMap<String, usize>,
    replicate_columns: HashMap<String, usize>,
    alias_collisions: usize,
}

impl ProjectIndex {
    pub async fn build(
        treatments: Arc<Treatments>,
        matrix: Arc<AbundanceMatrix>,
        aliases: Option<&AliasTable>,
        chunks: ChunkSizes,
    ) -> Self {
        let mut index = Self {
            treatments,
            matrix,
            corpus: HashMap::new(),
            entries: Vec::new(),
            transcript_rows: HashMap::new(),
            replicate_columns: HashMap::new(),
            alias_collisions: 0,
        };

        let mut budget = YieldBudget::new(chunks.corpus_entries);
        for entry in aliases.into_iter().flatten() {
            for alias in entry.aliases.iter().chain(iter::once(&entry.canonical)) {
                index.register(alias, &entry.canonical);
            }
            budget.tick().await;
        }

        let matrix = Arc::clone(&index.matrix);
        for transcript in &matrix.transcripts {
            index.register(transcript, transcript);
            budget.tick().await;
        }

        if index.alias_collisions > 0 {
            tracing::warn!(
                collisions = index.alias_collisions,
                "aliases claimed by more than one transcript; first registration kept"
            );
        }

        // A row whose own id is canonical owns its slot; aliased rows only
        // fill slots nobody else claimed.
        let mut budget = YieldBudget::new(chunks.index_entries);
        let mut aliased_rows = Vec::new();
        for (row, transcript) in matrix.transcripts.iter().enumerate() {
            match index.corpus.get(transcript) {
                Some(canonical) if canonical != transcript => {
                    aliased_rows.push((canonical.clone(), row));
                }
                _ => {
                    index.transcript_rows.entry(transcript.clone()).or_insert(row);
                }
            }
            budget.tick().await;
        }
        for (canonical, row) in aliased_rows {
            index.transcript_rows.entry(canonical).or_insert(row);
        }

        let mut budget = YieldBudget::new(chunks.index_entries);
        for (column, replicate) in matrix.replicates.iter().enumerate() {
            index.replicate_columns.insert(replicate.clone(), column);
            budget.tick().await;
        }

        index
    }

    fn register(&mut self, alias: &str, canonical: &str) {
        match self.corpus.entry(alias.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(canonical.to_string());
                self.entries.push((alias.to_string(), canonical.to_string()));
            }
            Entry::Occupied(existing) => {
                if existing.get() != canonical {
                    self.alias_collisions += 1;
                }
            }
        }
    }

    pub fn canonicalize(&self, name: &str) -> Option<&str> {
        self.corpus.get(name).map(String::as_str)
    }

    pub fn search(&self, prefix: &str, limit: usize) -> Vec<SearchHit> {
        self.entries
            .iter()
            .filter(|(alias, _)| alias.starts_with(prefix))
            .take(limit)
            .map(|(alias, canonical)| SearchHit {
                alias: alias.clone(),
                canonical: canonical.clone(),
            })
            .collect()
    }

    pub fn abundance_for(&self, treatment: &str, transcript: &str) -> Result<Vec<f64>, DredgeError> {
        let treatment = self
            .treatments
            .get(treatment)
            .ok_or_else(|| DredgeError::UnknownTreatment(treatment.to_string()))?;
        let row = self
            .canonicalize(transcript)
            .and_then(|canonical| self.transcript_rows.get(canonical))
            .and_then(|&row| self.matrix.abundances.get(row))
            .ok_or_else(|| DredgeError::UnknownTranscript(transcript.to_string()))?;

        Ok(treatment
            .replicates
            .iter()
            .map(|replicate| {
                self.replicate_columns
                    .get(replicate)
                    .and_then(|&column| row.get(column))
                    .copied()
                    .unwrap_or(f64::NAN)
            })
            .collect())
    }

    pub fn treatments(&self) -> &Treatments {
        &self.treatments
    }

    pub fn matrix(&self) -> &AbundanceMatrix {
        &self.matrix
    }

    pub fn transcript_count(&self) -> usize {
        self.matrix.transcripts.len()
    }

    pub fn corpus_len(&self) -> usize {
        self.corpus.len()
    }

    pub fn alias_collisions(&self) -> usize {
        self.alias_collisions
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::domain::{AliasEntry, parse_treatments};

    async fn fixture() -> ProjectIndex {
        let treatments = parse_treatments(
            r#"{"A":{"replicates":["r1","r2","r3"]},"B":{"replicates":["r4"]}}"#,
        )
        .unwrap();
        let matrix = AbundanceMatrix {
            transcripts: vec!["AT1".to_string(), "AT2".to_string(), "AT3".to_string()],
            replicates: ["r1", "r2", "r3", "r4"].map(String::from).to_vec(),
            abundances: vec![
                vec![2.0, 4.0, 6.0, 1.0],
                vec![0.0, 0.0, 0.0, 0.0],
                vec![1.0, 1.0, 1.0, 9.0],
            ],
        };
        let aliases = vec![
            AliasEntry {
                canonical: "AT1".to_string(),
                aliases: vec!["NAC1".to_string(), "SHARED".to_string()],
            },
            AliasEntry {
                canonical: "AT2".to_string(),
                aliases: vec!["SHARED".to_string(), "NAC2".to_string()],
            },
        ];
        ProjectIndex::build(
            Arc::new(treatments),
            Arc::new(matrix),
            Some(&aliases),
            ChunkSizes::default(),
        )
        .await
    }

    #[tokio::test]
    async fn first_registration_wins() {
        let index = fixture().await;
        assert_eq!(index.canonicalize("SHARED"), Some("AT1"));
        assert_eq!(index.canonicalize("NAC2"), Some("AT2"));
        assert_eq!(index.canonicalize("AT3"), Some("AT3"));
        assert_eq!(index.canonicalize("nope"), None);
        assert_eq!(index.alias_collisions(), 1);
    }

    #[tokio::test]
    async fn transcript_claimed_as_alias_keeps_first_row() {
        let treatments = parse_treatments(r#"{"A":{"replicates":["r1"]}}"#).unwrap();
        let matrix = AbundanceMatrix {
            transcripts: vec!["AT2".to_string(), "AT1".to_string()],
            replicates: vec!["r1".to_string()],
            abundances: vec![vec![99.0], vec![10.0]],
        };
        let aliases = vec![AliasEntry {
            canonical: "AT1".to_string(),
            aliases: vec!["AT2".to_string()],
        }];
        let index = ProjectIndex::build(
            Arc::new(treatments),
            Arc::new(matrix),
            Some(&aliases),
            ChunkSizes::default(),
        )
        .await;

        assert_eq!(index.canonicalize("AT2"), Some("AT1"));
        assert_eq!(index.abundance_for("A", "AT1").unwrap(), vec![10.0]);
        assert_eq!(index.abundance_for("A", "AT2").unwrap(), vec![10.0]);
        assert_eq!(index.alias_collisions(), 1);
    }

    #[tokio::test]
    async fn search_respects_prefix_and_limit() {
        let index = fixture().await;
        let hits = index.search("NAC", DEFAULT_SEARCH_LIMIT);
        assert_eq!(
            hits.iter().map(|h| h.alias.as_str()).collect::<Vec<_>>(),
            vec!["NAC1", "NAC2"]
        );
        let hits = index.search("AT", 2);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.alias.starts_with("AT")));
    }

    #[tokio::test]
    async fn abundance_follows_replicate_order() {
        let index = fixture().await;
        assert_eq!(index.abundance_for("A", "AT1").unwrap(), vec![2.0, 4.0, 6.0]);
        assert_eq!(index.abundance_for("B", "NAC1").unwrap(), vec![1.0]);
        assert_eq!(index.abundance_for("B", "AT3").unwrap(), vec![9.0]);
    }

    #[tokio::test]
    async fn unknown_lookups_fail() {
        let index = fixture().await;
        assert_matches!(
            index.abundance_for("C", "AT1"),
            Err(DredgeError::UnknownTreatment(id)) if id == "C"
        );
        assert_matches!(
            index.abundance_for("A", "missing"),
            Err(DredgeError::UnknownTranscript(_))
        );
    }
}
