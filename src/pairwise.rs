use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use reqwest::Url;
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::client::{CachePolicy, ResourceClient};
use crate::config::ProjectConfig;
use crate::domain::PairKey;
use crate::error::DredgeError;
use crate::index::ProjectIndex;
use crate::parsers::abundance::parse_float;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRecord {
    pub name: String,
    #[serde(rename = "logFC")]
    pub log_fc: f64,
    #[serde(rename = "logATA")]
    pub log_ata: f64,
    #[serde(rename = "pValue")]
    pub p_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairwiseTable {
    pub treatment_a: String,
    pub treatment_b: String,
    pub source: String,
    records: HashMap<String, ComparisonRecord>,
}

impl PairwiseTable {
    pub fn get(&self, name: &str) -> Option<&ComparisonRecord> {
        self.records.get(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &ComparisonRecord> {
        self.records.values()
    }

    /// The table with fold changes relative to `(a, b)`.
    pub fn oriented(self: &Arc<Self>, a: &str, b: &str) -> Arc<Self> {
        if self.treatment_a == a && self.treatment_b == b {
            return Arc::clone(self);
        }
        let mut flipped = PairwiseTable::clone(self);
        flipped.treatment_a = a.to_string();
        flipped.treatment_b = b.to_string();
        for record in flipped.records.values_mut() {
            record.log_fc = -record.log_fc;
        }
        Arc::new(flipped)
    }
}

pub fn parse_pairwise(
    text: &str,
    reverse: bool,
    index: &ProjectIndex,
    treatment_a: &str,
    treatment_b: &str,
    source: &str,
) -> PairwiseTable {
    let sign = if reverse { -1.0 } else { 1.0 };
    let records = text
        .trim()
        .split('\n')
        .skip(1)
        .map(|row| {
            let mut fields = row.trim_end_matches('\r').split('\t');
            let id = fields.next().unwrap_or_default();
            let name = index.canonicalize(id).unwrap_or(id).to_string();
            let mut next = || fields.next().map(parse_float).unwrap_or(f64::NAN);
            let record = ComparisonRecord {
                name: name.clone(),
                log_fc: sign * next(),
                log_ata: next(),
                p_value: next(),
            };
            (name, record)
        })
        .collect();

    PairwiseTable {
        treatment_a: treatment_a.to_string(),
        treatment_b: treatment_b.to_string(),
        source: source.to_string(),
        records,
    }
}

pub fn pairwise_urls(config: &ProjectConfig, a: &str, b: &str) -> Result<(Url, Url), DredgeError> {
    let template = config.pairwise_template();
    let fill = |first: &str, second: &str| {
        config.resolve(&template.replace("%A", first).replace("%B", second))
    };
    Ok((fill(a, b)?, fill(b, a)?))
}

type Slot = Arc<OnceCell<Arc<PairwiseTable>>>;

/// Comparison tables per unordered treatment pair. Each slot is filled at
/// most once; concurrent requests for the same pair wait on one fetch.
#[derive(Debug, Default)]
pub struct PairwiseCache {
    slots: Mutex<HashMap<PairKey, Slot>>,
}

impl PairwiseCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: PairKey) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        Arc::clone(slots.entry(key).or_default())
    }

    pub fn get(&self, a: &str, b: &str) -> Option<Arc<PairwiseTable>> {
        let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots.get(&PairKey::new(a, b))?.get().cloned()
    }

    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots.values().filter(|slot| slot.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.slots.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }
}

#[derive(Debug, Clone)]
pub struct PairwiseOutcome {
    pub table: Arc<PairwiseTable>,
    pub resort: bool,
    pub cached: bool,
}

pub struct PairwiseLoader<'a> {
    client: &'a dyn ResourceClient,
    config: &'a ProjectConfig,
    index: &'a ProjectIndex,
    cache: &'a PairwiseCache,
}

impl<'a> PairwiseLoader<'a> {
    pub fn new(
        client: &'a dyn ResourceClient,
        config: &'a ProjectConfig,
        index: &'a ProjectIndex,
        cache: &'a PairwiseCache,
    ) -> Self {
        Self {
            client,
            config,
            index,
            cache,
        }
    }

    pub async fn load(&self, a: &str, b: &str) -> Result<PairwiseOutcome, DredgeError> {
        if let Some(table) = self.cache.get(a, b) {
            tokio::task::yield_now().await;
            return Ok(PairwiseOutcome {
                table: table.oriented(a, b),
                resort: true,
                cached: true,
            });
        }

        for id in [a, b] {
            if !self.index.treatments().contains_key(id) {
                return Err(DredgeError::UnknownTreatment(id.to_string()));
            }
        }

        let slot = self.cache.slot(PairKey::new(a, b));
        let table = slot
            .get_or_try_init(move || async move { self.fetch(a, b).await.map(Arc::new) })
            .await?;

        Ok(PairwiseOutcome {
            table: table.oriented(a, b),
            resort: true,
            cached: false,
        })
    }

    async fn fetch(&self, a: &str, b: &str) -> Result<PairwiseTable, DredgeError> {
        let (forward, reverse) = pairwise_urls(self.config, a, b)?;
        let (forward_resp, reverse_resp) = futures::join!(
            self.client.get(&forward, CachePolicy::Default),
            self.client.get(&reverse, CachePolicy::Default),
        );

        let (body, flipped, source) = match (forward_resp, reverse_resp) {
            (Ok(resp), _) if resp.is_success() => (resp.body, false, &forward),
            (_, Ok(resp)) if resp.is_success() => (resp.body, true, &reverse),
            _ => {
                return Err(DredgeError::PairwiseFileNotFound {
                    forward: forward.to_string(),
                    reverse: reverse.to_string(),
                });
            }
        };

        tracing::info!(a, b, source = %source, flipped, "loaded pairwise comparison");
        Ok(parse_pairwise(
            &body,
            flipped,
            self.index,
            a,
            b,
            source.as_str(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AbundanceMatrix, AliasEntry, parse_treatments};
    use crate::scheduler::ChunkSizes;

    async fn index() -> ProjectIndex {
        let treatments =
            parse_treatments(r#"{"A":{"replicates":["r1"]},"B":{"replicates":["r2"]}}"#).unwrap();
        let matrix = AbundanceMatrix {
            transcripts: vec!["AT1".to_string()],
            replicates: vec!["r1".to_string(), "r2".to_string()],
            abundances: vec![vec![1.0, 2.0]],
        };
        let aliases = vec![AliasEntry {
            canonical: "AT1".to_string(),
            aliases: vec!["NAC1".to_string()],
        }];
        ProjectIndex::build(
            Arc::new(treatments),
            Arc::new(matrix),
            Some(&aliases),
            ChunkSizes::default(),
        )
        .await
    }

    #[tokio::test]
    async fn parses_and_canonicalizes_rows() {
        let index = index().await;
        let text = "id\tlogFC\tlogATA\tpValue\nNAC1\t1.5\t3.0\t0.01\nAT9\tx\t2\t0.5\n";
        let table = parse_pairwise(text, true, &index, "A", "B", "f");
        assert_eq!(table.len(), 2);
        let record = table.get("AT1").unwrap();
        assert_eq!(record.log_fc, -1.5);
        assert_eq!(record.log_ata, 3.0);
        assert_eq!(record.p_value, 0.01);
        assert!(table.get("AT9").unwrap().log_fc.is_nan());
    }

    #[tokio::test]
    async fn orientation_flips_fold_change() {
        let index = index().await;
        let table = Arc::new(parse_pairwise("h\nAT1\t2\t1\t0.1", false, &index, "A", "B", "f"));
        assert!(Arc::ptr_eq(&table.oriented("A", "B"), &table));
        let flipped = table.oriented("B", "A");
        assert_eq!(flipped.get("AT1").unwrap().log_fc, -2.0);
        assert_eq!(flipped.get("AT1").unwrap().log_ata, 1.0);
        assert_eq!(flipped.treatment_a, "B");
    }

    #[test]
    fn urls_follow_template() {
        let mut config = ProjectConfig::new(Url::parse("https://x.org/study/").unwrap());
        let (forward, reverse) = pairwise_urls(&config, "A", "B").unwrap();
        assert_eq!(forward.as_str(), "https://x.org/study/pairwise_tests/A_B.txt");
        assert_eq!(reverse.as_str(), "https://x.org/study/pairwise_tests/B_A.txt");

        config.pairwise_name = Some("de/%A-vs-%B.tsv".to_string());
        let (forward, _) = pairwise_urls(&config, "heat", "cold").unwrap();
        assert_eq!(forward.as_str(), "https://x.org/study/de/heat-vs-cold.tsv");
    }
}
