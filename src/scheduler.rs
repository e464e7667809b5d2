//! Cooperative yield points for long-running parse and index loops.
//!
//! Loading runs on a single task; these loops hand control back to the
//! runtime every `every` items so sibling resource fetches keep progressing.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSizes {
    pub alias_lines: usize,
    pub abundance_rows: usize,
    pub index_entries: usize,
    pub corpus_entries: usize,
}

impl Default for ChunkSizes {
    fn default() -> Self {
        Self {
            alias_lines: 1500,
            abundance_rows: 1000,
            index_entries: 500,
            corpus_entries: 5000,
        }
    }
}

#[derive(Debug)]
pub struct YieldBudget {
    every: usize,
    seen: usize,
    yields: usize,
}

impl YieldBudget {
    pub fn new(every: usize) -> Self {
        Self {
            every,
            seen: 0,
            yields: 0,
        }
    }

    pub async fn tick(&mut self) {
        self.seen += 1;
        if self.every != 0 && self.seen % self.every == 0 {
            self.yields += 1;
            tokio::task::yield_now().await;
        }
    }

    pub fn yields(&self) -> usize {
        self.yields
    }
}
