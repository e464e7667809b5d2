use crate::domain::{AliasEntry, AliasTable};
use crate::scheduler::YieldBudget;

use super::lines;

pub async fn parse_alias_table(text: &str, chunk: usize) -> AliasTable {
    let mut budget = YieldBudget::new(chunk);
    let mut table = Vec::new();

    for line in lines(text) {
        let mut tokens = line
            .split(['\t', ','])
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string);

        if let Some(canonical) = tokens.next() {
            table.push(AliasEntry {
                canonical,
                aliases: tokens.collect(),
            });
        }
        budget.tick().await;
    }

    table
}
