#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::Url;

use dredge_loader::client::{CachePolicy, FetchResponse, ResourceClient};
use dredge_loader::config::StartupConfig;
use dredge_loader::error::DredgeError;
use dredge_loader::session::Session;
use dredge_loader::store::MemoryStore;

pub const BASE: &str = "https://dredge.test/study/";

pub fn url(path: &str) -> String {
    format!("{BASE}{path}")
}

/// Serves registered bodies by URL; anything else is a 404.
#[derive(Default)]
pub struct MockClient {
    files: HashMap<String, String>,
    statuses: HashMap<String, (u16, String)>,
    calls: Mutex<Vec<(String, CachePolicy)>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, body: &str) -> Self {
        self.files.insert(url(path), body.to_string());
        self
    }

    pub fn with_status(mut self, path: &str, status: u16, text: &str) -> Self {
        self.statuses.insert(url(path), (status, text.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<(String, CachePolicy)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, fragment: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(url, _)| url.contains(fragment))
            .count()
    }
}

#[async_trait]
impl ResourceClient for MockClient {
    async fn get(&self, url: &Url, cache: CachePolicy) -> Result<FetchResponse, DredgeError> {
        self.calls.lock().unwrap().push((url.to_string(), cache));
        tokio::task::yield_now().await;
        if let Some((status, text)) = self.statuses.get(url.as_str()) {
            return Ok(FetchResponse::status(*status, text));
        }
        match self.files.get(url.as_str()) {
            Some(body) => Ok(FetchResponse::ok(body.clone())),
            None => Ok(FetchResponse::status(404, "Not Found")),
        }
    }
}

pub fn startup() -> StartupConfig {
    StartupConfig::global(Some(Url::parse(&url("project.json")).unwrap()), "/study")
}

pub fn session(client: &Arc<MockClient>) -> (Session, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let session = Session::new(startup(), client.clone(), store.clone());
    (session, store)
}

pub const TREATMENTS: &str = r#"{
    "A": {"label": "Control", "replicates": ["r1", "r2", "r3"]},
    "B": {"replicates": ["r4"]},
    "C": {"replicates": ["r5"]}
}"#;

pub const ABUNDANCES: &str =
    "id\tr1\tr2\tr3\tr4\tr5\ngeneX\t2\t4\t6\t1\t0\ngeneY\t1\t1\t1\t8\t0\ngeneZ\t0\t0\t0\t0\t0\n";

pub const ALIASES: &str = "geneX, NAC1, NAC2\ngeneY\tHSP\n";

/// A project with treatments, abundances and aliases, plus an A-vs-B
/// comparison file.
pub fn project_client() -> MockClient {
    MockClient::new()
        .with_file(
            "project.json",
            r#"{
                "label": "Heat study",
                "treatments": "treatments.json",
                "abundanceMeasures": "abundances.tsv",
                "transcriptAliases": "aliases.csv"
            }"#,
        )
        .with_file("treatments.json", TREATMENTS)
        .with_file("abundances.tsv", ABUNDANCES)
        .with_file("aliases.csv", ALIASES)
        .with_file(
            "pairwise_tests/A_B.txt",
            "id\tlogFC\tlogATA\tpValue\nNAC1\t1.5\t3.0\t0.2\ngeneY\t-2\t1.0\t0.01\n",
        )
}
