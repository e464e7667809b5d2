use std::sync::Arc;

use indexmap::IndexSet;
use serde::Serialize;

use crate::client::ResourceClient;
use crate::config::{ConfigLoader, ProjectConfig, StartupConfig};
use crate::display::{DisplayRequest, DisplayedRow, SortSpec, display_rows};
use crate::error::DredgeError;
use crate::index::ProjectIndex;
use crate::pairwise::{PairwiseCache, PairwiseLoader, PairwiseTable};
use crate::pipeline::{ProjectData, ResourceFetchPipeline};
use crate::status::{LoadingStatus, ResourceLog, StatusLog};
use crate::store::{KeyValueStore, SavedTranscripts};

pub const CORPUS: &str = "Transcript corpus";

#[derive(Debug)]
pub struct Project {
    pub config: ProjectConfig,
    pub data: ProjectData,
    pub index: ProjectIndex,
    pub cache: PairwiseCache,
}

#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub saved: SavedTranscripts,
    pub brushed: IndexSet<String>,
    pub compared: Option<(String, String)>,
    pub comparison: Option<Arc<PairwiseTable>>,
    pub sort: SortSpec,
    pub displayed: Vec<DisplayedRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    LoadProjectConfig,
    LoadProject,
    SetPairwiseComparison { a: String, b: String },
    GetDefaultPairwiseComparison,
    UpdateDisplayedTranscripts { sort: Option<SortSpec> },
    SetSavedTranscripts { ids: Vec<String> },
    SetBrushedTranscripts { ids: Vec<String> },
    ImportSavedTranscripts { text: String },
    ExportSavedTranscripts,
    ResetProject,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    pub label: Option<String>,
    pub treatments: Vec<String>,
    pub transcripts: usize,
    pub corpus: usize,
    pub alias_collisions: usize,
    pub saved: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Response {
    ProjectConfig {
        config: Option<ProjectConfig>,
    },
    ProjectLoaded(ProjectSummary),
    PairwiseComparison {
        a: String,
        b: String,
        source: String,
        records: usize,
        cached: bool,
        resort: bool,
    },
    DefaultPairwiseComparison {
        pair: Option<(String, String)>,
    },
    DisplayedTranscripts {
        rows: Vec<DisplayedRow>,
    },
    SavedTranscripts {
        count: usize,
        resort: bool,
    },
    BrushedTranscripts {
        count: usize,
        resort: bool,
    },
    Imported {
        added: usize,
        total: usize,
    },
    Exported {
        text: String,
    },
    Reset,
}

pub struct Session {
    startup: StartupConfig,
    client: Arc<dyn ResourceClient>,
    store: Arc<dyn KeyValueStore>,
    log: Arc<StatusLog>,
    config: Option<ProjectConfig>,
    project: Option<Project>,
    view: ViewState,
}

impl Session {
    pub fn new(
        startup: StartupConfig,
        client: Arc<dyn ResourceClient>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            startup,
            client,
            store,
            log: Arc::new(StatusLog::new()),
            config: None,
            project: None,
            view: ViewState::default(),
        }
    }

    pub fn status_log(&self) -> &StatusLog {
        &self.log
    }

    pub fn project(&self) -> Option<&Project> {
        self.project.as_ref()
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub async fn handle(&mut self, request: Request) -> Result<Response, DredgeError> {
        tracing::debug!(?request, "handling request");
        match request {
            Request::LoadProjectConfig => Ok(Response::ProjectConfig {
                config: self.load_project_config().await?.cloned(),
            }),
            Request::LoadProject => Ok(Response::ProjectLoaded(self.load_project().await?)),
            Request::SetPairwiseComparison { a, b } => {
                let (table, cached) = self.set_pairwise_comparison(&a, &b).await?;
                Ok(Response::PairwiseComparison {
                    a,
                    b,
                    source: table.source.clone(),
                    records: table.len(),
                    cached,
                    resort: true,
                })
            }
            Request::GetDefaultPairwiseComparison => Ok(Response::DefaultPairwiseComparison {
                pair: self.default_pairwise_comparison()?,
            }),
            Request::UpdateDisplayedTranscripts { sort } => Ok(Response::DisplayedTranscripts {
                rows: self.update_displayed_transcripts(sort)?.to_vec(),
            }),
            Request::SetSavedTranscripts { ids } => {
                self.set_saved_transcripts(ids)?;
                Ok(Response::SavedTranscripts {
                    count: self.view.saved.len(),
                    resort: true,
                })
            }
            Request::SetBrushedTranscripts { ids } => {
                self.set_brushed_transcripts(ids)?;
                Ok(Response::BrushedTranscripts {
                    count: self.view.brushed.len(),
                    resort: true,
                })
            }
            Request::ImportSavedTranscripts { text } => {
                let added = self.import_saved_transcripts(&text)?;
                Ok(Response::Imported {
                    added,
                    total: self.view.saved.len(),
                })
            }
            Request::ExportSavedTranscripts => Ok(Response::Exported {
                text: self.export_saved_transcripts(),
            }),
            Request::ResetProject => {
                self.reset_project();
                Ok(Response::Reset)
            }
        }
    }

    pub async fn load_project_config(&mut self) -> Result<Option<&ProjectConfig>, DredgeError> {
        if self.config.is_none() {
            self.config =
                ConfigLoader::load(self.client.as_ref(), &self.startup, self.log.as_ref()).await?;
        }
        Ok(self.config.as_ref())
    }

    pub async fn load_project(&mut self) -> Result<ProjectSummary, DredgeError> {
        if self.project.is_none() {
            let config = self
                .load_project_config()
                .await?
                .cloned()
                .ok_or(DredgeError::NoProject)?;
            let project = self.fetch_project(config).await?;
            self.view.saved = SavedTranscripts::load(self.store.as_ref(), &self.startup)?;
            self.project = Some(project);
        }
        self.summary()
    }

    async fn fetch_project(&self, config: ProjectConfig) -> Result<Project, DredgeError> {
        let source = self.startup.source;
        let chunks = self.startup.chunk_sizes;
        let data = ResourceFetchPipeline::new(self.client.as_ref(), self.log.as_ref(), source, chunks)
            .fetch(&config)
            .await?;

        let log = ResourceLog::new(self.log.as_ref(), source, CORPUS, None);
        log.emit(LoadingStatus::Pending);
        let index = ProjectIndex::build(
            Arc::clone(&data.treatments),
            data.matrix.clone().unwrap_or_default(),
            data.aliases.as_ref(),
            chunks,
        )
        .await;
        log.emit(LoadingStatus::Ok);

        tracing::info!(
            project = %source,
            treatments = index.treatments().len(),
            transcripts = index.transcript_count(),
            "project loaded"
        );
        Ok(Project {
            config,
            data,
            index,
            cache: PairwiseCache::new(),
        })
    }

    fn summary(&self) -> Result<ProjectSummary, DredgeError> {
        let project = self.project.as_ref().ok_or(DredgeError::NoProject)?;
        Ok(ProjectSummary {
            label: project.config.label.clone(),
            treatments: project.index.treatments().keys().cloned().collect(),
            transcripts: project.index.transcript_count(),
            corpus: project.index.corpus_len(),
            alias_collisions: project.index.alias_collisions(),
            saved: self.view.saved.len(),
        })
    }

    pub async fn set_pairwise_comparison(
        &mut self,
        a: &str,
        b: &str,
    ) -> Result<(Arc<PairwiseTable>, bool), DredgeError> {
        let outcome = {
            let project = self.project.as_ref().ok_or(DredgeError::NoProject)?;
            PairwiseLoader::new(
                self.client.as_ref(),
                &project.config,
                &project.index,
                &project.cache,
            )
            .load(a, b)
            .await?
        };

        self.view.compared = Some((a.to_string(), b.to_string()));
        self.view.comparison = Some(Arc::clone(&outcome.table));
        if outcome.resort {
            self.resort()?;
        }
        Ok((outcome.table, outcome.cached))
    }

    pub fn default_pairwise_comparison(&self) -> Result<Option<(String, String)>, DredgeError> {
        let project = self.project.as_ref().ok_or(DredgeError::NoProject)?;
        let mut keys = project.index.treatments().keys();
        Ok(match (keys.next(), keys.next()) {
            (Some(a), Some(b)) => Some((a.clone(), b.clone())),
            _ => None,
        })
    }

    pub fn update_displayed_transcripts(
        &mut self,
        sort: Option<SortSpec>,
    ) -> Result<&[DisplayedRow], DredgeError> {
        if let Some(sort) = sort {
            self.view.sort = sort;
        }
        let project = self.project.as_ref().ok_or(DredgeError::NoProject)?;
        let view = &self.view;
        let request = DisplayRequest {
            saved: view.saved.ids(),
            brushed: &view.brushed,
            comparison: view.comparison.as_deref(),
            treatments: view
                .compared
                .as_ref()
                .map(|(a, b)| (a.as_str(), b.as_str())),
            sort: &view.sort,
        };
        let rows = display_rows(&project.index, &request)?;
        self.view.displayed = rows;
        Ok(&self.view.displayed)
    }

    fn resort(&mut self) -> Result<(), DredgeError> {
        if self.project.is_some() {
            self.update_displayed_transcripts(None)?;
        }
        Ok(())
    }

    pub fn set_saved_transcripts<I, S>(&mut self, ids: I) -> Result<(), DredgeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.view.saved = SavedTranscripts::from_ids(ids);
        self.view.saved.persist(self.store.as_ref(), &self.startup)?;
        self.resort()
    }

    pub fn set_brushed_transcripts<I, S>(&mut self, ids: I) -> Result<(), DredgeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.view.brushed = ids.into_iter().map(Into::into).collect();
        self.resort()
    }

    pub fn import_saved_transcripts(&mut self, text: &str) -> Result<usize, DredgeError> {
        let added = self.view.saved.import_text(text);
        self.view.saved.persist(self.store.as_ref(), &self.startup)?;
        self.resort()?;
        Ok(added)
    }

    pub fn export_saved_transcripts(&self) -> String {
        self.view.saved.export_text()
    }

    pub fn reset_project(&mut self) {
        self.project = None;
        self.view = ViewState::default();
        self.log.reset(self.startup.source);
    }
}
