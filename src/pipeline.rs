use std::future::Future;
use std::sync::Arc;

use crate::client::{CachePolicy, ResourceClient, fetch_resource};
use crate::config::ProjectConfig;
use crate::domain::{AbundanceMatrix, AliasTable, Grid, ProjectSource, Treatments, parse_treatments};
use crate::error::DredgeError;
use crate::parsers::{clean_svg, parse_abundance_matrix, parse_alias_table, parse_grid, render_readme};
use crate::scheduler::ChunkSizes;
use crate::status::{LoadingStatus, ResourceLog, StatusSink};

pub const TREATMENTS: &str = "Project treatments";
pub const ALIASES: &str = "Transcript aliases";
pub const ABUNDANCES: &str = "Transcript abundance measures";
pub const README: &str = "Project documentation";
pub const DIAGRAM: &str = "SVG diagram";
pub const GRID: &str = "Transcript grid";

const NO_FILENAME: &str = "No filename specified.";

#[derive(Debug, Clone)]
pub struct ProjectData {
    pub treatments: Arc<Treatments>,
    pub matrix: Option<Arc<AbundanceMatrix>>,
    pub aliases: Option<AliasTable>,
    pub readme_html: Option<String>,
    pub svg: Option<String>,
    pub grid: Option<Grid>,
}

pub struct ResourceFetchPipeline<'a> {
    client: &'a dyn ResourceClient,
    sink: &'a dyn StatusSink,
    project: ProjectSource,
    chunks: ChunkSizes,
}

impl<'a> ResourceFetchPipeline<'a> {
    pub fn new(
        client: &'a dyn ResourceClient,
        sink: &'a dyn StatusSink,
        project: ProjectSource,
        chunks: ChunkSizes,
    ) -> Self {
        Self {
            client,
            sink,
            project,
            chunks,
        }
    }

    pub async fn fetch(&self, config: &ProjectConfig) -> Result<ProjectData, DredgeError> {
        let treatments = Arc::new(self.fetch_treatments(config).await?);
        let chunks = self.chunks;
        let known = treatments.as_ref();

        let (aliases, matrix, readme_html, svg, grid) = futures::join!(
            self.resource(
                config,
                ALIASES,
                config.transcript_aliases.as_deref(),
                CachePolicy::Default,
                |text| async move { Ok(parse_alias_table(&text, chunks.alias_lines).await) },
            ),
            self.resource(
                config,
                ABUNDANCES,
                config.abundance_measures.as_deref(),
                CachePolicy::Default,
                |text| async move { parse_abundance_matrix(&text, chunks.abundance_rows).await },
            ),
            self.resource(
                config,
                README,
                config.readme.as_deref(),
                CachePolicy::NoCache,
                |text| async move { Ok(render_readme(&text)) },
            ),
            self.resource(
                config,
                DIAGRAM,
                config.diagram.as_deref(),
                CachePolicy::NoCache,
                |text| async move { clean_svg(&text, known) },
            ),
            self.resource(
                config,
                GRID,
                config.grid.as_deref(),
                CachePolicy::NoCache,
                |text| async move { parse_grid(&text, known) },
            ),
        );

        Ok(ProjectData {
            treatments: Arc::clone(&treatments),
            matrix: matrix.map(Arc::new),
            aliases,
            readme_html,
            svg,
            grid,
        })
    }

    async fn fetch_treatments(&self, config: &ProjectConfig) -> Result<Treatments, DredgeError> {
        let Some(path) = config.treatments.as_deref() else {
            ResourceLog::new(self.sink, self.project, TREATMENTS, None)
                .emit(LoadingStatus::Missing(NO_FILENAME.to_string()));
            return Err(DredgeError::TreatmentsUnavailable);
        };
        let url = config.resolve(path)?;
        let log = ResourceLog::new(self.sink, self.project, TREATMENTS, Some(url.to_string()));
        log.emit(LoadingStatus::Pending);

        let result = match fetch_resource(self.client, &url, CachePolicy::NoCache).await {
            Ok(body) => parse_treatments(&body),
            Err(err) => Err(err),
        };
        match result {
            Ok(treatments) => {
                log.emit(LoadingStatus::Ok);
                Ok(treatments)
            }
            Err(err) => {
                log.emit(LoadingStatus::Failed(err.to_string()));
                Err(DredgeError::TreatmentsUnavailable)
            }
        }
    }

    async fn resource<T, F, Fut>(
        &self,
        config: &ProjectConfig,
        label: &str,
        path: Option<&str>,
        cache: CachePolicy,
        parse: F,
    ) -> Option<T>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T, DredgeError>>,
    {
        let Some(path) = path else {
            ResourceLog::new(self.sink, self.project, label, None)
                .emit(LoadingStatus::Missing(NO_FILENAME.to_string()));
            return None;
        };

        let url = match config.resolve(path) {
            Ok(url) => url,
            Err(err) => {
                ResourceLog::new(self.sink, self.project, label, Some(path.to_string()))
                    .emit(LoadingStatus::Failed(err.to_string()));
                return None;
            }
        };
        let log = ResourceLog::new(self.sink, self.project, label, Some(url.to_string()));
        log.emit(LoadingStatus::Pending);

        let parsed = match fetch_resource(self.client, &url, cache).await {
            Ok(body) => parse(body).await,
            Err(err) => Err(err),
        };
        match parsed {
            Ok(value) => {
                log.emit(LoadingStatus::Ok);
                Some(value)
            }
            Err(err) => {
                log.emit(LoadingStatus::Failed(err.to_string()));
                None
            }
        }
    }
}
