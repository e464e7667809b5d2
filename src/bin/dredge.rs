use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use dredge_loader::client::{HttpResourceClient, ResourceClient};
use dredge_loader::config::{ConfigLoader, StartupConfig};
use dredge_loader::display::{SortPath, SortSpec};
use dredge_loader::domain::{ProjectSource, SortOrder};
use dredge_loader::error::DredgeError;
use dredge_loader::index::DEFAULT_SEARCH_LIMIT;
use dredge_loader::output::{CompareResult, JsonOutput, SearchResult, StatusReport};
use dredge_loader::session::Session;
use dredge_loader::store::{FileStore, KeyValueStore};

#[derive(Parser)]
#[command(name = "dredge")]
#[command(about = "Load DREDGE gene-expression projects and query them from the command line")]
#[command(version, author)]
struct Cli {
    /// Where the project comes from; only global projects persist saved transcripts.
    #[arg(long, global = true, value_enum, default_value_t = ProjectSource::Global)]
    source: ProjectSource,

    #[arg(long, global = true)]
    store_dir: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Load a project and print the status of every resource")]
    Status(ProjectArgs),
    #[command(about = "Search transcript names and aliases by prefix")]
    Search(SearchArgs),
    #[command(about = "Load a pairwise comparison and print the sorted transcript rows")]
    Compare(CompareArgs),
    #[command(about = "Print the validated project.json")]
    ExportConfig(ProjectArgs),
}

#[derive(Args)]
struct ProjectArgs {
    /// URL or path of the project.json file.
    config: String,
}

#[derive(Args)]
struct SearchArgs {
    config: String,
    prefix: String,

    #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
    limit: usize,
}

#[derive(Args)]
struct CompareArgs {
    config: String,
    treatment_a: String,
    treatment_b: String,

    /// File with one transcript per line; defaults to the saved transcripts.
    #[arg(long)]
    transcripts: Option<PathBuf>,

    #[arg(long, default_value = "transcript.pValue")]
    sort: SortPath,

    #[arg(long, value_enum, default_value_t = SortOrder::Asc)]
    order: SortOrder,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(dredge) = report.downcast_ref::<DredgeError>() {
            return ExitCode::from(map_exit_code(dredge));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &DredgeError) -> u8 {
    match error {
        DredgeError::FileNotFound
        | DredgeError::ConfigField { .. }
        | DredgeError::ConfigLoad(_)
        | DredgeError::ConfigMalformed
        | DredgeError::TreatmentsUnavailable
        | DredgeError::UnknownTreatment(_)
        | DredgeError::UnknownTranscript(_)
        | DredgeError::PairwiseFileNotFound { .. }
        | DredgeError::NoProject => 2,
        DredgeError::Transport(_) | DredgeError::RequestFailed(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;
    runtime.block_on(run_command(cli))
}

async fn run_command(cli: Cli) -> miette::Result<()> {
    let store: Arc<dyn KeyValueStore> = match cli.store_dir {
        Some(root) => Arc::new(FileStore::new_with_root(root)),
        None => Arc::new(FileStore::new()?),
    };
    let client: Arc<dyn ResourceClient> = Arc::new(HttpResourceClient::new()?);
    let source = cli.source;

    match cli.command {
        Commands::Status(args) => {
            let startup = StartupConfig::from_location(&args.config, source)?;
            run_status(Session::new(startup, client, store)).await
        }
        Commands::Search(args) => {
            let startup = StartupConfig::from_location(&args.config, source)?;
            run_search(Session::new(startup, client, store), args).await
        }
        Commands::Compare(args) => {
            let startup = StartupConfig::from_location(&args.config, source)?;
            run_compare(Session::new(startup, client, store), args).await
        }
        Commands::ExportConfig(args) => {
            let startup = StartupConfig::from_location(&args.config, source)?;
            let config = ConfigLoader::load(client.as_ref(), &startup, &JsonOutput)
                .await?
                .ok_or(DredgeError::NoProject)?;
            JsonOutput::print_config(&config.to_project_json()?).into_diagnostic()?;
            Ok(())
        }
    }
}

async fn run_status(mut session: Session) -> miette::Result<()> {
    let loaded = session.load_project().await;
    let report = StatusReport {
        project: loaded.as_ref().ok().cloned(),
        error: loaded.as_ref().err().map(ToString::to_string),
        events: session.status_log().events(),
    };
    JsonOutput::print_status(&report).into_diagnostic()?;
    loaded?;
    Ok(())
}

async fn run_search(mut session: Session, args: SearchArgs) -> miette::Result<()> {
    session.load_project().await?;
    let project = session.project().ok_or(DredgeError::NoProject)?;
    let result = SearchResult {
        hits: project.index.search(&args.prefix, args.limit),
        prefix: args.prefix,
    };
    JsonOutput::print_search(&result).into_diagnostic()?;
    Ok(())
}

async fn run_compare(mut session: Session, args: CompareArgs) -> miette::Result<()> {
    session.load_project().await?;

    if let Some(path) = &args.transcripts {
        let text = tokio::fs::read_to_string(path).await.into_diagnostic()?;
        let project = session.project().ok_or(DredgeError::NoProject)?;
        let (known, unknown): (Vec<_>, Vec<_>) = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .partition(|id| project.index.canonicalize(id).is_some());
        if !unknown.is_empty() {
            tracing::warn!(count = unknown.len(), first = %unknown[0], "skipping unknown transcripts");
        }
        session.set_brushed_transcripts(known)?;
    }

    let (table, _) = session
        .set_pairwise_comparison(&args.treatment_a, &args.treatment_b)
        .await?;
    let rows = session
        .update_displayed_transcripts(Some(SortSpec {
            path: args.sort,
            order: args.order,
        }))?
        .to_vec();

    let result = CompareResult {
        treatment_a: args.treatment_a,
        treatment_b: args.treatment_b,
        source: table.source.clone(),
        records: table.len(),
        rows,
    };
    JsonOutput::print_compare(&result).into_diagnostic()?;
    Ok(())
}
