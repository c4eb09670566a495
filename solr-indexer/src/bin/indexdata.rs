//! Index MMD records into Solr from a single file, a list file or a
//! directory, or flag one indexed dataset as a parent.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Parser};
use dotenv::dotenv;
use solr_indexer::cli::{exit_code, ConfigArgs, ThumbnailArgs};
use solr_indexer::logging::init_tracing;
use solr_indexer::summary::ExitPolicy;
use solr_indexer::{Dependencies, IndexingError, RecordSource};
use solr_indexer_repository::ParentMarkOutcome;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "indexdata", about = "Index MMD records into Solr", long_about = None)]
#[command(group(
    ArgGroup::new("input")
        .required(true)
        .args(["input_file", "list_file", "directory", "parent"])
))]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    /// Index a single MMD file
    #[arg(short = 'i', long = "input-file", value_name = "FILE")]
    input_file: Option<PathBuf>,

    /// Index the MMD files listed in a file, one path per line
    #[arg(short = 'l', long = "list-file", value_name = "LISTFILE")]
    list_file: Option<PathBuf>,

    /// Index the MMD files of a directory
    #[arg(short = 'd', long = "directory", value_name = "DIR")]
    directory: Option<PathBuf>,

    /// Flag an indexed dataset as a parent
    #[arg(long = "parent", value_name = "ID")]
    parent: Option<String>,

    #[command(flatten)]
    thumbnails: ThumbnailArgs,
}

impl Cli {
    fn source(&self) -> Option<RecordSource> {
        if let Some(path) = &self.input_file {
            return Some(RecordSource::single_file(path));
        }
        if let Some(path) = &self.list_file {
            return Some(RecordSource::list_file(path));
        }
        self.directory
            .as_ref()
            .map(|path| RecordSource::directory(path, false))
    }
}

async fn run(cli: Cli) -> Result<bool, IndexingError> {
    let config = cli.config.load()?;
    let mut pool = Dependencies::pool_config(&config);
    pool.workers = 1;

    let thumbnails = cli.thumbnails.enabled() && cli.parent.is_none();
    let deps = Dependencies::new(
        &config,
        cli.thumbnails.build_options(&config),
        thumbnails,
        pool,
    )
    .await?;

    if let Some(parent) = &cli.parent {
        let outcome = deps.coordinator.mark_parent(parent).await?;
        if outcome == ParentMarkOutcome::NotFound {
            warn!(parent = %parent, "Parent dataset not found in index");
            return Ok(false);
        }
        return Ok(true);
    }

    let source = cli
        .source()
        .ok_or_else(|| IndexingError::config("no input given"))?;
    let report = deps.coordinator.run(&source).await?;
    info!(run_id = %report.run_id, state = %report.state, summary = %report.summary, "Done");
    Ok(report.is_success(&ExitPolicy::new(config.max_failure_percent)))
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = init_tracing("indexdata") {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    exit_code(run(cli).await)
}
