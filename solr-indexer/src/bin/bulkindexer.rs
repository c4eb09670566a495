//! Index large sets of MMD records into Solr with a pool of workers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Parser};
use dotenv::dotenv;
use solr_indexer::cli::{exit_code, ConfigArgs, ThumbnailArgs};
use solr_indexer::logging::init_tracing;
use solr_indexer::summary::ExitPolicy;
use solr_indexer::{Dependencies, IndexingError, RecordSource};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "bulkindexer", about = "Bulk index MMD records into Solr", long_about = None)]
#[command(group(ArgGroup::new("input").required(true).args(["list_file", "directory"])))]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    /// Index the MMD files listed in a file, one path per line
    #[arg(short = 'l', long = "list-file", value_name = "LISTFILE")]
    list_file: Option<PathBuf>,

    /// Index the MMD files of a directory tree
    #[arg(short = 'd', long = "directory", value_name = "DIR")]
    directory: Option<PathBuf>,

    #[command(flatten)]
    thumbnails: ThumbnailArgs,
}

async fn run(cli: Cli) -> Result<bool, IndexingError> {
    let config = cli.config.load()?;
    let source = match (&cli.list_file, &cli.directory) {
        (Some(path), _) => RecordSource::list_file(path),
        (None, Some(path)) => RecordSource::directory(path, true),
        (None, None) => return Err(IndexingError::config("no input given")),
    };

    let deps = Dependencies::new(
        &config,
        cli.thumbnails.build_options(&config),
        cli.thumbnails.enabled(),
        Dependencies::pool_config(&config),
    )
    .await?;

    let report = deps.coordinator.run(&source).await?;
    info!(
        run_id = %report.run_id,
        state = %report.state,
        summary = %report.summary,
        elapsed_secs = report.elapsed.as_secs(),
        "Done"
    );
    Ok(report.is_success(&ExitPolicy::new(config.max_failure_percent)))
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = init_tracing("bulkindexer") {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    exit_code(run(cli).await)
}
