//! Query Solr by one field, and optionally delete the hits.

use std::process::ExitCode;

use clap::Parser;
use dotenv::dotenv;
use solr_indexer::cli::{exit_code, ConfigArgs};
use solr_indexer::config::connect_index;
use solr_indexer::logging::init_tracing;
use solr_indexer::{IndexingError, IngestError};
use solr_indexer_shared::types::search_query::DEFAULT_ROWS;
use solr_indexer_shared::FieldQuery;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "searchindex", about = "Search the Solr index", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    /// Search string, FIELD:VALUE
    #[arg(short = 's', long = "search", value_name = "FIELD:VALUE")]
    search: String,

    /// Delete every document found
    #[arg(short = 'd', long = "delete")]
    delete: bool,

    /// Maximum number of documents returned
    #[arg(long = "rows", default_value_t = DEFAULT_ROWS)]
    rows: usize,
}

async fn run(cli: Cli) -> Result<bool, IndexingError> {
    let query = cli
        .search
        .parse::<FieldQuery>()
        .map_err(|e| IndexingError::config(e.to_string()))?
        .with_rows(cli.rows);
    let config = cli.config.load()?;
    let index = connect_index(&config).await?;

    let response = index.search(&query).await.map_err(IngestError::from)?;
    info!(query = %query.to_query_string(), num_found = response.num_found, "Search finished");
    for id in response.ids() {
        info!(id = %id, "Found");
    }
    if !cli.delete {
        return Ok(true);
    }

    let mut ok = true;
    for id in response.ids() {
        match index.delete(id).await {
            Ok(()) => info!(id = %id, "Deleted"),
            Err(e) => {
                warn!(id = %id, error = %e, "Delete failed");
                ok = false;
            }
        }
    }
    if config.always_commit {
        index.commit().await.map_err(IngestError::from)?;
        info!("Committed index");
    }
    Ok(ok)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = init_tracing("searchindex") {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    exit_code(run(cli).await)
}
