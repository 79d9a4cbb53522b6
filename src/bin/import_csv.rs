use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use econoviz_lib::{config::Config, core::importer, db};

/// Import manual metric observations from a CSV file into the local database
#[derive(Debug, Parser)]
#[command(name = "import_csv", version)]
struct Args {
    /// CSV file with header metricName,industry,country,year,value
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Directory holding econoviz.db (defaults to DATA_DIR)
    #[arg(long = "data-dir", value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    econoviz_lib::init_tracing();
    let args = Args::parse();

    let mut config = Config::load()?;
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }

    let rows = importer::read_rows_from_path(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;

    let pool = db::init(&config).await?;
    let summary = importer::import_rows(&pool, &rows).await;
    pool.close().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("File:      {}", args.file.display());
    println!("Processed: {}", summary.processed);
    println!("Inserted:  {}", summary.inserted);
    println!("Skipped:   {}", summary.skipped);
    for err in &summary.errors {
        println!("  row {:<6} {}", err.row, err.reason);
    }

    Ok(())
}
