use std::path::PathBuf;

use clap::Parser;
use econoviz_lib::{config::Config, db};

/// Print every catalog metric with its stored observation coverage
#[derive(Debug, Parser)]
#[command(name = "inspect_db", version)]
struct Args {
    /// Directory holding econoviz.db (defaults to DATA_DIR)
    #[arg(long = "data-dir", value_name = "DIR")]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    econoviz_lib::init_tracing();
    let args = Args::parse();

    let mut config = Config::load()?;
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }

    let db_path = config.database_path();
    println!("Connecting to: {:?}", db_path);

    if !db_path.exists() {
        println!("DB not found!");
        return Ok(());
    }

    let pool = db::init(&config).await?;
    let rows = db::metric_coverage(&pool).await?;
    let info = db::dashboard_info(&pool).await?;

    println!(
        "{:<30} | {:<15} | {:<6} | {:<8} | {:<9} | {:<6} | {:<6}",
        "Metric", "Industry", "Kind", "Count", "Countries", "Start", "End"
    );
    println!("{}", "-".repeat(100));

    for row in rows {
        let industry = if row.industry.is_empty() { "(general)" } else { row.industry.as_str() };
        println!(
            "{:<30} | {:<15} | {:<6} | {:<8} | {:<9} | {:<6} | {:<6}",
            row.name,
            industry,
            row.kind.to_string(),
            row.observations,
            row.countries,
            row.first_year.map_or_else(|| "N/A".to_string(), |y| y.to_string()),
            row.last_year.map_or_else(|| "N/A".to_string(), |y| y.to_string()),
        );
    }

    println!("{}", "-".repeat(100));
    println!(
        "{} industries, {} live / {} manual metrics, {} observations",
        info.total_industries, info.live_metrics, info.manual_metrics, info.total_metric_data
    );

    pool.close().await;
    Ok(())
}
