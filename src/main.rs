use anyhow::Context;
use clap::{Parser, Subcommand};
use showtime_scraper::browser::ChromiumLauncher;
use showtime_scraper::config::{ist_date_code, validate_date_code, Config};
use showtime_scraper::fetch::HttpShowtimeFetcher;
use showtime_scraper::pipeline::{load_venues, Pipeline};
use showtime_scraper::retrieval::{RetrievalEngine, RetrievalSettings};
use showtime_scraper::shards::{cleanup_shards, combine_detailed};
use showtime_scraper::sink::JsonFileSink;
use showtime_scraper::{logging, metrics};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "showtime_scraper")]
#[command(about = "Showtime and seat-occupancy scraper")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every venue (direct, retry, browser) and write the shard outputs
    Run {
        /// Venue list JSON keyed by venue code
        #[arg(long, default_value = "venues1.json")]
        venues: PathBuf,
        #[arg(long, default_value = "config.toml")]
        config: PathBuf,
        /// Overrides output.shard_id
        #[arg(long)]
        shard: Option<u32>,
        /// Target date as YYYYMMDD (defaults to tomorrow, IST)
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        output_root: Option<PathBuf>,
    },
    /// Concatenate detailed shard files of one date into finaldetailed.json
    Combine {
        /// Date directory to combine (defaults to tomorrow, IST)
        #[arg(long)]
        date: Option<String>,
        #[arg(long, default_value = "advance/data")]
        base_dir: PathBuf,
    },
    /// Delete shard files from N days ago through yesterday (IST)
    Cleanup {
        #[arg(long, default_value_t = 5)]
        days_back: i64,
        /// Base directories holding date folders (comma-separated)
        #[arg(long, default_value = "advance/data,daily/data", value_delimiter = ',')]
        base_paths: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = logging::init_logging();
    metrics::init_metrics();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { venues, config, shard, date, output_root } => {
            let mut config = Config::load_from(&config)?;
            if let Some(shard) = shard {
                config.output.shard_id = shard;
            }
            if let Some(date) = date {
                config.fetch.target_date_code = Some(date);
            }
            if let Some(root) = output_root {
                config.output.output_root = root;
            }
            config.validate()?;

            let target_date = config.target_date_code();
            let venues = load_venues(&venues)
                .with_context(|| format!("loading venues from {}", venues.display()))?;
            info!(shard = config.output.shard_id, date = %target_date, "Starting run over {} venues", venues.len());

            let launcher = Arc::new(ChromiumLauncher::new(config.fetch.chrome_executable.clone()));
            let fetcher = HttpShowtimeFetcher::new(&config.fetch, &target_date, launcher);
            let mut engine = RetrievalEngine::new(fetcher, RetrievalSettings::from_config(&config));
            let mut sink = JsonFileSink::new(&config.output.output_root, &target_date, config.output.shard_id)?;

            let result = Pipeline::run(&mut engine, &venues, &target_date, &mut sink).await?;
            let report = &result.report;

            println!("\n🎯 FINAL STATUS");
            println!("   Total venues   : {}", report.total);
            println!("   Recovered data : {}", report.recovered());
            println!("     via retry    : {}", report.recovered_retry);
            println!("     via browser  : {}", report.recovered_browser);
            println!("   Still empty    : {}", report.still_empty.len());
            println!("   Movies         : {}", result.aggregation.summary.len());
            println!("   Shows          : {}", result.aggregation.detailed.len());
            println!("   Output         : {}", sink.detailed_path().display());
            if !report.still_empty.is_empty() {
                warn!("{} venues unrecovered: {:?}", report.still_empty.len(), report.still_empty);
            }
        }
        Commands::Combine { date, base_dir } => {
            let date = date.unwrap_or_else(|| ist_date_code(1));
            validate_date_code(&date)?;
            let (output, count) = combine_detailed(&base_dir.join(&date))?;
            println!("🎉 {} records written to {}", count, output.display());
        }
        Commands::Cleanup { days_back, base_paths } => {
            let start = ist_date_code(-days_back);
            let end = ist_date_code(-1);
            println!("🗓 Cleaning shard files from {} → {} (IST)", start, end);
            let removed = cleanup_shards(&base_paths, &start, &end)?;
            println!("✅ Cleanup complete. Files removed: {}", removed);
        }
    }
    Ok(())
}
