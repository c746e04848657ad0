use clap::{Parser, Subcommand};
use setlist_harvester::apis::setlist_fm::SetlistFmClient;
use setlist_harvester::config::{output_paths, FileConfig, HarvestConfig};
use setlist_harvester::constants::ENV_USERNAME;
use setlist_harvester::logging;
use setlist_harvester::pipeline::{rebuild_views, Harvester};
use setlist_harvester::storage::HarvestStore;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "fetch-setlists")]
#[command(about = "Harvest attended setlists from setlist.fm into the site data directory")]
#[command(version)]
struct Cli {
    /// Optional TOML settings file (non-secret settings only)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output directory, overriding SETLISTFM_OUT_DIR and the config file
    #[arg(long, global = true)]
    out_dir: Option<PathBuf>,

    /// Directory for the rotating JSON log file
    #[arg(long, global = true, default_value = "logs")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch new and changed setlists, then update index, details, views and rollup
    Harvest {
        /// Fetch every page and rewrite every detail file
        #[arg(long)]
        full_rescan: bool,
    },
    /// Recompute views and rollup from the stored index without network access
    RebuildViews,
}

fn load_file_config(path: Option<&PathBuf>) -> anyhow::Result<FileConfig> {
    Ok(match path {
        Some(p) => FileConfig::load(p)?,
        None => FileConfig::default(),
    })
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let file = load_file_config(cli.config.as_ref())?;

    match cli.command.unwrap_or(Commands::Harvest { full_rescan: false }) {
        Commands::Harvest { full_rescan } => {
            let mut config = HarvestConfig::from_env(file)?;
            if let Some(dir) = cli.out_dir {
                config = config.with_out_dir(dir);
            }
            config.full_rescan |= full_rescan;
            info!(?config, "Starting harvest");

            let client = SetlistFmClient::new(&config)?;
            let store = HarvestStore::new(config.output.clone());
            let harvester = Harvester::new(client, store, &config);
            let report = harvester.run().await?;

            println!("📊 Harvest results for {}:", config.username);
            println!("   Pages fetched: {}", report.pages_fetched);
            println!("   Records harvested: {}", report.records_harvested);
            println!("   Index items: {}", report.index_items);
            println!(
                "   Details written: {} (refreshed {}, skipped {})",
                report.details_written, report.details_refreshed, report.details_skipped
            );
            println!("   Index changed: {}", report.index_written);
            println!("   Views changed: {}", report.views_written);
        }
        Commands::RebuildViews => {
            let mut paths = output_paths(&file, |key| std::env::var(key).ok());
            if let Some(dir) = cli.out_dir {
                paths = paths.rebased(dir);
            }
            let username = std::env::var(ENV_USERNAME).unwrap_or_default();
            let store = HarvestStore::new(paths);
            let changed = rebuild_views(&store, &username, chrono::Utc::now())?;
            println!("✅ Views rebuilt (changed: {})", changed);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load environment variables
    dotenv::dotenv().ok();

    let guard = logging::init_logging(&cli.log_dir);

    let result = run(cli).await;
    if let Err(e) = &result {
        error!("❌ Harvest failed: {:#}", e);
    }
    // Flush the file log before the process exits
    drop(guard);
    result
}
