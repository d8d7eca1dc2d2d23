//! # Software Center index CLI (`sc-index`)
//!
//! Builds and inspects the application catalog index.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sc-index rebuild` | Rebuild the index from every configured source |
//! | `sc-index sources` | List configured sources and whether they are reachable |
//! | `sc-index search "<query>"` | Search the live index |
//! | `sc-index show <pkgname>` | Print the documents indexed for a package |
//! | `sc-index info` | Print batch metadata and counts |
//!
//! ## Examples
//!
//! ```bash
//! sc-index --config ./config/sc-index.toml rebuild
//! sc-index rebuild --dry-run --progress json
//! sc-index search "image editor" --category Graphics
//! sc-index show gimp --json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use software_center_index::config;
use software_center_index::logging;
use software_center_index::progress::ProgressMode;
use software_center_index::{info, rebuild, search, show, sources};

/// Builds the application catalog index for a software center.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Without one, only `--index` is needed and no sources are read.
#[derive(Parser)]
#[command(name = "sc-index", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/sc-index.toml")]
    config: PathBuf,

    /// Index directory; overrides `index.path` from the config file.
    #[arg(long, global = true)]
    index: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProgressArg {
    Off,
    Human,
    Json,
}

impl From<ProgressArg> for ProgressMode {
    fn from(arg: ProgressArg) -> Self {
        match arg {
            ProgressArg::Off => ProgressMode::Off,
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the index from scratch.
    ///
    /// Reads every configured source, builds the new index next to the live
    /// one and swaps it into place on success. On failure the live index is
    /// left as it was.
    Rebuild {
        /// Count documents without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Progress on stderr. Defaults to human on a terminal, off otherwise.
        #[arg(long, value_enum)]
        progress: Option<ProgressArg>,
    },

    /// List configured sources and their status.
    Sources,

    /// Search the live index.
    Search {
        /// Free text. Empty lists applications by popularity.
        #[arg(default_value = "")]
        query: String,

        /// Only applications in this desktop category.
        #[arg(long)]
        category: Option<String>,

        /// Only applications in this archive channel.
        #[arg(long)]
        channel: Option<String>,

        /// Maximum number of results to return.
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Print the documents indexed for a package.
    Show {
        pkgname: String,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Print batch metadata and index statistics.
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = match (config::load_config(&cli.config), &cli.index) {
        (Ok(cfg), _) => cfg,
        // No config file: run on a bare index path.
        (Err(_), Some(index)) if !cli.config.exists() => config::Config::minimal(index.clone()),
        (Err(e), _) => return Err(e),
    };
    if let Some(index) = cli.index {
        cfg.index.path = index;
    }

    logging::init_logging(&cfg.logging);

    match cli.command {
        Commands::Rebuild { dry_run, progress } => {
            let mode = progress
                .map(ProgressMode::from)
                .unwrap_or_else(ProgressMode::default_for_tty);
            rebuild::run_rebuild(&cfg, mode, dry_run).await?;
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Search {
            query,
            category,
            channel,
            limit,
        } => {
            let query = search::SearchQuery {
                text: query,
                category,
                channel,
                pkgname: None,
                limit,
            };
            search::run_search(&cfg, &query).await?;
        }
        Commands::Show { pkgname, json } => {
            show::run_show(&cfg, &pkgname, json).await?;
        }
        Commands::Info => {
            info::run_info(&cfg).await?;
        }
    }

    Ok(())
}
