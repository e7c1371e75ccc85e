use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(
    name = "partscout",
    version,
    about = "Search auto parts offers across several suppliers",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Search offers by article code
    Search {
        /// Article code, in any format
        article: String,

        /// Brand to narrow the search
        #[arg(short, long)]
        brand: Option<String>,

        /// Availability filter (in_stock, on_order)
        #[arg(short, long)]
        filter: Option<String>,

        /// Sort order (price_asc, price_desc, delivery_asc)
        #[arg(short, long)]
        sort: Option<String>,

        /// Markup percent applied to prices
        #[arg(short, long, default_value = "0")]
        markup: f64,

        /// TOML configuration file (environment is used otherwise)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print offers as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Run the HTTP search API
    Serve {
        /// Bind address, overrides configuration
        #[arg(long)]
        bind: Option<String>,

        /// TOML configuration file (environment is used otherwise)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Remove entries from the on-disk offer cache
    CacheClear {
        /// Only remove expired entries
        #[arg(long, default_value = "false")]
        expired_only: bool,

        /// TOML configuration file (environment is used otherwise)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    match cli.command {
        Commands::Search {
            article,
            brand,
            filter,
            sort,
            markup,
            config,
            json,
        } => {
            commands::search(commands::SearchParams {
                article,
                brand,
                filter,
                sort,
                markup,
                config,
                json,
            })
            .await?;
        }
        Commands::Serve { bind, config } => {
            commands::serve(bind, config).await?;
        }
        Commands::CacheClear {
            expired_only,
            config,
        } => {
            commands::cache_clear(expired_only, config).await?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("partscout=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("partscout=info,warn"))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
