mod cache;
mod fetch;
mod remote;
mod scrape;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use shopcat_cache::{cache_key, SnapshotCache};
use tracing_subscriber::EnvFilter;

use crate::remote::ServerClient;

#[derive(Debug, Parser)]
#[command(name = "shopcat-cli")]
#[command(about = "Shopify storefront catalog scraper")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Base URL of the shopcat server.
    #[arg(
        long,
        global = true,
        env = "SHOPCAT_SERVER_URL",
        default_value = "http://127.0.0.1:3000"
    )]
    server: String,

    /// Directory holding the local snapshot cache.
    #[arg(
        long,
        global = true,
        env = "SHOPCAT_CACHE_DIR",
        default_value = ".shopcat-cache"
    )]
    cache_dir: PathBuf,

    /// `shopcat_session` cookie value; omit to run anonymously.
    #[arg(long, global = true, env = "SHOPCAT_SESSION", hide_env_values = true)]
    session: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Stream a scrape from the server and merge it into the local cache.
    Scrape {
        shop_url: String,
        /// Ignore the server's saved catalog and scrape upstream.
        #[arg(long)]
        force: bool,
    },
    /// Scrape a storefront directly, without the server.
    Fetch {
        shop_url: String,
        /// Stop after this many product pages.
        #[arg(long)]
        max_pages: Option<u32>,
        /// Print the catalog as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },
    /// Sign in and print a session value for `SHOPCAT_SESSION`.
    Login {
        email: String,
        #[arg(long, env = "SHOPCAT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Inspect or clear the local snapshot cache.
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Debug, Subcommand)]
enum CacheCommands {
    Show {
        /// Email whose snapshot to use; defaults to the anonymous snapshot.
        #[arg(long)]
        user: Option<String>,
    },
    Clear {
        #[arg(long)]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let global = cli.global;
    match cli.command {
        Some(Commands::Scrape { shop_url, force }) => {
            let server = ServerClient::new(&global.server, global.session)?;
            let cache = SnapshotCache::open(&global.cache_dir);
            let summary =
                scrape::run_scrape(&server, &cache, &shop_url, force, |m| eprintln!("{m}"))
                    .await?;
            println!("{}", scrape::render_summary(&summary));
        }
        Some(Commands::Fetch {
            shop_url,
            max_pages,
            json,
        }) => {
            let catalog = fetch::run_fetch(&shop_url, max_pages).await?;
            if json {
                fetch::write_json(&catalog)?;
            } else {
                println!("{}", fetch::render_catalog(&catalog));
            }
        }
        Some(Commands::Login { email, password }) => {
            let server = ServerClient::new(&global.server, None)?;
            let session = server.login(&email, &password).await?;
            println!("{session}");
        }
        Some(Commands::Cache { command }) => {
            let cache = SnapshotCache::open(&global.cache_dir);
            match command {
                CacheCommands::Show { user } => {
                    println!("{}", cache::show(&cache, &cache_key(user.as_deref())));
                }
                CacheCommands::Clear { user } => {
                    let key = cache_key(user.as_deref());
                    cache::clear(&cache, &key);
                    println!("cleared cached snapshot for {key}");
                }
            }
        }
        None => println!("shopcat-cli: run with --help for commands"),
    }

    Ok(())
}
