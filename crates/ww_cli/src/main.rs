use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use ww_core::{Config, HttpFetcher};
use ww_inference::export_html;
use ww_publish::WordPressClient;
use ww_scrapers::{handle_command, HttpClient, Politeness, ScraperCommands};
use ww_storage::{create_storage, StorageKind};
use ww_web::AppState;

mod logging;

#[derive(Parser, Debug)]
#[command(name = "ww", author, version, about = "Wastewater news ingestion and blog drafting")]
struct Cli {
    #[arg(long, value_enum, default_value_t = StorageKind::default())]
    storage: StorageKind,
    /// SQLite url, e.g. sqlite:wastewatch.db
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(flatten)]
    Scraper(ScraperCommands),
    /// Draft blog posts for articles that have none yet
    Generate {
        #[arg(long, default_value_t = 5)]
        limit: usize,
        /// Prompt template overriding the configured one
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Send a stored blog post to WordPress as a draft
    Publish { id: i64 },
    /// Write a stored blog post as a standalone HTML page
    Export {
        id: i64,
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Check the WordPress credentials
    WpTest,
    /// Run the admin JSON API
    Serve {
        #[arg(long, env = "BIND_ADDR")]
        bind: Option<String>,
        /// Also start the interval scheduler
        #[arg(long)]
        scheduler: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();
    let cli = Cli::parse();

    let mut base = Config::from_env()?;
    if let Some(url) = cli.database_url {
        base.database_url = url;
    }

    let storage = create_storage(cli.storage, &base.database_url).await?;
    let fetcher: Arc<dyn HttpFetcher> = Arc::new(HttpClient::new()?);
    let state = Arc::new(AppState::new(base, storage, fetcher.clone(), Politeness::default()).await?);
    info!(
        storage = %cli.storage,
        demo_mode = state.generator.is_demo().await,
        "WasteWatch initialized"
    );

    match cli.command {
        Commands::Scraper(command) => {
            handle_command(command, &state.pipeline, &state.config, fetcher).await?;
        }
        Commands::Generate { limit, prompt } => {
            let created = state.generator.process_unprocessed(limit, prompt.as_deref()).await?;
            println!("Generated {} blog posts", created.len());
            for blog in created {
                println!("  #{} {}", blog.id, blog.headline);
            }
        }
        Commands::Publish { id } => {
            let mut blog = state
                .storage
                .blogs
                .get_blog(id)
                .await?
                .with_context(|| format!("blog post {} not found", id))?;
            let client = WordPressClient::from_config(&*state.config.read().await)?;
            if !client.is_configured() {
                bail!("WordPress is not configured. Set WORDPRESS_URL, WORDPRESS_USERNAME and WORDPRESS_APP_PASSWORD.");
            }
            let published = client.publish_as_draft(&*state.storage.blogs, &mut blog).await?;
            println!("{} {}", published.message, published.url);
        }
        Commands::Export { id, dir } => {
            let blog = state
                .storage
                .blogs
                .get_blog(id)
                .await?
                .with_context(|| format!("blog post {} not found", id))?;
            let dir = match dir {
                Some(dir) => dir,
                None => PathBuf::from(&state.config.read().await.export_dir),
            };
            let path = export_html(&blog, &dir).await?;
            println!("Exported {}", path.display());
        }
        Commands::WpTest => {
            let client = WordPressClient::from_config(&*state.config.read().await)?;
            let status = client.test_connection().await;
            if !status.success {
                bail!("{}", status.message);
            }
            println!("{}", status.message);
        }
        Commands::Serve { bind, scheduler } => {
            let bind = match bind {
                Some(bind) => bind,
                None => state.config.read().await.bind_addr.clone(),
            };
            if scheduler {
                state.scheduler.start().await;
            }
            ww_web::serve(state, &bind).await?;
        }
    }

    Ok(())
}
