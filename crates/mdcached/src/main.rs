//! mdcached - Markdown rendering daemon
//!
//! ## Commands
//!
//! - `serve`: render pages on request and accept GitHub push webhooks
//! - `build`: render every document under the content root once and exit

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{info, warn, Level};

use mdcache_core::{
    init_tracing, is_git_repo, DeployConfig, DeployTrigger, IndexStaleness, LogFormat,
    RenderPipeline, RestartSignal, SiteConfig, WebhookGate, DEFAULT_TRACKED_REF, METRICS,
};
use mdcached::{router, AppState};

#[derive(Parser)]
#[command(name = "mdcached")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Serve Markdown as cached HTML and redeploy from GitHub pushes", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to listen on
        #[arg(long, env = "MDCACHE_BIND", default_value = "127.0.0.1:3000")]
        bind: SocketAddr,

        #[command(flatten)]
        site: SiteArgs,

        /// Git working tree updated by deploys
        #[arg(long, env = "MDCACHE_REPO_DIR", default_value = ".")]
        repo_dir: PathBuf,

        /// Ref whose pushes trigger a deploy
        #[arg(long, env = "MDCACHE_TRACKED_REF", default_value = DEFAULT_TRACKED_REF)]
        tracked_ref: String,

        /// Shared webhook secret; the webhook route is disabled without it
        #[arg(long, env = "GITHUB_WEBHOOK_SECRET", hide_env_values = true)]
        webhook_secret: Option<String>,

        /// Exit status after a deploy-triggered shutdown
        #[arg(long, env = "MDCACHE_RESTART_EXIT_CODE", default_value_t = 0)]
        restart_exit_code: i32,
    },

    /// Render all documents and the post index, then exit
    Build {
        #[command(flatten)]
        site: SiteArgs,
    },
}

#[derive(Args)]
struct SiteArgs {
    /// Directory holding Markdown sources and cached HTML
    #[arg(long, env = "MDCACHE_ROOT", default_value = "public")]
    root: PathBuf,

    /// Page template with {{title}}, {{updated}} and {{content}} slots
    #[arg(long, env = "MDCACHE_TEMPLATE", default_value = "page.html")]
    template: PathBuf,

    /// When the post index is rebuilt
    #[arg(long, env = "MDCACHE_INDEX_STALENESS", default_value_t = IndexStaleness::default())]
    index_staleness: IndexStaleness,

    /// Allow concurrent regeneration of the same artifact
    #[arg(long)]
    no_regeneration_lock: bool,
}

impl SiteArgs {
    fn into_config(self) -> SiteConfig {
        let config =
            SiteConfig::new(self.root, self.template).with_index_staleness(self.index_staleness);
        if self.no_regeneration_lock {
            config.without_regeneration_lock()
        } else {
            config
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(LogFormat::from_json_flag(cli.json), level);

    match cli.command {
        Commands::Serve {
            bind,
            site,
            repo_dir,
            tracked_ref,
            webhook_secret,
            restart_exit_code,
        } => {
            let deploy = DeployConfig {
                repo_dir,
                tracked_ref,
            };
            let restarted = cmd_serve(bind, site.into_config(), deploy, webhook_secret).await?;
            METRICS.flush();
            if restarted {
                info!(exit_code = restart_exit_code, "exiting for restart");
                std::process::exit(restart_exit_code);
            }
            Ok(())
        }
        Commands::Build { site } => cmd_build(site.into_config()).await,
    }
}

/// Serve until ctrl-c or a deploy requests a restart. Returns whether a restart was requested.
async fn cmd_serve(
    bind: SocketAddr,
    site: SiteConfig,
    deploy: DeployConfig,
    webhook_secret: Option<String>,
) -> Result<bool> {
    let restart = RestartSignal::new();
    let mut state = AppState::new(RenderPipeline::new(site.clone()), restart.clone());

    match webhook_secret.filter(|s| !s.is_empty()) {
        Some(secret) => {
            if !is_git_repo(&deploy.repo_dir).await {
                warn!(
                    repo_dir = %deploy.repo_dir.display(),
                    "repo dir is not a git work tree; deploys will fail"
                );
            }
            let trigger = DeployTrigger::from_config(&deploy);
            info!(tracked_ref = %trigger.tracked_ref(), "webhook deploys enabled");
            state = state.with_webhook(WebhookGate::new(secret), trigger);
        }
        None => info!("GITHUB_WEBHOOK_SECRET not set; webhook route disabled"),
    }

    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    info!(
        addr = %listener.local_addr()?,
        root = %site.content_root.display(),
        template = %site.template_path.display(),
        "mdcached listening"
    );

    let shutdown = {
        let restart = restart.clone();
        async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("ctrl-c received, shutting down"),
                _ = restart.requested() => info!("restart requested, draining connections"),
            }
        }
    };

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;

    Ok(restart.is_requested())
}

async fn cmd_build(site: SiteConfig) -> Result<()> {
    let root = site.content_root.clone();
    let report = RenderPipeline::new(site)
        .build_all()
        .await
        .with_context(|| format!("Failed to build {}", root.display()))?;

    println!(
        "Built {} documents under {}: {} created, {} regenerated, {} fresh",
        report.total(),
        root.display(),
        report.created,
        report.regenerated,
        report.fresh
    );
    METRICS.flush();
    Ok(())
}
