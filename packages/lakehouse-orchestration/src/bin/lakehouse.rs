//! lakehouse - operator CLI for the lake pipeline
//!
//! ```text
//! lakehouse full
//! lakehouse subset organization.csv project.csv
//! lakehouse watch [--force] [--once] [--interval 15]
//! lakehouse index
//! lakehouse plan
//! ```

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use lakehouse_etl::config::SearchBackend;
use lakehouse_etl::{BronzeTransformer, GoldBuilder, LakeConfig};
use lakehouse_orchestration::{
    BronzeWatcher, CycleOutcome, IndexStage, JsonFileMtimeStore, Orchestrator, RunSummary,
};
use lakehouse_store::search::{
    Embedder, HttpEmbedder, PgVectorSink, ProjectIndexer, SearchSink, TypesenseSink,
};
use lakehouse_store::GoldSynchronizer;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lakehouse", version, about = "Bronze → silver → gold lake pipeline")]
struct Cli {
    /// YAML config file (environment variables override it)
    #[arg(long, env = "LAKE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild silver and gold, sync every gold table, then refresh search
    Full,
    /// Rebuild only what the given raw files affect
    Subset {
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Poll the bronze directory and run subsets on change
    Watch {
        /// Treat every present file as changed on the first cycle
        #[arg(long)]
        force: bool,
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
        /// Seconds between polls (defaults to the configured interval)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Embed new or changed projects into the search index
    Index,
    /// Print the gold execution plan
    Plan,
}

struct Lake {
    config: LakeConfig,
    gold: Arc<GoldBuilder>,
    silver: Arc<BronzeTransformer>,
    store: Option<Arc<GoldSynchronizer>>,
}

impl Lake {
    async fn open(config: LakeConfig) -> anyhow::Result<Self> {
        config.ensure_dirs()?;
        let paths = &config.paths;
        let silver = Arc::new(BronzeTransformer::new(paths.bronze_dir(), paths.silver_dir()));
        let gold = Arc::new(
            GoldBuilder::new(paths.silver_dir(), paths.gold_dir())?.with_keys(config.surrogate_keys),
        );
        let store = match &config.store {
            Some(store) => Some(Arc::new(
                GoldSynchronizer::connect(store, paths.gold_dir()).await?,
            )),
            None => None,
        };
        Ok(Self {
            config,
            gold,
            silver,
            store,
        })
    }

    fn orchestrator(&self) -> Orchestrator {
        let orchestrator = Orchestrator::new(self.silver.clone(), self.gold.clone());
        match &self.store {
            Some(store) => orchestrator.with_store(store.clone()),
            None => orchestrator,
        }
    }

    fn indexer(&self) -> anyhow::Result<ProjectIndexer> {
        let embed = self.config.require_embed()?;
        let embedder: Arc<dyn Embedder> = Arc::new(HttpEmbedder::new(embed)?);
        let sink: Arc<dyn SearchSink> = match self.config.search.backend {
            SearchBackend::Pgvector => {
                let store = self
                    .store
                    .as_ref()
                    .context("pgvector search needs SUPABASE_DB_URL")?;
                Arc::new(PgVectorSink::new(
                    store.pool().clone(),
                    self.config.search.table.clone(),
                    embed.dims,
                ))
            }
            SearchBackend::Typesense => Arc::new(TypesenseSink::new(
                self.config.require_typesense()?,
                embed.dims,
            )?),
        };
        Ok(ProjectIndexer::new(self.config.paths.gold_dir(), embedder, sink)
            .with_batch_size(embed.batch_size))
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn finish(summary: &RunSummary) -> anyhow::Result<()> {
    print_json(summary)?;
    if !summary.ok {
        bail!(summary
            .error
            .clone()
            .unwrap_or_else(|| "run failed".to_string()));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = LakeConfig::load(cli.config.as_deref()).context("loading lake configuration")?;

    if let Command::Plan = cli.command {
        let gold = GoldBuilder::new(config.paths.silver_dir(), config.paths.gold_dir())?;
        println!("{}", gold.dag().execution_plan());
        return Ok(());
    }

    let lake = Lake::open(config).await?;
    match cli.command {
        Command::Full => {
            let indexer = if lake.config.embed.is_some() {
                Some(lake.indexer()?)
            } else {
                None
            };
            let refresh = lake
                .orchestrator()
                .run_full_then_index(indexer.as_ref().map(|i| i as &dyn IndexStage))
                .await?;
            print_json(&refresh)?;
            if !refresh.summary.ok {
                bail!(refresh
                    .summary
                    .error
                    .unwrap_or_else(|| "run failed".to_string()));
            }
            Ok(())
        }
        Command::Subset { files } => finish(&lake.orchestrator().run_subset(&files).await?),
        Command::Index => print_json(&lake.indexer()?.index().await?),
        Command::Watch {
            force,
            once,
            interval,
        } => {
            let interval = interval.unwrap_or(lake.config.poke_interval_secs);
            let state = Arc::new(JsonFileMtimeStore::new(lake.config.paths.mtimes_path()));
            let mut watcher =
                BronzeWatcher::new(Arc::new(lake.orchestrator()), state, lake.config.paths.bronze_dir())
                    .with_interval(Duration::from_secs(interval.max(1)));
            if lake.config.embed.is_some() {
                watcher = watcher.with_indexer(Arc::new(lake.indexer()?));
            }

            if once {
                let outcome = watcher.run_cycle(force).await?;
                print_json(&outcome)?;
                if let CycleOutcome::Ran { summary, .. } = &outcome {
                    if !summary.ok {
                        bail!("sensor cycle reported failure");
                    }
                }
                return Ok(());
            }

            watcher
                .watch(force, async {
                    if tokio::signal::ctrl_c().await.is_err() {
                        std::future::pending::<()>().await;
                    }
                })
                .await?;
            info!("[sensor] stopped");
            Ok(())
        }
        Command::Plan => Ok(()),
    }
}
