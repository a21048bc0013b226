use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fedidir_artifacts::{ArtifactKind, FsSnapshotStore};
use fedidir_core::MetaSummary;
use fedidir_runner::{Config, Pipeline};

#[derive(Parser)]
#[command(name = "fedidir", version)]
struct Cli {
    /// Config file; relative paths inside it resolve against its directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config (refuses to overwrite an existing one)
    Init,

    /// Check the crawl store and output directory
    Doctor,

    /// Build and publish one snapshot
    Run {
        /// Read and filter everything but publish nothing
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the currently published snapshot
    Status,
}

fn load(path: &Path) -> anyhow::Result<(PathBuf, Config)> {
    let cfg = Config::load_from(path)?.with_env_overrides()?;
    let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok((base, cfg))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;
    let config_path = match cli.config {
        Some(p) if p.is_absolute() => p,
        Some(p) => cwd.join(p),
        None => Config::default_path(&cwd),
    };

    match cli.cmd {
        Command::Init => {
            if config_path.exists() {
                return Err(anyhow!("{} already exists", config_path.display()));
            }
            Config::default_for_dir().save_to(&config_path)?;
            println!("Wrote {}", config_path.display());
        }
        Command::Doctor => {
            let (base, cfg) = load(&config_path)?;
            fedidir_runner::doctor(&base, &cfg)?;
            println!("OK");
        }
        Command::Run { dry_run } => {
            let (base, cfg) = load(&config_path)?;
            let summary = Pipeline::open(&base, &cfg)?.run_once(dry_run)?;
            println!("Run {}{}", summary.run_id, if dry_run { " (dry run)" } else { "" });
            println!(
                "Instances: {} kept of {} ({} stale, {} failed, {} untimed, {} blank)",
                summary.instances.kept,
                summary.instances.input,
                summary.instances.stale,
                summary.instances.failed_after_crawl,
                summary.instances.missing_time,
                summary.instances.blank,
            );
            println!(
                "Communities: {} kept of {} ({} stale, {} failed, {} untimed, {} blank)",
                summary.communities.kept,
                summary.communities.input,
                summary.communities.stale,
                summary.communities.failed_after_crawl,
                summary.communities.missing_time,
                summary.communities.blank,
            );
            println!("Fediverse servers: {}", summary.fediverse);
            if summary.rejected_keys > 0 {
                println!("Skipped keys: {}", summary.rejected_keys);
            }
            if let Some(manifest) = summary.manifest {
                println!("Published {} artifacts ({:?})", manifest.artifacts.len(), manifest.mode);
            }
        }
        Command::Status => {
            let (base, cfg) = load(&config_path)?;
            let store = FsSnapshotStore::new(cfg.output_dir(&base), cfg.output.publish);
            let meta_path = store.artifact_path(ArtifactKind::Meta);
            if !meta_path.exists() {
                println!("No snapshot published in {}", store.root.display());
                return Ok(());
            }
            let bytes = std::fs::read(&meta_path)
                .with_context(|| format!("read {}", meta_path.display()))?;
            let meta: MetaSummary = serde_json::from_slice(&bytes)?;
            println!("Instances: {}", meta.instances);
            println!("Communities: {}", meta.communities);
            println!("Fediverse servers: {}", meta.fediverse);
            println!("Generated at: {} (unix ms)", meta.time);
            if let Some(manifest) = store.read_manifest()? {
                println!("Last run: {} ({:?})", manifest.run_id, manifest.mode);
                for a in manifest.artifacts {
                    println!("- {} {} bytes sha256:{}", a.name, a.bytes, a.sha256);
                }
            }
        }
    }

    Ok(())
}
