//! Synchronize a workspace's modules and their transitive dependencies.
//!
//! Reads the module request list and the configured source indexes,
//! aggregates the sources, and drives the recursive resolver with a git
//! synchronizer. Fatal conditions (missing module, version conflict,
//! synchronization failure) terminate with a non-zero status.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

use modsync::config;
use modsync::logging::init_logging;
use modsync::manifest::ManifestStore;
use modsync::registry::AggregatedIndex;
use modsync::resolver::DependencyResolver;
use modsync::sync::GitSynchronizer;

#[derive(Parser)]
#[command(
    name = "sync-modules",
    about = "Fetch modules and their dependencies from configured source indexes"
)]
struct Args {
    /// Path or URL of the module request list (modules.yaml)
    #[arg(short, long, default_value = "Modules/modules.yaml")]
    config: String,

    /// Path or URL of the source index list (sources.yaml)
    #[arg(short, long, default_value = "Modules/sources.yaml")]
    sources: String,

    /// Directory module repositories are synchronized into
    #[arg(short, long, default_value = "Modules")]
    directory: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(None);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let Some(run_config) = config::load_run_config(&args.config, &args.sources, &args.directory)?
    else {
        // Starter files were just created; the user edits them and re-runs.
        return Ok(());
    };
    if run_config.modules.modules.is_empty() {
        anyhow::bail!("no modules configured in {}", args.config);
    }

    let index = AggregatedIndex::load(&run_config.sources.sources);
    let store = ManifestStore::new(&args.directory);
    let git = GitSynchronizer::new(&args.directory);
    let resolver = DependencyResolver::new(&index, &store, &git);

    let resolved = resolver.resolve(&run_config.modules.modules)?;
    for module in &resolved {
        println!("{}", module.identifier);
    }
    info!("all modules and their dependencies processed");
    Ok(())
}
