use clap::{Parser, Subcommand};
use lexsync_core::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "lexsync")]
#[command(about = "Vocabulary card reconciliation for class documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory (registry location)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile a class document against the shared registry
    Sync {
        /// Path to the class document (JSON)
        class_file: PathBuf,

        /// Override the registry file path
        #[arg(long)]
        registry: Option<PathBuf>,

        /// Simulate provisioning without calling the card service
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate a class document without syncing
    Check {
        /// Path to the class document (JSON)
        class_file: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    lexsync_core::logging::init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(dir) = cli.data_dir {
        config.data.data_dir = dir;
    }

    match cli.command {
        Commands::Sync {
            class_file,
            registry,
            dry_run,
        } => cmd_sync(class_file, registry, dry_run, &config),
        Commands::Check { class_file } => cmd_check(&class_file),
    }
}

fn cmd_sync(
    class_file: PathBuf,
    registry_override: Option<PathBuf>,
    dry_run: bool,
    config: &Config,
) -> Result<()> {
    let registry_path = registry_override.unwrap_or_else(|| config.registry_path());

    let mut class = ClassDocument::load(&class_file)?;
    let mut registry = Registry::load_or_bootstrap(&registry_path)?;

    let opts = ReconcileOptions {
        deck_name: class_deck_name(&class.class),
        parent_deck_id: config.cards.master_deck_id.clone(),
    };
    let mut checkpoint = FileCheckpoint::new(&class_file, &registry_path);

    let outcome = if dry_run || config.dry_run {
        println!("[Dry run - no cards will be created]");
        reconcile_class(
            &mut class,
            &mut registry,
            &SimulatedBackend,
            &mut checkpoint,
            &opts,
        )?
    } else {
        let backend = HttpBackend::new(&config.api, &config.cards)?;
        reconcile_class(&mut class, &mut registry, &backend, &mut checkpoint, &opts)?
    };

    println!("✓ Synced class '{}'", class.class);
    println!("  Created: {}", outcome.created);
    println!("  Skipped: {}", outcome.skipped.len());
    for chunk in &outcome.skipped {
        tracing::debug!("Skipped '{}' (already registered)", chunk);
    }
    println!("  Registry: {}", registry_path.display());

    Ok(())
}

fn cmd_check(class_file: &Path) -> Result<()> {
    let doc = ClassDocument::load(class_file)?;
    println!(
        "✓ Class '{}' OK ({} entries)",
        doc.class,
        doc.entries.len()
    );
    Ok(())
}
