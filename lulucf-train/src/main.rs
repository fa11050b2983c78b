//! Point d'entrée CLI pour lulucf-train

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

// Charger .env au démarrage
fn load_env() {
    // Chercher .env dans le répertoire courant ou parent
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::{Commands, RunArgs};
use lulucf_train::RunStatus;

/// Produire les polygones d'entraînement LULUCF et leur échantillon de contrôle
#[derive(Parser)]
#[command(name = "lulucf-train")]
#[command(author, version)]
#[command(about = "Produire les polygones d'entraînement LULUCF depuis WorldCover et Dynamic World")]
#[command(long_about = "Vectorise les deux classifications, garde les zones où elles s'accordent, érode, tessellise, valide puis tire un échantillon stratifié pour le contrôle manuel.\n\nSans sous-commande, exécute la chaîne complète.")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Sous-commande (défaut: chaîne complète)
    #[command(subcommand)]
    command: Option<Commands>,

    /// Arguments de la chaîne complète (commande par défaut)
    #[command(flatten)]
    run: RunArgs,
}

fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    // Configurer le logging
    init_logging(cli.verbose, cli.quiet);

    let (report, full_run) = match &cli.command {
        Some(Commands::Validate(args)) => (cli::cmd_validate(args)?, false),
        Some(Commands::Sample(args)) => (cli::cmd_sample(args)?, false),
        None => (cli::cmd_run(&cli.run)?, true),
    };

    if !cli.quiet {
        report.display();
    }

    if full_run && report.status != RunStatus::Failed {
        println!("ALL PROCESSES WERE EXECUTED SUCCESSFULLY.");
        println!("SELECTED POLYGONS FROM TRAIN DATA ARE READY FOR MANUAL CONTROL.");
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
