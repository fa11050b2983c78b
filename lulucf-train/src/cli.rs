//! Définition et implémentation des commandes CLI
//!
//! - défaut : chaîne complète
//! - `validate` : réparation et contrôle de `train_data`
//! - `sample` : tirage stratifié depuis `train_data`

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use tracing::info;

use lulucf_train::{pipeline, Config, RunReport};

#[derive(Subcommand)]
pub enum Commands {
    /// Repair and check the geometry of an existing training layer
    Validate(RunArgs),

    /// Draw the stratified sample from an existing training layer
    Sample(RunArgs),
}

/// Options communes à toutes les commandes
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Path to a JSON config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Workspace directory (défaut : config, env LULUCF_WORKSPACE, ou ".")
    #[arg(short, long)]
    pub workspace: Option<PathBuf>,

    /// Fail instead of overwriting existing outputs
    #[arg(long)]
    pub no_overwrite: bool,

    /// Keep the raw erosion result (temp_multi)
    #[arg(long)]
    pub keep_intermediates: bool,
}

impl RunArgs {
    /// Fichier, environnement puis arguments
    pub fn resolve_config(&self) -> Result<Config> {
        let mut config = Config::resolve(self.config.as_deref())?;
        if let Some(workspace) = &self.workspace {
            config.workspace = workspace.clone();
        }
        if self.no_overwrite {
            config.overwrite = false;
        }
        if self.keep_intermediates {
            config.keep_intermediates = true;
        }
        Ok(config)
    }
}

/// Exécute la chaîne complète
pub fn cmd_run(args: &RunArgs) -> Result<RunReport> {
    let config = args.resolve_config()?;
    info!(workspace = %config.workspace.display(), "Starting LULUCF training data pipeline");
    pipeline::run(&config)
}

/// Exécute la validation seule
pub fn cmd_validate(args: &RunArgs) -> Result<RunReport> {
    let config = args.resolve_config()?;
    info!(workspace = %config.workspace.display(), layer = %config.outputs.train_data, "Validating train data");
    pipeline::run_validate(&config)
}

/// Exécute le tirage seul
pub fn cmd_sample(args: &RunArgs) -> Result<RunReport> {
    let config = args.resolve_config()?;
    info!(workspace = %config.workspace.display(), layer = %config.outputs.train_data, "Sampling train data");
    pipeline::run_sample(&config)
}
