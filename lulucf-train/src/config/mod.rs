//! Configuration d'exécution : chemins, noms des sorties, politique d'écrasement
//!
//! Les constantes analytiques (légendes, seuils, quotas, graine) ne sont pas
//! ici : elles sont compilées dans `landcover::params`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use landcover::stages::OutputNames;
use serde::{Deserialize, Serialize};

/// Variable d'environnement surchargeant le répertoire de travail
pub const WORKSPACE_ENV: &str = "LULUCF_WORKSPACE";

/// Configuration principale
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Répertoire de travail : entrées relatives et sorties
    pub workspace: PathBuf,

    pub inputs: InputFiles,

    pub outputs: OutputLayers,

    /// Écraser les sorties existantes
    pub overwrite: bool,

    /// Conserver le résultat brut de l'érosion
    pub keep_intermediates: bool,

    /// Nom du rapport JSON écrit dans le répertoire de travail
    pub report_file: String,
}

/// Fichiers d'entrée (relatifs au répertoire de travail)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InputFiles {
    pub world_cover: PathBuf,
    pub dynamic_world: PathBuf,
    /// Zone d'étude (GeoJSON polygonal)
    pub clip_boundary: PathBuf,
}

/// Noms des couches produites
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputLayers {
    pub eroded: String,
    pub train_data: String,
    pub check_table: String,
    pub sample: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("."),
            inputs: InputFiles::default(),
            outputs: OutputLayers::default(),
            overwrite: true,
            keep_intermediates: false,
            report_file: "run_report.json".to_string(),
        }
    }
}

impl Default for InputFiles {
    fn default() -> Self {
        Self {
            world_cover: PathBuf::from("world_cover_export.tif"),
            dynamic_world: PathBuf::from("dynamic_world_export.tif"),
            clip_boundary: PathBuf::from("Ostrava_32633.geojson"),
        }
    }
}

impl Default for OutputLayers {
    fn default() -> Self {
        let names = OutputNames::default();
        Self {
            eroded: names.eroded,
            train_data: names.train_data,
            check_table: names.check_table,
            sample: names.sample,
        }
    }
}

impl From<&OutputLayers> for OutputNames {
    fn from(layers: &OutputLayers) -> Self {
        Self {
            eroded: layers.eroded.clone(),
            train_data: layers.train_data.clone(),
            check_table: layers.check_table.clone(),
            sample: layers.sample.clone(),
        }
    }
}

impl Config {
    /// Charge une configuration depuis un fichier JSON (champs absents = défauts)
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Défauts, puis fichier éventuel, puis variable d'environnement
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Applique `LULUCF_WORKSPACE` si défini et non vide
    pub fn apply_env(&mut self) {
        if let Some(workspace) = std::env::var_os(WORKSPACE_ENV).filter(|v| !v.is_empty()) {
            self.workspace = PathBuf::from(workspace);
        }
    }

    /// Résout un chemin d'entrée par rapport au répertoire de travail
    pub fn input_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    pub fn report_path(&self) -> PathBuf {
        self.workspace.join(&self.report_file)
    }

    pub fn output_names(&self) -> OutputNames {
        OutputNames::from(&self.outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.overwrite);
        assert!(!config.keep_intermediates);
        assert_eq!(config.inputs.world_cover, PathBuf::from("world_cover_export.tif"));
        assert_eq!(config.outputs.train_data, "train_data");
        assert_eq!(config.outputs.sample, "selection_train");
        assert_eq!(config.output_names(), OutputNames::default());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"workspace": "/data/ostrava", "outputs": {"sample": "review"}}"#)
                .unwrap();
        assert_eq!(config.workspace, PathBuf::from("/data/ostrava"));
        assert_eq!(config.outputs.sample, "review");
        assert_eq!(config.outputs.train_data, "train_data");
        assert!(config.overwrite);
    }

    #[test]
    fn test_input_path_resolution() {
        let config = Config {
            workspace: PathBuf::from("/data"),
            ..Default::default()
        };
        assert_eq!(
            config.input_path(Path::new("wc.tif")),
            PathBuf::from("/data/wc.tif")
        );
        assert_eq!(
            config.input_path(Path::new("/abs/wc.tif")),
            PathBuf::from("/abs/wc.tif")
        );
    }

    #[test]
    fn test_load_missing_file_fails() {
        let path = std::env::temp_dir().join("lulucf_missing_config.json");
        assert!(Config::load(&path).is_err());
    }
}
