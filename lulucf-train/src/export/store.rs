//! Stockage des couches sous forme de fichiers GeoJSON dans le répertoire de travail

use std::path::{Path, PathBuf};

use landcover::{FeatureLayer, LandcoverError, LayerStore};
use tracing::debug;

use super::geojson::{export_layer, read_layer};

/// Une couche `name` est le fichier `<dir>/<name>.geojson`
#[derive(Debug, Clone)]
pub struct GeoJsonStore {
    dir: PathBuf,
    overwrite: bool,
}

impl GeoJsonStore {
    pub fn new(dir: impl Into<PathBuf>, overwrite: bool) -> Self {
        Self {
            dir: dir.into(),
            overwrite,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Chemin du fichier d'une couche
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.geojson", name))
    }
}

impl LayerStore for GeoJsonStore {
    fn save(&self, name: &str, layer: &FeatureLayer) -> Result<(), LandcoverError> {
        let path = self.path(name);
        if path.exists() && !self.overwrite {
            return Err(LandcoverError::OutputExists(path.display().to_string()));
        }
        std::fs::create_dir_all(&self.dir)?;
        export_layer(layer, &path).map_err(|e| LandcoverError::store(name, format!("{:#}", e)))?;
        debug!(layer = name, path = %path.display(), features = layer.len(), "Layer saved");
        Ok(())
    }

    fn update(&self, name: &str, layer: &FeatureLayer) -> Result<(), LandcoverError> {
        let path = self.path(name);
        if !path.exists() {
            return Err(LandcoverError::store(
                name,
                format!("layer not found: {}", path.display()),
            ));
        }
        export_layer(layer, &path).map_err(|e| LandcoverError::store(name, format!("{:#}", e)))?;
        debug!(layer = name, path = %path.display(), features = layer.len(), "Layer updated in place");
        Ok(())
    }

    fn load(&self, name: &str) -> Result<FeatureLayer, LandcoverError> {
        let path = self.path(name);
        if !path.exists() {
            return Err(LandcoverError::store(
                name,
                format!("layer not found: {}", path.display()),
            ));
        }
        read_layer(&path, name).map_err(|e| LandcoverError::store(name, format!("{:#}", e)))
    }

    fn remove(&self, name: &str) -> Result<(), LandcoverError> {
        let path = self.path(name);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }
}
