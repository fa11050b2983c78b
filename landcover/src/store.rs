//! Stockage des couches persistées (sorties et intermédiaires durables)

use std::cell::RefCell;
use std::collections::HashMap;

use crate::types::FeatureLayer;
use crate::LandcoverError;

/// Stockage de couches par nom logique.
///
/// La chaîne est mono-thread : les implémentations peuvent utiliser une
/// mutabilité intérieure non synchronisée.
pub trait LayerStore {
    /// Persiste une couche (remplacement selon la politique d'écrasement)
    fn save(&self, name: &str, layer: &FeatureLayer) -> Result<(), LandcoverError>;

    /// Remplace une couche existante en place, quelle que soit la politique
    /// d'écrasement ; la couche doit déjà exister
    fn update(&self, name: &str, layer: &FeatureLayer) -> Result<(), LandcoverError>;

    /// Relit une couche persistée
    fn load(&self, name: &str) -> Result<FeatureLayer, LandcoverError>;

    /// Supprime une couche ; absente n'est pas une erreur
    fn remove(&self, name: &str) -> Result<(), LandcoverError>;

    fn exists(&self, name: &str) -> bool;
}

/// Stockage en mémoire
#[derive(Debug)]
pub struct MemoryStore {
    layers: RefCell<HashMap<String, FeatureLayer>>,
    overwrite: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            layers: RefCell::new(HashMap::new()),
            overwrite: true,
        }
    }

    /// Stockage refusant d'écraser une couche existante
    pub fn without_overwrite() -> Self {
        Self {
            overwrite: false,
            ..Self::new()
        }
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.layers.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerStore for MemoryStore {
    fn save(&self, name: &str, layer: &FeatureLayer) -> Result<(), LandcoverError> {
        let mut layers = self.layers.borrow_mut();
        if !self.overwrite && layers.contains_key(name) {
            return Err(LandcoverError::OutputExists(name.to_string()));
        }
        layers.insert(name.to_string(), layer.clone());
        Ok(())
    }

    fn update(&self, name: &str, layer: &FeatureLayer) -> Result<(), LandcoverError> {
        match self.layers.borrow_mut().get_mut(name) {
            Some(existing) => {
                *existing = layer.clone();
                Ok(())
            }
            None => Err(LandcoverError::store(name, "layer not found")),
        }
    }

    fn load(&self, name: &str) -> Result<FeatureLayer, LandcoverError> {
        self.layers
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| LandcoverError::store(name, "layer not found"))
    }

    fn remove(&self, name: &str) -> Result<(), LandcoverError> {
        self.layers.borrow_mut().remove(name);
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.layers.borrow().contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        let layer = FeatureLayer::new("train_data", vec![]);
        store.save("train_data", &layer).unwrap();
        assert!(store.exists("train_data"));
        assert_eq!(store.load("train_data").unwrap().name(), "train_data");

        store.remove("train_data").unwrap();
        assert!(!store.exists("train_data"));
        assert!(store.load("train_data").is_err());
    }

    #[test]
    fn test_overwrite_policy() {
        let store = MemoryStore::without_overwrite();
        let layer = FeatureLayer::new("sample", vec![]);
        store.save("sample", &layer).unwrap();
        assert!(matches!(
            store.save("sample", &layer),
            Err(LandcoverError::OutputExists(_))
        ));
    }

    #[test]
    fn test_update_ignores_overwrite_policy() {
        let store = MemoryStore::without_overwrite();
        let mut layer = FeatureLayer::new("train_data", vec![]);
        assert!(store.update("train_data", &layer).is_err());

        store.save("train_data", &layer).unwrap();
        layer.push(None, vec![]).unwrap();
        store.update("train_data", &layer).unwrap();
        assert_eq!(store.load("train_data").unwrap().len(), 1);
    }
}
