//! Paramètres analytiques de la chaîne (constantes compilées)
//!
//! Toutes les distances et surfaces sont exprimées dans l'unité du CRS
//! projeté de travail, qui doit être le mètre.

use std::collections::BTreeMap;

use crate::legend::Category;

/// Distance du tampon négatif (érosion), en mètres
pub const EROSION_DISTANCE: f64 = -50.0;

/// Surface au-delà de laquelle un polygone est tessellé (1 km²)
pub const LARGE_POLYGON_THRESHOLD: f64 = 1_000_000.0;

/// Surface d'une cellule carrée de tessellation (1 km²)
pub const TESSELLATION_CELL_AREA: f64 = 1_000_000.0;

/// Unité minimale de cartographie, en m²
pub const MINIMUM_MAPPING_UNIT: f64 = 1_800.0;

/// Graine du tirage aléatoire
pub const SAMPLE_SEED: u64 = 42;

/// Quotas de tirage par catégorie.
///
/// x = 80 + 400 * (surface de la catégorie / surface totale), 800 polygones au total.
pub const SAMPLE_QUOTAS: [(Category, usize); 5] = [
    (Category::Forest, 341),
    (Category::Cropland, 192),
    (Category::Grassland, 101),
    (Category::Wetlands, 84),
    (Category::Settlements, 82),
];

/// Table des quotas, itérée par catégorie croissante
pub fn default_quotas() -> BTreeMap<Category, usize> {
    SAMPLE_QUOTAS.into_iter().collect()
}

/// Paramètres passés explicitement aux étapes
#[derive(Debug, Clone)]
pub struct PipelineParams {
    pub erosion_distance: f64,
    pub large_polygon_threshold: f64,
    pub tessellation_cell_area: f64,
    pub minimum_mapping_unit: f64,
    pub simplify: bool,
    pub quotas: BTreeMap<Category, usize>,
    pub seed: u64,
    /// Fréquence des logs de progression pendant l'érosion
    pub progress_every: usize,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            erosion_distance: EROSION_DISTANCE,
            large_polygon_threshold: LARGE_POLYGON_THRESHOLD,
            tessellation_cell_area: TESSELLATION_CELL_AREA,
            minimum_mapping_unit: MINIMUM_MAPPING_UNIT,
            simplify: true,
            quotas: default_quotas(),
            seed: SAMPLE_SEED,
            progress_every: 10_000,
        }
    }
}
