//! # landcover
//!
//! Chaîne de production de données d'entraînement LULUCF à partir de deux
//! produits d'occupation du sol (ESA WorldCover et Dynamic World).
//!
//! ## Étapes
//!
//! 1. Vectorisation des rasters et découpage par la zone d'étude
//! 2. Reclassification des codes natifs en catégories LULUCF
//! 3. Intersection et conservation des zones où les sources s'accordent
//! 4. Érosion de 50 m, éclatement des multi-parties, calcul des surfaces
//! 5. Tessellation des polygones de plus de 1 km² et filtre des 1 800 m²
//! 6. Réparation et contrôle des géométries
//! 7. Tirage stratifié par catégorie, avec graine fixe
//!
//! ## Usage
//!
//! ```rust,ignore
//! use landcover::stages::{self, PipelineContext};
//! use landcover::{GeoEngine, MemoryStore};
//!
//! let engine = GeoEngine::new();
//! let store = MemoryStore::new();
//! let ctx = PipelineContext::new(&engine, &store);
//!
//! let (wc, _) = stages::vectorize_and_remap(&ctx, &world_cover, &boundary, &legend::WORLD_COVER)?;
//! let (dw, _) = stages::vectorize_and_remap(&ctx, &dynamic_world, &boundary, &legend::DYNAMIC_WORLD)?;
//! let agreed = stages::extract_agreement(&ctx, &wc, &dw)?;
//! let (single, _) = stages::erode(&ctx, &agreed)?;
//! stages::normalize(&ctx, &single)?;
//! let report = stages::validate(&ctx)?;
//! let (sample, selection) = stages::sample(&ctx)?;
//! ```

pub mod engine;
pub mod error;
pub mod legend;
pub mod ops;
pub mod params;
pub mod predicate;
pub mod raster;
pub mod stages;
pub mod store;
pub mod types;

pub use engine::{GeoEngine, GeometryEngine};
pub use error::LandcoverError;
pub use legend::{Category, Legend};
pub use params::PipelineParams;
pub use predicate::{CompareOp, Predicate};
pub use raster::RasterLayer;
pub use store::{LayerStore, MemoryStore};
pub use types::{Crs, Feature, FeatureLayer, FieldDef, FieldType, Schema, Value};
