//! Persistance des couches (GeoJSON)

pub mod geojson;
pub mod store;

pub use store::GeoJsonStore;
