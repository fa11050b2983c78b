//! # lulucf-train
//!
//! Production de polygones d'entraînement LULUCF à partir des exports
//! WorldCover et Dynamic World d'une zone d'étude.
//!
//! ## Features
//!
//! - Chaîne complète : vectorisation, accord, érosion, tessellation, validation, tirage
//! - Couches persistées en GeoJSON dans le répertoire de travail
//! - Rapport JSON avec empreintes BLAKE3 des sorties
//! - CLI simple
//!
//! ## Usage CLI
//!
//! ```bash
//! # Chaîne complète dans le répertoire courant
//! lulucf-train --workspace /data/ostrava
//!
//! # Rejouer la validation ou le tirage sur une couche existante
//! lulucf-train validate --workspace /data/ostrava
//! lulucf-train sample --workspace /data/ostrava
//! ```

pub mod config;
pub mod export;
pub mod fingerprint;
pub mod pipeline;
pub mod report;

pub use config::Config;
pub use export::GeoJsonStore;
pub use pipeline::{run, run_sample, run_validate, Inputs};
pub use report::{RunReport, RunStatus};
