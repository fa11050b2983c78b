//! Étapes de la chaîne LULUCF
//!
//! Ordre d'exécution : vectorisation + reclassification des deux rasters,
//! extraction de l'accord, érosion, normalisation des tailles, validation
//! des géométries, tirage stratifié. Chaque étape consomme la couche de
//! l'étape précédente et en produit une nouvelle.

pub mod agreement;
pub mod erode;
pub mod identifier;
pub mod normalize;
pub mod sample;
pub mod validate;
pub mod vectorize;

pub use agreement::extract_agreement;
pub use erode::{erode, ErosionStats};
pub use identifier::resolve_identifier;
pub use normalize::{normalize, NormalizeStats};
pub use sample::{sample, select_identifiers, CategorySample, SampleSelection};
pub use validate::{validate, CheckSummary, RepairSummary, StepOutcome, ValidationReport};
pub use vectorize::{vectorize, vectorize_and_remap};

use crate::params::PipelineParams;

/// Noms logiques des couches persistées
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNames {
    /// Résultat brut de l'érosion (multi-parties)
    pub eroded: String,
    pub train_data: String,
    pub check_table: String,
    pub sample: String,
}

impl Default for OutputNames {
    fn default() -> Self {
        Self {
            eroded: "temp_multi".to_string(),
            train_data: "train_data".to_string(),
            check_table: "check_tab".to_string(),
            sample: "selection_train".to_string(),
        }
    }
}

/// Contexte explicite passé à chaque étape (pas d'état global)
pub struct PipelineContext<'a, E, S> {
    pub engine: &'a E,
    pub store: &'a S,
    pub params: PipelineParams,
    pub outputs: OutputNames,
    /// Conserver les intermédiaires persistés (`temp_multi`)
    pub keep_intermediates: bool,
}

impl<'a, E, S> PipelineContext<'a, E, S> {
    pub fn new(engine: &'a E, store: &'a S) -> Self {
        Self {
            engine,
            store,
            params: PipelineParams::default(),
            outputs: OutputNames::default(),
            keep_intermediates: false,
        }
    }

    pub fn with_params(mut self, params: PipelineParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_outputs(mut self, outputs: OutputNames) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn keep_intermediates(mut self, keep: bool) -> Self {
        self.keep_intermediates = keep;
        self
    }
}
