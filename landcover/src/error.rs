//! Types d'erreurs pour le crate landcover

use thiserror::Error;

/// Erreurs pouvant survenir dans la chaîne de traitement
#[derive(Debug, Error)]
pub enum LandcoverError {
    /// Erreur d'I/O lors de la lecture ou de l'écriture d'une couche
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Erreur de décodage TIFF
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Raster invalide (géoréférencement absent, multi-bandes, dimensions...)
    #[error("Invalid raster {raster}: {reason}")]
    InvalidRaster { raster: String, reason: String },

    /// Système de coordonnées inutilisable avec des constantes métriques
    #[error("Unsupported CRS for {layer}: {reason}")]
    UnsupportedCrs { layer: String, reason: String },

    /// Deux entrées déclarent des systèmes de coordonnées différents
    #[error("CRS mismatch: {left} is EPSG:{left_epsg}, {right} is EPSG:{right_epsg}")]
    CrsMismatch {
        left: String,
        left_epsg: u32,
        right: String,
        right_epsg: u32,
    },

    /// Champ attendu absent du schéma
    #[error("Field {field} not found in {layer}")]
    MissingField { layer: String, field: String },

    /// Champ déjà présent lors d'un ajout
    #[error("Field {field} already exists in {layer}")]
    DuplicateField { layer: String, field: String },

    /// Ligne ne correspondant pas au schéma de la couche
    #[error("Schema mismatch in {layer}: expected {expected} values, got {actual}")]
    SchemaMismatch {
        layer: String,
        expected: usize,
        actual: usize,
    },

    /// Aucun champ identifiant (objectid, oid, fid) : erreur fatale
    #[error("ID field not found in {layer} (fields: {fields})")]
    IdentifierNotFound { layer: String, fields: String },

    /// Valeur d'identifiant non entière ou nulle
    #[error("Invalid identifier value in {layer}.{field}: {value}")]
    InvalidIdentifier {
        layer: String,
        field: String,
        value: String,
    },

    /// Erreur du stockage des couches
    #[error("Store error for {name}: {reason}")]
    Store { name: String, reason: String },

    /// La sortie existe déjà et l'écrasement est désactivé
    #[error("Output already exists and overwrite is disabled: {0}")]
    OutputExists(String),

    /// Échec de la réparation de géométrie
    #[error("Geometry repair failed for {layer}: {reason}")]
    RepairFailed { layer: String, reason: String },

    /// Échec du contrôle de géométrie
    #[error("Geometry check failed for {layer}: {reason}")]
    CheckFailed { layer: String, reason: String },
}

impl LandcoverError {
    /// Crée une erreur de stockage avec contexte
    pub fn store(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Store {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Crée une erreur de raster invalide
    pub fn invalid_raster(raster: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRaster {
            raster: raster.into(),
            reason: reason.into(),
        }
    }

    /// Crée une erreur de champ manquant
    pub fn missing_field(layer: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            layer: layer.into(),
            field: field.into(),
        }
    }

    /// Seule l'absence d'identifiant interrompt toute la chaîne
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::IdentifierNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_identifier_error_is_fatal() {
        let fatal = LandcoverError::IdentifierNotFound {
            layer: "check_tab".to_string(),
            fields: "name, value".to_string(),
        };
        assert!(fatal.is_fatal());
        assert!(!LandcoverError::store("train_data", "missing").is_fatal());
        assert!(!LandcoverError::missing_field("train_data", "area").is_fatal());
    }
}
