//! Résolution du champ identifiant d'une couche

use crate::types::{FeatureLayer, Schema};
use crate::LandcoverError;

/// Noms candidats, comparés sans tenir compte de la casse
pub const IDENTIFIER_CANDIDATES: [&str; 3] = ["objectid", "oid", "fid"];

/// Index du premier champ (dans l'ordre du schéma) dont le nom est candidat
pub fn find_identifier(schema: &Schema) -> Option<usize> {
    schema.fields().iter().position(|field| {
        IDENTIFIER_CANDIDATES
            .iter()
            .any(|candidate| field.name.eq_ignore_ascii_case(candidate))
    })
}

/// Nom du champ identifiant, tel qu'il figure dans le schéma.
///
/// L'absence de candidat est fatale (voir [`LandcoverError::is_fatal`]) :
/// aucune sélection par identifiant n'est possible sans lui.
pub fn resolve_identifier(layer: &FeatureLayer) -> Result<String, LandcoverError> {
    match find_identifier(layer.schema()) {
        Some(index) => Ok(layer.schema().fields()[index].name.clone()),
        None => Err(LandcoverError::IdentifierNotFound {
            layer: layer.name().to_string(),
            fields: layer.schema().names().collect::<Vec<_>>().join(", "),
        }),
    }
}

/// Valeurs entières du champ identifiant, dans l'ordre des features
pub fn identifier_values(layer: &FeatureLayer, field: &str) -> Result<Vec<i64>, LandcoverError> {
    let index = layer.field_index(field)?;
    layer
        .features()
        .iter()
        .map(|feature| {
            let value = feature.value(index);
            value.as_i64().ok_or_else(|| LandcoverError::InvalidIdentifier {
                layer: layer.name().to_string(),
                field: field.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}
