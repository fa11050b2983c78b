//! Extraction des zones où les deux sources s'accordent

use tracing::info;

use super::PipelineContext;
use crate::engine::GeometryEngine;
use crate::legend::LULUCF_FIELD;
use crate::ops::intersect_layers;
use crate::predicate::{CompareOp, Predicate};
use crate::types::FeatureLayer;
use crate::LandcoverError;

/// Plus petit code non valide : la sentinelle 99 est au-dessus
const CLASSIFIED_LIMIT: i64 = 10;

/// Intersecte deux couches reclassifiées et ne garde que les morceaux où
/// `lulucf = lulucf_1 AND lulucf < 10`.
pub fn extract_agreement<E: GeometryEngine, S>(
    ctx: &PipelineContext<'_, E, S>,
    first: &FeatureLayer,
    second: &FeatureLayer,
) -> Result<FeatureLayer, LandcoverError> {
    // Position du `lulucf` de la seconde couche dans le schéma d'intersection :
    // FID, FID_<first>, champs de first, FID_<second>, champs de second
    let second_fields = second.carried_fields();
    let offset = second_fields
        .iter()
        .position(|f| f.name.eq_ignore_ascii_case(LULUCF_FIELD))
        .ok_or_else(|| LandcoverError::missing_field(second.name(), LULUCF_FIELD))?;
    first.field_index(LULUCF_FIELD)?;

    let mut intersection =
        intersect_layers(ctx.engine, &first.view_all(), &second.view_all(), "intersect")?;
    let second_lulucf = intersection.schema().fields()[3 + first.carried_fields().len() + offset]
        .name
        .clone();

    let agreed = Predicate::cmp_fields(LULUCF_FIELD, CompareOp::Eq, second_lulucf.as_str())
        .and(Predicate::cmp(LULUCF_FIELD, CompareOp::Lt, CLASSIFIED_LIMIT));
    let total = intersection.len();
    let removed = intersection.retain(&agreed)?;

    info!(
        intersections = total,
        agreed = total - removed,
        field = %second_lulucf,
        "Selecting of polygons with identical LULUCF category for both databases successful"
    );
    Ok(intersection)
}
