//! Érosion (tampon négatif), éclatement et calcul des surfaces

use tracing::{debug, info, warn};

use super::PipelineContext;
use crate::engine::GeometryEngine;
use crate::ops::{calculate_area, explode};
use crate::store::LayerStore;
use crate::types::FeatureLayer;
use crate::LandcoverError;

/// Champ de surface (m²)
pub const AREA_FIELD: &str = "area";

/// Bilan de l'érosion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErosionStats {
    pub input: usize,
    /// Polygones entièrement consommés par le tampon
    pub vanished: usize,
    /// Features mono-partie produites
    pub parts: usize,
}

/// Applique le tampon négatif à chaque polygone, persiste le résultat brut
/// (`temp_multi`), l'éclate en mono-parties et calcule `area`.
///
/// Les polygones consommés par l'érosion disparaissent sans erreur.
pub fn erode<E: GeometryEngine, S: LayerStore>(
    ctx: &PipelineContext<'_, E, S>,
    input: &FeatureLayer,
) -> Result<(FeatureLayer, ErosionStats), LandcoverError> {
    info!("Starting negative buffer application");
    warn!(
        features = input.len(),
        distance = ctx.params.erosion_distance,
        "This step can take a long time"
    );

    let mut stats = ErosionStats {
        input: input.len(),
        ..Default::default()
    };

    let mut eroded = FeatureLayer::new(ctx.outputs.eroded.as_str(), input.carried_fields());
    eroded.set_crs(input.crs());
    for (i, feature) in input.features().iter().enumerate() {
        let buffered = feature
            .geometry
            .as_ref()
            .map(|g| ctx.engine.buffer(g, ctx.params.erosion_distance))
            .filter(|g| !g.0.is_empty());
        match buffered {
            Some(geometry) => {
                eroded.push(Some(geometry), input.carried_values(feature))?;
            }
            None => stats.vanished += 1,
        }
        if ctx.params.progress_every > 0 && (i + 1) % ctx.params.progress_every == 0 {
            debug!(done = i + 1, total = input.len(), "Buffer progress");
        }
    }
    ctx.store.save(&ctx.outputs.eroded, &eroded)?;
    info!(
        kept = eroded.len(),
        vanished = stats.vanished,
        "Negative buffer application successful"
    );

    let persisted = ctx.store.load(&ctx.outputs.eroded)?;
    drop(eroded);
    let mut single = explode(&persisted.view_all(), "single")?;
    calculate_area(ctx.engine, &mut single, AREA_FIELD)?;
    stats.parts = single.len();

    if !ctx.keep_intermediates {
        ctx.store.remove(&ctx.outputs.eroded)?;
    }
    info!(parts = stats.parts, "Calculation of area successful");
    Ok((single, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::GeoEngine;
    use crate::store::MemoryStore;
    use crate::types::{FieldDef, Value};
    use geo::{Coord, MultiPolygon, Rect};

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> geo::Polygon {
        Rect::new(Coord { x: x0, y: y0 }, Coord { x: x1, y: y1 }).to_polygon()
    }

    fn input() -> FeatureLayer {
        let mut layer = FeatureLayer::new("intersect", vec![FieldDef::integer("lulucf")]);
        // Deux blocs disjoints dans une même feature multi-parties
        layer
            .push(
                Some(MultiPolygon::new(vec![rect(0.0, 0.0, 300.0, 300.0), rect(500.0, 0.0, 800.0, 300.0)])),
                vec![Value::Integer(1)],
            )
            .unwrap();
        // Bande étroite entièrement consommée
        layer
            .push(Some(MultiPolygon::new(vec![rect(0.0, 1000.0, 1000.0, 1080.0)])), vec![Value::Integer(3)])
            .unwrap();
        layer
    }

    #[test]
    fn test_erosion_splits_and_drops() {
        let engine = GeoEngine::new();
        let store = MemoryStore::new();
        let ctx = PipelineContext::new(&engine, &store);

        let (single, stats) = erode(&ctx, &input()).unwrap();
        assert_eq!(stats.input, 2);
        assert_eq!(stats.vanished, 1);
        assert_eq!(stats.parts, 2);
        assert!(single.features().iter().all(|f| !f.is_multipart()));

        let area = single.field_index(AREA_FIELD).unwrap();
        for feature in single.features() {
            assert!((feature.value(area).as_f64().unwrap() - 200.0 * 200.0).abs() < 1.0);
        }
        assert!(!store.exists("temp_multi"));
    }

    #[test]
    fn test_keep_intermediates() {
        let engine = GeoEngine::new();
        let store = MemoryStore::new();
        let ctx = PipelineContext::new(&engine, &store).keep_intermediates(true);

        erode(&ctx, &input()).unwrap();
        let persisted = store.load("temp_multi").unwrap();
        assert_eq!(persisted.len(), 1);
        assert!(persisted.features()[0].is_multipart());
    }
}
