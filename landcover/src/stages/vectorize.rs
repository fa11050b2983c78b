//! Vectorisation d'un raster et découpage par la zone d'étude

use geo::MultiPolygon;
use tracing::info;

use super::PipelineContext;
use crate::engine::GeometryEngine;
use crate::legend::{remap, Legend, RemapStats, GRIDCODE_FIELD};
use crate::ops::clip_layer;
use crate::raster::RasterLayer;
use crate::types::{FeatureLayer, FieldDef, Value};
use crate::LandcoverError;

/// Raster -> polygones `gridcode`, découpés par `boundary`.
///
/// La couche non découpée est libérée dès le découpage. Une limite qui
/// exclut tout ou partie du raster donne une couche partielle ou vide.
pub fn vectorize<E: GeometryEngine, S>(
    ctx: &PipelineContext<'_, E, S>,
    raster: &RasterLayer,
    boundary: &MultiPolygon,
) -> Result<FeatureLayer, LandcoverError> {
    let clipped = {
        let mut raw = FeatureLayer::new(
            format!("{}_vec", raster.name()),
            vec![FieldDef::integer(GRIDCODE_FIELD)],
        );
        raw.set_crs(raster.crs());
        for region in ctx.engine.polygonize(raster, ctx.params.simplify)? {
            raw.push(
                Some(MultiPolygon::new(vec![region.polygon])),
                vec![Value::Integer(region.code)],
            )?;
        }
        info!(raster = raster.name(), polygons = raw.len(), "Conversion of {} successful", raster.name());

        clip_layer(ctx.engine, &raw, boundary, &format!("{}_clip", raster.name()))?
    };

    info!(
        raster = raster.name(),
        features = clipped.len(),
        "Clipping of {} by region of interest successful",
        raster.name()
    );
    Ok(clipped)
}

/// Vectorise puis ajoute le champ `lulucf` selon la légende de la source
pub fn vectorize_and_remap<E: GeometryEngine, S>(
    ctx: &PipelineContext<'_, E, S>,
    raster: &RasterLayer,
    boundary: &MultiPolygon,
    legend: &Legend,
) -> Result<(FeatureLayer, RemapStats), LandcoverError> {
    let mut layer = vectorize(ctx, raster, boundary)?;
    let stats = remap(&mut layer, legend)?;
    Ok((layer, stats))
}
