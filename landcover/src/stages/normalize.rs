//! Normalisation de la taille des polygones : tessellation des grands
//! polygones, éclatement et filtre de l'unité minimale de cartographie

use tracing::info;

use super::erode::AREA_FIELD;
use super::PipelineContext;
use crate::engine::GeometryEngine;
use crate::ops::{calculate_area, explode, intersect_layers, merge};
use crate::predicate::{CompareOp, Predicate};
use crate::store::LayerStore;
use crate::types::{FeatureLayer, FieldDef, Value};
use crate::LandcoverError;

/// Champ identifiant une cellule de tessellation (`ligne-colonne`)
pub const GRID_ID_FIELD: &str = "GRID_ID";

/// Bilan de la normalisation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub big: usize,
    pub small: usize,
    pub grid_cells: usize,
    /// Morceaux issus de l'intersection grille x grands polygones
    pub tiles: usize,
    /// Morceaux retirés par le filtre de surface minimale
    pub below_mmu: usize,
    pub output: usize,
}

/// Découpe les polygones de plus de `large_polygon_threshold` m² par une
/// grille carrée, fusionne avec les autres, recalcule `area`, retire les
/// morceaux sous l'unité minimale et persiste la couche d'entraînement.
pub fn normalize<E: GeometryEngine, S: LayerStore>(
    ctx: &PipelineContext<'_, E, S>,
    single: &FeatureLayer,
) -> Result<(FeatureLayer, NormalizeStats), LandcoverError> {
    let params = &ctx.params;
    let is_big = Predicate::cmp(AREA_FIELD, CompareOp::Gt, params.large_polygon_threshold);
    let big = single.view(&is_big)?;
    let small = single.view(&is_big.clone().not())?;

    let mut stats = NormalizeStats {
        big: big.len(),
        small: small.len(),
        ..Default::default()
    };

    let mut mersin = {
        let tiled = match big.extent() {
            Some(extent) => {
                let mut grid = FeatureLayer::new("tessellation", vec![FieldDef::text(GRID_ID_FIELD)]);
                grid.set_crs(single.crs());
                for cell in ctx.engine.tessellate(extent, params.tessellation_cell_area) {
                    grid.push(
                        Some(geo::MultiPolygon::new(vec![cell.polygon.clone()])),
                        vec![Value::Text(cell.grid_id())],
                    )?;
                }
                stats.grid_cells = grid.len();
                intersect_layers(ctx.engine, &grid.view_all(), &big, "tesbig")?
            }
            None => FeatureLayer::new("tesbig", vec![]),
        };
        stats.tiles = tiled.len();

        let merged = merge(&small, &tiled.view_all(), "merge")?;
        explode(&merged.view_all(), "mersin")?
    };

    calculate_area(ctx.engine, &mut mersin, AREA_FIELD)?;
    stats.below_mmu = mersin.retain(&Predicate::cmp(
        AREA_FIELD,
        CompareOp::Ge,
        params.minimum_mapping_unit,
    ))?;
    stats.output = mersin.len();

    let train = mersin.view_all().to_layer(ctx.outputs.train_data.as_str());
    ctx.store.save(&ctx.outputs.train_data, &train)?;

    info!(
        big = stats.big,
        small = stats.small,
        grid_cells = stats.grid_cells,
        tiles = stats.tiles,
        below_mmu = stats.below_mmu,
        features = stats.output,
        "Creation of train data successful"
    );
    Ok((train, stats))
}
