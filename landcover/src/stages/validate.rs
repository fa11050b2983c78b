//! Réparation et contrôle des géométries de la couche d'entraînement
//!
//! Les deux étapes sont isolées : l'échec de l'une est rapporté
//! ([`StepOutcome::Failed`]) sans empêcher l'autre. Seule une erreur
//! fatale (identifiant introuvable) est propagée.

use tracing::{error, info, warn};

use super::identifier::{find_identifier, identifier_values, resolve_identifier};
use super::PipelineContext;
use crate::engine::GeometryEngine;
use crate::store::LayerStore;
use crate::types::{FeatureLayer, FieldDef, Value};
use crate::LandcoverError;

/// Identifiant de la table de contrôle
pub const CHECK_OID_FIELD: &str = "OBJECTID";

/// Résultat d'une étape isolée
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome<T> {
    Completed(T),
    /// Erreur rapportée, la chaîne continue
    Failed(String),
}

impl<T> StepOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, StepOutcome::Completed(_))
    }

    pub fn completed(&self) -> Option<&T> {
        match self {
            StepOutcome::Completed(value) => Some(value),
            StepOutcome::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairSummary {
    pub inspected: usize,
    /// Géométries modifiées par la réparation
    pub repaired: usize,
    /// Features supprimées (géométrie nulle avant ou après réparation)
    pub deleted: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSummary {
    /// Champ identifiant résolu sur la table de contrôle
    pub identifier: String,
    pub problems: usize,
}

impl CheckSummary {
    pub fn is_clean(&self) -> bool {
        self.problems == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub repair: StepOutcome<RepairSummary>,
    pub check: StepOutcome<CheckSummary>,
}

/// Répare puis contrôle la couche d'entraînement persistée
pub fn validate<E: GeometryEngine, S: LayerStore>(
    ctx: &PipelineContext<'_, E, S>,
) -> Result<ValidationReport, LandcoverError> {
    info!(layer = %ctx.outputs.train_data, "Repairing geometry of train data polygons started");
    let repair = isolate(repair_layer(ctx), "Geometry repair error", |summary| {
        info!(
            repaired = summary.repaired,
            deleted = summary.deleted,
            "The geometry repair was successful"
        );
    })?;

    let check = isolate(check_layer(ctx), "Error while working with check table", |summary| {
        if summary.is_clean() {
            info!("Error check table is empty. No geometry errors were found");
        } else {
            warn!(
                problems = summary.problems,
                "Error check table contains records. Geometric errors were found"
            );
        }
    })?;

    Ok(ValidationReport { repair, check })
}

/// Convertit une erreur non fatale en résultat rapporté
fn isolate<T>(
    result: Result<T, LandcoverError>,
    context: &str,
    on_success: impl FnOnce(&T),
) -> Result<StepOutcome<T>, LandcoverError> {
    match result {
        Ok(value) => {
            on_success(&value);
            Ok(StepOutcome::Completed(value))
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            error!(error = %e, "{}", context);
            Ok(StepOutcome::Failed(e.to_string()))
        }
    }
}

fn repair_layer<E: GeometryEngine, S: LayerStore>(
    ctx: &PipelineContext<'_, E, S>,
) -> Result<RepairSummary, LandcoverError> {
    let name = &ctx.outputs.train_data;
    let mut layer = ctx.store.load(name)?;
    let mut summary = RepairSummary {
        inspected: layer.len(),
        ..Default::default()
    };

    for feature in layer.features_mut() {
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        let repaired = ctx.engine.repair(geometry).map_err(|e| LandcoverError::RepairFailed {
            layer: name.clone(),
            reason: e.to_string(),
        })?;
        if repaired.as_ref() != Some(geometry) {
            summary.repaired += 1;
        }
        feature.geometry = repaired;
    }
    summary.deleted = layer.retain_features(|f| f.geometry.is_some());

    ctx.store.update(name, &layer)?;
    Ok(summary)
}

fn check_layer<E: GeometryEngine, S: LayerStore>(
    ctx: &PipelineContext<'_, E, S>,
) -> Result<CheckSummary, LandcoverError> {
    let name = &ctx.outputs.train_data;
    let layer = ctx.store.load(name)?;
    let id_index = find_identifier(layer.schema());

    let mut table = FeatureLayer::with_oid(
        ctx.outputs.check_table.as_str(),
        CHECK_OID_FIELD,
        vec![
            FieldDef::text("CLASS"),
            FieldDef::integer("FEATURE_ID"),
            FieldDef::text("PROBLEM"),
        ],
    );
    for (row, feature) in layer.features().iter().enumerate() {
        let feature_id = id_index
            .and_then(|i| feature.value(i).as_i64())
            .unwrap_or(row as i64);
        for problem in ctx.engine.check(feature.geometry.as_ref()) {
            table.push(
                None,
                vec![
                    Value::Text(name.clone()),
                    Value::Integer(feature_id),
                    Value::Text(problem.to_string()),
                ],
            )?;
        }
    }
    ctx.store
        .save(&ctx.outputs.check_table, &table)
        .map_err(|e| LandcoverError::CheckFailed {
            layer: name.clone(),
            reason: e.to_string(),
        })?;
    drop(table);

    let table = ctx.store.load(&ctx.outputs.check_table)?;
    let identifier = resolve_identifier(&table)?;
    let problems = identifier_values(&table, &identifier)?.len();
    Ok(CheckSummary {
        identifier,
        problems,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::GeoEngine;
    use crate::store::MemoryStore;
    use crate::types::Schema;
    use geo::{polygon, MultiPolygon};

    fn train_data() -> FeatureLayer {
        let mut layer = FeatureLayer::new("train_data", vec![FieldDef::integer("lulucf")]);
        // Sens horaire : ordre des anneaux incorrect
        layer
            .push(
                Some(MultiPolygon::new(vec![polygon![
                    (x: 0.0, y: 0.0),
                    (x: 0.0, y: 100.0),
                    (x: 100.0, y: 100.0),
                    (x: 100.0, y: 0.0),
                ]])),
                vec![Value::Integer(1)],
            )
            .unwrap();
        layer.push(None, vec![Value::Integer(2)]).unwrap();
        layer
    }

    #[test]
    fn test_check_reports_problems_without_repair() {
        let engine = GeoEngine::new();
        let store = MemoryStore::new();
        store.save("train_data", &train_data()).unwrap();
        let ctx = PipelineContext::new(&engine, &store);

        let summary = check_layer(&ctx).unwrap();
        assert_eq!(summary.identifier, "OBJECTID");
        assert_eq!(summary.problems, 2);

        let table = store.load("check_tab").unwrap();
        let problem = table.field_index("PROBLEM").unwrap();
        let labels: Vec<&str> = table
            .features()
            .iter()
            .map(|f| f.value(problem).as_str().unwrap())
            .collect();
        assert_eq!(labels, vec!["incorrect ring ordering", "null geometry"]);
    }

    #[test]
    fn test_validate_repairs_then_checks_clean() {
        let engine = GeoEngine::new();
        let store = MemoryStore::new();
        store.save("train_data", &train_data()).unwrap();
        let ctx = PipelineContext::new(&engine, &store);

        let report = validate(&ctx).unwrap();
        let repair = report.repair.completed().unwrap();
        assert_eq!(repair.inspected, 2);
        assert_eq!(repair.repaired, 1);
        assert_eq!(repair.deleted, 1);
        assert!(report.check.completed().unwrap().is_clean());
        assert_eq!(store.load("train_data").unwrap().len(), 1);
    }

    #[test]
    fn test_repair_in_place_without_overwrite() {
        let engine = GeoEngine::new();
        let store = MemoryStore::without_overwrite();
        store.save("train_data", &train_data()).unwrap();
        let ctx = PipelineContext::new(&engine, &store);

        let report = validate(&ctx).unwrap();
        assert!(report.repair.is_completed());
        assert_eq!(report.repair.completed().unwrap().deleted, 1);
        assert!(report.check.completed().unwrap().is_clean());
        assert_eq!(store.load("train_data").unwrap().len(), 1);
    }

    /// Moteur dont la réparation échoue toujours
    struct BrokenRepair(GeoEngine);

    impl GeometryEngine for BrokenRepair {
        fn polygonize(
            &self,
            raster: &crate::raster::RasterLayer,
            simplify: bool,
        ) -> Result<Vec<crate::raster::polygonize::RegionPolygon>, LandcoverError> {
            self.0.polygonize(raster, simplify)
        }

        fn intersection(&self, a: &MultiPolygon, b: &MultiPolygon) -> MultiPolygon {
            self.0.intersection(a, b)
        }

        fn union(&self, parts: &[MultiPolygon]) -> MultiPolygon {
            self.0.union(parts)
        }

        fn buffer(&self, geometry: &MultiPolygon, distance: f64) -> MultiPolygon {
            self.0.buffer(geometry, distance)
        }

        fn area(&self, geometry: &MultiPolygon) -> f64 {
            self.0.area(geometry)
        }

        fn tessellate(&self, extent: geo::Rect, cell_area: f64) -> Vec<crate::engine::GridCell> {
            self.0.tessellate(extent, cell_area)
        }

        fn repair(&self, _: &MultiPolygon) -> Result<Option<MultiPolygon>, LandcoverError> {
            Err(LandcoverError::store("engine", "topology exception"))
        }

        fn check(&self, geometry: Option<&MultiPolygon>) -> Vec<crate::engine::GeometryProblem> {
            self.0.check(geometry)
        }
    }

    #[test]
    fn test_engine_repair_error_is_reported() {
        let engine = BrokenRepair(GeoEngine::new());
        let store = MemoryStore::new();
        store.save("train_data", &train_data()).unwrap();
        let ctx = PipelineContext::new(&engine, &store);

        let report = validate(&ctx).unwrap();
        match &report.repair {
            StepOutcome::Failed(message) => assert!(message.contains("Geometry repair failed")),
            other => panic!("unexpected repair outcome: {:?}", other),
        }
        // Le contrôle tourne quand même, sur la couche non réparée
        assert_eq!(report.check.completed().unwrap().problems, 2);
        assert_eq!(store.load("train_data").unwrap().len(), 2);
    }

    #[test]
    fn test_missing_layer_is_reported_not_raised() {
        let engine = GeoEngine::new();
        let store = MemoryStore::new();
        let ctx = PipelineContext::new(&engine, &store);

        let report = validate(&ctx).unwrap();
        assert!(matches!(report.repair, StepOutcome::Failed(_)));
        assert!(matches!(report.check, StepOutcome::Failed(_)));
    }

    /// Stockage qui perd l'identifiant de la table de contrôle
    struct LossyStore(MemoryStore);

    impl LayerStore for LossyStore {
        fn save(&self, name: &str, layer: &FeatureLayer) -> Result<(), LandcoverError> {
            self.0.save(name, layer)
        }

        fn update(&self, name: &str, layer: &FeatureLayer) -> Result<(), LandcoverError> {
            self.0.update(name, layer)
        }

        fn load(&self, name: &str) -> Result<FeatureLayer, LandcoverError> {
            let layer = self.0.load(name)?;
            if name != "check_tab" {
                return Ok(layer);
            }
            let schema = Schema::new(vec![FieldDef::text("name"), FieldDef::text("value")]);
            FeatureLayer::from_parts(name, schema, vec![], None)
        }

        fn remove(&self, name: &str) -> Result<(), LandcoverError> {
            self.0.remove(name)
        }

        fn exists(&self, name: &str) -> bool {
            self.0.exists(name)
        }
    }

    #[test]
    fn test_missing_check_identifier_is_fatal() {
        let engine = GeoEngine::new();
        let store = LossyStore(MemoryStore::new());
        store.save("train_data", &train_data()).unwrap();
        let ctx = PipelineContext::new(&engine, &store);

        let err = validate(&ctx).unwrap_err();
        assert!(err.is_fatal());
    }
}
