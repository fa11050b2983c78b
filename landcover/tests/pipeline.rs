//! Tests d'intégration de la chaîne complète sur des rasters synthétiques

use std::collections::BTreeSet;

use geo::{Coord, MultiPolygon, Rect};
use landcover::legend::{DYNAMIC_WORLD, LULUCF_FIELD, WORLD_COVER};
use landcover::raster::GeoTransform;
use landcover::stages::{self, PipelineContext};
use landcover::{
    Crs, FeatureLayer, FieldDef, GeoEngine, LandcoverError, LayerStore, MemoryStore, RasterLayer,
    Schema, Value,
};

const ORIGIN_X: f64 = 500_000.0;
const ORIGIN_Y: f64 = 5_500_000.0;

/// 200 x 150 pixels de 10 m. Les 20 premières lignes sont non classées
/// dans les deux sources ; en dessous, forêt à gauche et culture à droite.
fn raster(name: &str, strip: i64, left: i64, right: i64) -> RasterLayer {
    let (width, height) = (200, 150);
    let mut cells = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let code = if row < 20 {
                strip
            } else if col < 100 {
                left
            } else {
                right
            };
            cells.push(Some(code));
        }
    }
    RasterLayer::new(
        name,
        width,
        height,
        cells,
        GeoTransform {
            origin_x: ORIGIN_X,
            origin_y: ORIGIN_Y,
            pixel_width: 10.0,
            pixel_height: 10.0,
        },
    )
    .unwrap()
    .with_crs(Some(Crs::from_epsg(32633)))
}

fn boundary() -> MultiPolygon {
    MultiPolygon::new(vec![Rect::new(
        Coord { x: ORIGIN_X - 100.0, y: ORIGIN_Y - 2000.0 },
        Coord { x: ORIGIN_X + 2100.0, y: ORIGIN_Y + 100.0 },
    )
    .to_polygon()])
}

fn run_to_single(ctx: &PipelineContext<'_, GeoEngine, MemoryStore>) -> FeatureLayer {
    let wc = raster("world_cover", 20, 10, 40);
    let dw = raster("dynamic_world", 5, 1, 4);
    let (wc, _) = stages::vectorize_and_remap(ctx, &wc, &boundary(), &WORLD_COVER).unwrap();
    let (dw, _) = stages::vectorize_and_remap(ctx, &dw, &boundary(), &DYNAMIC_WORLD).unwrap();

    let agreed = stages::extract_agreement(ctx, &wc, &dw).unwrap();
    let (single, _) = stages::erode(ctx, &agreed).unwrap();
    single
}

fn run_to_train_data(ctx: &PipelineContext<'_, GeoEngine, MemoryStore>) -> FeatureLayer {
    let single = run_to_single(ctx);
    let (train, _) = stages::normalize(ctx, &single).unwrap();
    train
}

#[test]
fn test_full_pipeline_on_synthetic_rasters() {
    let engine = GeoEngine::new();
    let store = MemoryStore::new();
    let ctx = PipelineContext::new(&engine, &store);

    let train = run_to_train_data(&ctx);

    // Forêt et culture : 900 x 1200 m après érosion, chacune tessellée en
    // 900 x 1000 + 900 x 200
    assert_eq!(train.len(), 4);
    assert_eq!(train.crs().and_then(|c| c.epsg), Some(32633));

    let area = train.field_index("area").unwrap();
    let lulucf = train.field_index(LULUCF_FIELD).unwrap();
    let total: f64 = train
        .features()
        .iter()
        .map(|f| f.value(area).as_f64().unwrap())
        .sum();
    assert!((total - 2.0 * 900.0 * 1200.0).abs() < 1.0);

    for feature in train.features() {
        let a = feature.value(area).as_f64().unwrap();
        assert!(a >= 1800.0);
        assert!(a <= 1_000_000.0 + 1.0);
        assert!(feature.value(lulucf).as_i64().unwrap() < 10);
        assert!(!feature.is_multipart());
    }

    // La bande 20/5 (99 des deux côtés) est exclue, érosion comprise
    let extent = train.extent().unwrap();
    assert!(extent.max().y <= ORIGIN_Y - 200.0 - 50.0 + 1e-3);

    let categories: BTreeSet<i64> = train
        .features()
        .iter()
        .map(|f| f.value(lulucf).as_i64().unwrap())
        .collect();
    assert_eq!(categories, BTreeSet::from([1, 2]));

    let report = stages::validate(&ctx).unwrap();
    assert!(report.repair.is_completed());
    assert!(report.check.completed().unwrap().is_clean());

    // Populations sous les quotas : tout est retenu
    let (sample, selection) = stages::sample(&ctx).unwrap();
    assert_eq!(sample.len(), 4);
    assert!(selection.categories.iter().all(|c| c.selected.len() <= c.quota));
    assert!(store.exists("train_data"));
    assert!(store.exists("check_tab"));
    assert!(store.exists("selection_train"));
    assert!(!store.exists("temp_multi"));
}

#[test]
fn test_pipeline_without_overwrite() {
    let engine = GeoEngine::new();
    let store = MemoryStore::without_overwrite();
    let ctx = PipelineContext::new(&engine, &store);

    let single = run_to_single(&ctx);
    let (train, _) = stages::normalize(&ctx, &single).unwrap();
    assert_eq!(train.len(), 4);

    // train_data existe déjà
    let err = stages::normalize(&ctx, &single).unwrap_err();
    assert!(matches!(err, LandcoverError::OutputExists(ref name) if name == "train_data"));
    assert_eq!(store.load("train_data").unwrap().len(), 4);

    // La réparation réécrit train_data en place
    let report = stages::validate(&ctx).unwrap();
    assert!(report.repair.is_completed());
    assert!(report.check.completed().unwrap().is_clean());
    assert_eq!(store.load("train_data").unwrap().len(), 4);
}

fn synthetic_train_data(per_category: &[(i64, usize)]) -> FeatureLayer {
    let mut layer = FeatureLayer::new(
        "train_data",
        vec![FieldDef::integer(LULUCF_FIELD), FieldDef::double("area")],
    );
    for &(code, count) in per_category {
        for _ in 0..count {
            layer
                .push(None, vec![Value::Integer(code), Value::Double(2000.0)])
                .unwrap();
        }
    }
    layer
}

#[test]
fn test_sampling_is_reproducible() {
    let engine = GeoEngine::new();
    let train = synthetic_train_data(&[(1, 900), (2, 400), (3, 50), (4, 300), (5, 120), (99, 10)]);

    let mut runs = Vec::new();
    for _ in 0..2 {
        let store = MemoryStore::new();
        store.save("train_data", &train).unwrap();
        let ctx = PipelineContext::new(&engine, &store);
        let (_, selection) = stages::sample(&ctx).unwrap();
        runs.push(selection);
    }
    assert_eq!(runs[0].selected_ids(), runs[1].selected_ids());

    let selection = &runs[0];
    let counts: Vec<(i64, usize, usize)> = selection
        .categories
        .iter()
        .map(|c| (c.category.code(), c.population, c.selected.len()))
        .collect();
    assert_eq!(
        counts,
        vec![(1, 900, 341), (2, 400, 192), (3, 50, 50), (4, 300, 84), (5, 120, 82)]
    );
    assert_eq!(selection.total(), 749);
}

#[test]
fn test_sampling_without_identifier_is_fatal() {
    let engine = GeoEngine::new();
    let store = MemoryStore::new();
    let schema = Schema::new(vec![FieldDef::integer(LULUCF_FIELD)]);
    let layer = FeatureLayer::from_parts("train_data", schema, vec![], None).unwrap();
    store.save("train_data", &layer).unwrap();

    let ctx = PipelineContext::new(&engine, &store);
    let err = stages::sample(&ctx).unwrap_err();
    assert!(err.is_fatal());
}
