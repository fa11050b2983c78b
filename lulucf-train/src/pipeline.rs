//! Orchestration de la chaîne : chargement des entrées, contrôle des CRS,
//! enchaînement des étapes et constitution du rapport.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use landcover::legend::{DYNAMIC_WORLD, WORLD_COVER};
use landcover::ops::dissolve;
use landcover::raster::read_geotiff;
use landcover::stages::{self, PipelineContext};
use landcover::{Crs, FeatureLayer, GeoEngine, LandcoverError, LayerStore, RasterLayer};
use tracing::{info, warn};

use crate::config::Config;
use crate::export::geojson::read_layer;
use crate::export::GeoJsonStore;
use crate::fingerprint::layer_fingerprint;
use crate::report::RunReport;

/// Entrées de la chaîne, chargées en mémoire
#[derive(Debug, Clone)]
pub struct Inputs {
    pub world_cover: RasterLayer,
    pub dynamic_world: RasterLayer,
    /// Zone d'étude
    pub boundary: FeatureLayer,
}

/// Charge les deux rasters et la zone d'étude depuis le répertoire de travail
pub fn load_inputs(config: &Config) -> Result<Inputs> {
    let world_cover_path = config.input_path(&config.inputs.world_cover);
    let world_cover = read_geotiff(&world_cover_path)
        .context(format!("Failed to read raster: {}", world_cover_path.display()))?;

    let dynamic_world_path = config.input_path(&config.inputs.dynamic_world);
    let dynamic_world = read_geotiff(&dynamic_world_path)
        .context(format!("Failed to read raster: {}", dynamic_world_path.display()))?;

    let boundary_path = config.input_path(&config.inputs.clip_boundary);
    let boundary = read_layer(&boundary_path, &layer_name(&boundary_path))?;

    info!(
        world_cover = %world_cover_path.display(),
        dynamic_world = %dynamic_world_path.display(),
        boundary = %boundary_path.display(),
        "Inputs loaded"
    );
    Ok(Inputs {
        world_cover,
        dynamic_world,
        boundary,
    })
}

fn layer_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "boundary".to_string())
}

/// Vérifie que les CRS déclarés sont métriques et identiques, puis attribue
/// le CRS commun aux entrées qui n'en déclarent pas.
///
/// Retourne le CRS de travail, `None` si aucune entrée n'en déclare.
pub fn harmonize_crs(inputs: Inputs) -> Result<(Inputs, Option<Crs>), LandcoverError> {
    let declared = [
        (inputs.world_cover.name().to_string(), inputs.world_cover.crs()),
        (inputs.dynamic_world.name().to_string(), inputs.dynamic_world.crs()),
        (inputs.boundary.name().to_string(), inputs.boundary.crs()),
    ];

    let mut working: Option<(&str, Crs)> = None;
    for (name, crs) in &declared {
        let Some(crs) = crs else { continue };
        crs.ensure_metric(name)?;
        match working {
            None => working = Some((name.as_str(), *crs)),
            Some((first, reference)) => {
                if let (Some(left_epsg), Some(right_epsg)) = (reference.epsg, crs.epsg) {
                    if left_epsg != right_epsg {
                        return Err(LandcoverError::CrsMismatch {
                            left: first.to_string(),
                            left_epsg,
                            right: name.clone(),
                            right_epsg,
                        });
                    }
                }
            }
        }
    }

    let working = working.map(|(_, crs)| crs);
    if working.is_none() {
        warn!("No input declares a CRS, coordinates are assumed projected in metres");
    }

    let Inputs {
        world_cover,
        dynamic_world,
        mut boundary,
    } = inputs;
    let world_cover = match world_cover.crs() {
        Some(_) => world_cover,
        None => world_cover.with_crs(working),
    };
    let dynamic_world = match dynamic_world.crs() {
        Some(_) => dynamic_world,
        None => dynamic_world.with_crs(working),
    };
    if boundary.crs().is_none() {
        boundary.set_crs(working);
    }

    Ok((
        Inputs {
            world_cover,
            dynamic_world,
            boundary,
        },
        working,
    ))
}

fn context<'a, S: LayerStore>(
    config: &Config,
    engine: &'a GeoEngine,
    store: &'a S,
) -> PipelineContext<'a, GeoEngine, S> {
    PipelineContext::new(engine, store)
        .with_outputs(config.output_names())
        .keep_intermediates(config.keep_intermediates)
}

/// Exécute toute la chaîne sur des entrées déjà chargées
pub fn run_with_store<S: LayerStore>(
    config: &Config,
    inputs: Inputs,
    store: &S,
    report: &mut RunReport,
) -> Result<(), LandcoverError> {
    let (inputs, crs) = harmonize_crs(inputs)?;
    info!(epsg = ?crs.and_then(|c| c.epsg), "Working CRS resolved");

    let engine = GeoEngine::new();
    let ctx = context(config, &engine, store);

    let boundary = dissolve(&engine, &inputs.boundary);
    if boundary.0.is_empty() {
        warn!(layer = inputs.boundary.name(), "Study area is empty, every output will be empty");
    }

    let started = Instant::now();
    let (world_cover, wc_stats) =
        stages::vectorize_and_remap(&ctx, &inputs.world_cover, &boundary, &WORLD_COVER)?;
    report.record_stage(
        "world_cover",
        world_cover.len(),
        started.elapsed(),
        [("unmapped", wc_stats.unmapped)],
    );

    let started = Instant::now();
    let (dynamic_world, dw_stats) =
        stages::vectorize_and_remap(&ctx, &inputs.dynamic_world, &boundary, &DYNAMIC_WORLD)?;
    report.record_stage(
        "dynamic_world",
        dynamic_world.len(),
        started.elapsed(),
        [("unmapped", dw_stats.unmapped)],
    );
    drop(inputs);

    let started = Instant::now();
    let agreed = stages::extract_agreement(&ctx, &world_cover, &dynamic_world)?;
    report.record_stage("agreement", agreed.len(), started.elapsed(), []);
    drop(world_cover);
    drop(dynamic_world);

    let started = Instant::now();
    let (single, erosion) = stages::erode(&ctx, &agreed)?;
    report.record_stage(
        "erode",
        single.len(),
        started.elapsed(),
        [("input", erosion.input), ("vanished", erosion.vanished)],
    );
    drop(agreed);

    let started = Instant::now();
    let (train, normalized) = stages::normalize(&ctx, &single)?;
    report.record_stage(
        "normalize",
        train.len(),
        started.elapsed(),
        [
            ("big", normalized.big),
            ("small", normalized.small),
            ("grid_cells", normalized.grid_cells),
            ("tiles", normalized.tiles),
            ("below_mmu", normalized.below_mmu),
        ],
    );
    drop(single);
    drop(train);

    validate_with_store(config, store, report)?;
    sample_with_store(config, store, report)?;
    Ok(())
}

/// Répare et contrôle la couche d'entraînement persistée
pub fn validate_with_store<S: LayerStore>(
    config: &Config,
    store: &S,
    report: &mut RunReport,
) -> Result<(), LandcoverError> {
    let engine = GeoEngine::new();
    let ctx = context(config, &engine, store);

    let started = Instant::now();
    let validation = stages::validate(&ctx)?;
    report.record_validation(&validation);

    // La couche réparée est la référence
    let train_name = &ctx.outputs.train_data;
    match store.load(train_name) {
        Ok(train) => {
            report.record_stage("validate", train.len(), started.elapsed(), []);
            report.record_fingerprint(train_name, layer_fingerprint(&train));
        }
        Err(e) => warn!(layer = %train_name, error = %e, "Train data not available for fingerprint"),
    }
    Ok(())
}

/// Tire l'échantillon depuis la couche d'entraînement persistée
pub fn sample_with_store<S: LayerStore>(
    config: &Config,
    store: &S,
    report: &mut RunReport,
) -> Result<(), LandcoverError> {
    let engine = GeoEngine::new();
    let ctx = context(config, &engine, store);

    let started = Instant::now();
    let (sample, selection) = stages::sample(&ctx)?;
    report.record_stage("sample", sample.len(), started.elapsed(), []);
    report.record_sample(&selection);
    report.record_fingerprint(&ctx.outputs.sample, layer_fingerprint(&sample));
    Ok(())
}

/// Chaîne complète depuis les fichiers du répertoire de travail
pub fn run(config: &Config) -> Result<RunReport> {
    execute(config, |store, report| {
        let inputs = load_inputs(config)?;
        run_with_store(config, inputs, store, report)?;
        Ok(())
    })
}

/// Validation seule, sur une couche d'entraînement existante
pub fn run_validate(config: &Config) -> Result<RunReport> {
    execute(config, |store, report| {
        validate_with_store(config, store, report)?;
        Ok(())
    })
}

/// Tirage seul, sur une couche d'entraînement existante
pub fn run_sample(config: &Config) -> Result<RunReport> {
    execute(config, |store, report| {
        sample_with_store(config, store, report)?;
        Ok(())
    })
}

/// Exécute `job`, puis finalise et sauvegarde le rapport, y compris en cas d'échec
fn execute(
    config: &Config,
    job: impl FnOnce(&GeoJsonStore, &mut RunReport) -> Result<()>,
) -> Result<RunReport> {
    let start = Instant::now();
    let mut report = RunReport::new(&config.workspace.display().to_string());
    let store = GeoJsonStore::new(&config.workspace, config.overwrite);

    let result = job(&store, &mut report);
    if let Err(e) = &result {
        report.record_error(format!("{:#}", e));
    }
    report.set_duration(start.elapsed());
    report.finalize();

    let report_path = config.report_path();
    match result {
        Ok(()) => {
            report
                .save_to_file(&report_path)
                .context(format!("Failed to write report: {}", report_path.display()))?;
            info!(report = %report_path.display(), "{}", report.summary());
            Ok(report)
        }
        Err(e) => {
            if let Err(save_error) = report.save_to_file(&report_path) {
                warn!(report = %report_path.display(), error = %save_error, "Failed to write report");
            }
            Err(e)
        }
    }
}
