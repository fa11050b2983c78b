//! Lecture des GeoTIFF mono-bande (WorldCover, Dynamic World)

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::{debug, info};

use super::{GeoTransform, RasterLayer};
use crate::types::{Crs, CrsKind};
use crate::LandcoverError;

/// GeoKeys utilisées
const GT_MODEL_TYPE: u16 = 1024;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;
const PROJ_LINEAR_UNITS: u16 = 3076;

/// Valeur GeoTIFF « défini par l'utilisateur »
const USER_DEFINED: u16 = 32767;

/// Lit un GeoTIFF de classification.
///
/// Le nom de la couche est le nom du fichier sans extension.
///
/// # Errors
///
/// Retourne `LandcoverError` si le fichier est illisible, multi-bandes ou
/// sans géoréférencement (`ModelPixelScale` + `ModelTiepoint`).
pub fn read_geotiff(path: &Path) -> Result<RasterLayer, LandcoverError> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "raster".to_string());

    let file = File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file))?.with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions()?;
    match decoder.colortype()? {
        ColorType::Gray(_) => {}
        other => {
            return Err(LandcoverError::invalid_raster(
                &name,
                format!("expected a single band, found {:?}", other),
            ))
        }
    }

    let scale = decoder
        .find_tag(Tag::ModelPixelScaleTag)?
        .map(|v| v.into_f64_vec())
        .transpose()?;
    let tiepoint = decoder
        .find_tag(Tag::ModelTiepointTag)?
        .map(|v| v.into_f64_vec())
        .transpose()?;
    let transform = match (scale, tiepoint) {
        (Some(scale), Some(tiepoint)) => geotransform_from_tags(&scale, &tiepoint)
            .ok_or_else(|| LandcoverError::invalid_raster(&name, "malformed georeferencing tags"))?,
        _ => {
            return Err(LandcoverError::invalid_raster(
                &name,
                "missing ModelPixelScale/ModelTiepoint tags",
            ))
        }
    };

    let nodata = decoder
        .find_tag(Tag::GdalNodata)?
        .map(|v| v.into_string())
        .transpose()?
        .and_then(|s| parse_nodata(&s));

    let crs = decoder
        .find_tag(Tag::GeoKeyDirectoryTag)?
        .map(|v| v.into_u16_vec())
        .transpose()?
        .and_then(|keys| crs_from_geokeys(&keys));

    let cells = cells_from_image(decoder.read_image()?, nodata)
        .ok_or_else(|| LandcoverError::invalid_raster(&name, "unsupported sample format"))?;

    info!(
        raster = %name,
        width,
        height,
        nodata = ?nodata,
        epsg = ?crs.and_then(|c| c.epsg),
        "Raster loaded"
    );

    Ok(RasterLayer::new(name, width as usize, height as usize, cells, transform)?.with_crs(crs))
}

/// Géoréférencement depuis ModelPixelScale [sx, sy, sz] et ModelTiepoint [i, j, k, x, y, z]
fn geotransform_from_tags(scale: &[f64], tiepoint: &[f64]) -> Option<GeoTransform> {
    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }
    let (sx, sy) = (scale[0], scale[1]);
    if !(sx > 0.0 && sy > 0.0) {
        return None;
    }
    let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
    Some(GeoTransform {
        origin_x: x - i * sx,
        origin_y: y + j * sy,
        pixel_width: sx,
        pixel_height: sy,
    })
}

/// Valeur GDAL_NODATA (chaîne ASCII, parfois terminée par un NUL)
fn parse_nodata(raw: &str) -> Option<f64> {
    raw.trim_matches(char::from(0)).trim().parse::<f64>().ok()
}

/// Décode le répertoire de GeoKeys en CRS
pub fn crs_from_geokeys(keys: &[u16]) -> Option<Crs> {
    if keys.len() < 4 {
        return None;
    }
    let count = keys[3] as usize;
    let mut model_type = None;
    let mut geographic = None;
    let mut projected = None;
    let mut linear_unit = None;

    for entry in keys[4..].chunks_exact(4).take(count) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        // Seules les valeurs stockées directement dans le répertoire nous intéressent
        if location != 0 {
            continue;
        }
        match key {
            GT_MODEL_TYPE => model_type = Some(value),
            GEOGRAPHIC_TYPE => geographic = Some(value),
            PROJECTED_CS_TYPE => projected = Some(value),
            PROJ_LINEAR_UNITS => linear_unit = Some(value),
            _ => {}
        }
    }

    let defined = |v: Option<u16>| v.filter(|&c| c != USER_DEFINED).map(u32::from);
    let kind = match model_type {
        Some(1) => CrsKind::Projected,
        Some(2) => CrsKind::Geographic,
        _ if projected.is_some() => CrsKind::Projected,
        _ if geographic.is_some() => CrsKind::Geographic,
        _ => CrsKind::Unknown,
    };
    let epsg = match kind {
        CrsKind::Geographic => defined(geographic),
        _ => defined(projected),
    };
    debug!(?kind, ?epsg, ?linear_unit, "GeoKeys decoded");

    Some(Crs {
        epsg,
        kind,
        linear_unit,
    })
}

fn cells_from_image(image: DecodingResult, nodata: Option<f64>) -> Option<Vec<Option<i64>>> {
    fn integers<T: Copy + Into<i64>>(data: Vec<T>, nodata: Option<f64>) -> Vec<Option<i64>> {
        let nodata = nodata.filter(|n| n.fract() == 0.0).map(|n| n as i64);
        data.into_iter()
            .map(|v| {
                let v: i64 = v.into();
                (Some(v) != nodata).then_some(v)
            })
            .collect()
    }

    fn floats(data: Vec<f64>, nodata: Option<f64>) -> Vec<Option<i64>> {
        data.into_iter()
            .map(|v| {
                let masked = !v.is_finite() || nodata.is_some_and(|n| n == v);
                (!masked).then(|| v.round() as i64)
            })
            .collect()
    }

    Some(match image {
        DecodingResult::U8(data) => integers(data, nodata),
        DecodingResult::U16(data) => integers(data, nodata),
        DecodingResult::U32(data) => integers(data, nodata),
        DecodingResult::I8(data) => integers(data, nodata),
        DecodingResult::I16(data) => integers(data, nodata),
        DecodingResult::I32(data) => integers(data, nodata),
        DecodingResult::I64(data) => integers(data, nodata),
        DecodingResult::F32(data) => floats(data.into_iter().map(f64::from).collect(), nodata),
        DecodingResult::F64(data) => floats(data, nodata),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::METRE_UNIT;

    #[test]
    fn test_geotransform_from_tags() {
        let transform =
            geotransform_from_tags(&[10.0, 10.0, 0.0], &[0.0, 0.0, 0.0, 600_000.0, 5_560_000.0, 0.0])
                .unwrap();
        assert_eq!(transform.origin_x, 600_000.0);
        assert_eq!(transform.origin_y, 5_560_000.0);
        assert_eq!(transform.vertex(1.0, 1.0).y, 5_559_990.0);

        assert!(geotransform_from_tags(&[10.0], &[0.0; 6]).is_none());
    }

    #[test]
    fn test_crs_from_geokeys_utm() {
        // GTModelType=1, ProjectedCSType=32633, ProjLinearUnits=9001
        let keys = [
            1, 1, 0, 3, //
            1024, 0, 1, 1, //
            3072, 0, 1, 32633, //
            3076, 0, 1, 9001,
        ];
        let crs = crs_from_geokeys(&keys).unwrap();
        assert_eq!(crs.kind, CrsKind::Projected);
        assert_eq!(crs.epsg, Some(32633));
        assert_eq!(crs.linear_unit, Some(METRE_UNIT));
        assert!(crs.ensure_metric("world_cover").is_ok());
    }

    #[test]
    fn test_crs_from_geokeys_wgs84() {
        let keys = [1, 1, 0, 2, 1024, 0, 1, 2, 2048, 0, 1, 4326];
        let crs = crs_from_geokeys(&keys).unwrap();
        assert_eq!(crs.kind, CrsKind::Geographic);
        assert_eq!(crs.epsg, Some(4326));
        assert!(crs.ensure_metric("dynamic_world").is_err());
    }

    #[test]
    fn test_crs_from_geokeys_model_type_wins() {
        // NAD83(CSRS), géographique, donné par GTModelType seul
        let keys = [1, 1, 0, 2, 1024, 0, 1, 2, 2048, 0, 1, 4617];
        let crs = crs_from_geokeys(&keys).unwrap();
        assert_eq!(crs.kind, CrsKind::Geographic);
        assert!(crs.ensure_metric("world_cover").is_err());

        // Répertoire sans type ni code
        let keys = [1, 1, 0, 1, 3076, 0, 1, 9001];
        let crs = crs_from_geokeys(&keys).unwrap();
        assert_eq!(crs.kind, CrsKind::Unknown);
        assert!(crs.ensure_metric("world_cover").is_err());
    }

    #[test]
    fn test_nodata_masking() {
        let cells = cells_from_image(DecodingResult::U8(vec![0, 10, 20]), Some(0.0)).unwrap();
        assert_eq!(cells, vec![None, Some(10), Some(20)]);

        let cells =
            cells_from_image(DecodingResult::F32(vec![f32::NAN, 3.0, -9999.0]), Some(-9999.0))
                .unwrap();
        assert_eq!(cells, vec![None, Some(3), None]);
    }

    #[test]
    fn test_parse_nodata() {
        assert_eq!(parse_nodata("0\0"), Some(0.0));
        assert_eq!(parse_nodata(" -9999 "), Some(-9999.0));
        assert_eq!(parse_nodata("none"), None);
    }
}
