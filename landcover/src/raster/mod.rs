//! Rasters classifiés (entrée seule, immuables)

pub mod geotiff;
pub mod polygonize;

use geo::{Coord, Rect};

use crate::types::Crs;
use crate::LandcoverError;

pub use geotiff::read_geotiff;

/// Géoréférencement affine sans rotation (pixel-is-area)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    /// X du coin haut-gauche du pixel (0, 0)
    pub origin_x: f64,
    /// Y du coin haut-gauche du pixel (0, 0)
    pub origin_y: f64,
    /// Largeur d'un pixel (positive)
    pub pixel_width: f64,
    /// Hauteur d'un pixel (positive, les lignes descendent)
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Coordonnées carte d'un sommet de la grille (colonne, ligne)
    pub fn vertex(&self, col: f64, row: f64) -> Coord {
        Coord {
            x: self.origin_x + col * self.pixel_width,
            y: self.origin_y - row * self.pixel_height,
        }
    }
}

/// Grille de codes de classification
#[derive(Debug, Clone)]
pub struct RasterLayer {
    name: String,
    width: usize,
    height: usize,
    cells: Vec<Option<i64>>,
    transform: GeoTransform,
    crs: Option<Crs>,
}

impl RasterLayer {
    /// Construit un raster ; `cells` est en ordre ligne par ligne, `None` = nodata
    pub fn new(
        name: impl Into<String>,
        width: usize,
        height: usize,
        cells: Vec<Option<i64>>,
        transform: GeoTransform,
    ) -> Result<Self, LandcoverError> {
        let name = name.into();
        if cells.len() != width * height {
            return Err(LandcoverError::invalid_raster(
                name,
                format!(
                    "{} cells for a {}x{} grid",
                    cells.len(),
                    width,
                    height
                ),
            ));
        }
        if !(transform.pixel_width > 0.0 && transform.pixel_height > 0.0) {
            return Err(LandcoverError::invalid_raster(
                name,
                "pixel size must be strictly positive",
            ));
        }
        Ok(Self {
            name,
            width,
            height,
            cells,
            transform,
            crs: None,
        })
    }

    pub fn with_crs(mut self, crs: Option<Crs>) -> Self {
        self.crs = crs;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> Option<Crs> {
        self.crs
    }

    /// Code d'une cellule, `None` hors grille ou nodata
    pub fn get(&self, row: isize, col: isize) -> Option<i64> {
        if row < 0 || col < 0 || row as usize >= self.height || col as usize >= self.width {
            return None;
        }
        self.cells[row as usize * self.width + col as usize]
    }

    /// Emprise du raster en coordonnées carte
    pub fn extent(&self) -> Rect {
        Rect::new(
            self.transform.vertex(0.0, 0.0),
            self.transform.vertex(self.width as f64, self.height as f64),
        )
    }
}
