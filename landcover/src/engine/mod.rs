//! Moteur géométrique abstrait
//!
//! Les étapes de la chaîne ne manipulent la géométrie qu'à travers ce
//! trait : vectorisation, intersection, tampon, surface, tessellation,
//! réparation et contrôle. [`GeoEngine`] l'implémente avec le crate `geo`.

mod geo_engine;

use std::fmt;

use geo::{MultiPolygon, Polygon, Rect};

use crate::raster::polygonize::RegionPolygon;
use crate::raster::RasterLayer;
use crate::LandcoverError;

pub use geo_engine::GeoEngine;

/// Cellule d'une grille de tessellation
#[derive(Debug, Clone, PartialEq)]
pub struct GridCell {
    /// Ligne, depuis le bas de l'emprise
    pub row: usize,
    /// Colonne, depuis la gauche de l'emprise
    pub col: usize,
    pub polygon: Polygon,
}

impl GridCell {
    pub fn grid_id(&self) -> String {
        format!("{}-{}", self.row + 1, self.col + 1)
    }
}

/// Problème détecté par le contrôle de géométrie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GeometryProblem {
    NullGeometry,
    EmptyGeometry,
    TooFewPoints,
    NonFiniteCoordinate,
    DuplicateVertex,
    IncorrectRingOrdering,
    SelfIntersection,
}

impl GeometryProblem {
    pub fn as_str(self) -> &'static str {
        match self {
            GeometryProblem::NullGeometry => "null geometry",
            GeometryProblem::EmptyGeometry => "empty geometry",
            GeometryProblem::TooFewPoints => "too few points",
            GeometryProblem::NonFiniteCoordinate => "non-finite coordinate",
            GeometryProblem::DuplicateVertex => "duplicate vertex",
            GeometryProblem::IncorrectRingOrdering => "incorrect ring ordering",
            GeometryProblem::SelfIntersection => "self intersections",
        }
    }
}

impl fmt::Display for GeometryProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opérations géométriques utilisées par la chaîne.
///
/// Contrats :
/// - les résultats surfaciques ne contiennent jamais de partie de surface nulle ;
/// - un résultat vide (`MultiPolygon` sans partie) est valide et n'est pas une erreur ;
/// - toutes les surfaces sont planaires, dans l'unité du CRS.
pub trait GeometryEngine {
    /// Raster classifié -> un polygone par région homogène
    fn polygonize(
        &self,
        raster: &RasterLayer,
        simplify: bool,
    ) -> Result<Vec<RegionPolygon>, LandcoverError>;

    /// Intersection de deux surfaces
    fn intersection(&self, a: &MultiPolygon, b: &MultiPolygon) -> MultiPolygon;

    /// Fusion (dissolve) d'un ensemble de surfaces
    fn union(&self, parts: &[MultiPolygon]) -> MultiPolygon;

    /// Tampon ; une distance négative érode, et peut tout faire disparaître
    fn buffer(&self, geometry: &MultiPolygon, distance: f64) -> MultiPolygon;

    /// Surface planaire (toujours positive)
    fn area(&self, geometry: &MultiPolygon) -> f64;

    /// Grille de carrés de surface `cell_area` couvrant `extent`
    fn tessellate(&self, extent: Rect, cell_area: f64) -> Vec<GridCell>;

    /// Répare une géométrie ; `None` si plus rien ne subsiste.
    ///
    /// `Err` signale une réparation interrompue par le moteur (la chaîne la
    /// rapporte en `RepairFailed`). [`GeoEngine`] n'échoue jamais : ce qui ne
    /// peut pas être reconstruit est retiré, au pire la géométrie devient nulle.
    fn repair(&self, geometry: &MultiPolygon) -> Result<Option<MultiPolygon>, LandcoverError>;

    /// Liste les problèmes d'une géométrie (vide si correcte)
    fn check(&self, geometry: Option<&MultiPolygon>) -> Vec<GeometryProblem>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_problem_labels() {
        assert_eq!(GeometryProblem::NullGeometry.to_string(), "null geometry");
        assert_eq!(GeometryProblem::SelfIntersection.as_str(), "self intersections");
    }
}
