//! Implémentation du moteur géométrique avec `geo`

use geo::algorithm::orient::{Direction, Orient};
use geo::{
    Area, BooleanOps, Buffer, Coord, LineString, MultiPolygon, Polygon, Rect, Validation, Winding,
};
use tracing::debug;

use super::{GeometryEngine, GeometryProblem, GridCell};
use crate::raster::polygonize::{polygonize, RegionPolygon};
use crate::raster::RasterLayer;
use crate::LandcoverError;

/// Moteur géométrique basé sur `geo` (booléens et tampons via `i_overlay`)
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoEngine;

impl GeoEngine {
    pub fn new() -> Self {
        Self
    }
}

impl GeometryEngine for GeoEngine {
    fn polygonize(
        &self,
        raster: &RasterLayer,
        simplify: bool,
    ) -> Result<Vec<RegionPolygon>, LandcoverError> {
        Ok(polygonize(raster, simplify))
    }

    fn intersection(&self, a: &MultiPolygon, b: &MultiPolygon) -> MultiPolygon {
        without_empty_parts(a.intersection(b))
    }

    fn union(&self, parts: &[MultiPolygon]) -> MultiPolygon {
        let dissolved = parts
            .iter()
            .fold(MultiPolygon::new(Vec::new()), |acc, part| acc.union(part));
        without_empty_parts(dissolved)
    }

    fn buffer(&self, geometry: &MultiPolygon, distance: f64) -> MultiPolygon {
        without_empty_parts(geometry.buffer(distance))
    }

    fn area(&self, geometry: &MultiPolygon) -> f64 {
        geometry.unsigned_area()
    }

    fn tessellate(&self, extent: Rect, cell_area: f64) -> Vec<GridCell> {
        let side = cell_area.sqrt();
        if !(side.is_finite() && side > 0.0) {
            return Vec::new();
        }
        let cols = ((extent.width() / side).ceil() as usize).max(1);
        let rows = ((extent.height() / side).ceil() as usize).max(1);
        let origin = extent.min();

        let mut cells = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                let min = Coord {
                    x: origin.x + col as f64 * side,
                    y: origin.y + row as f64 * side,
                };
                let max = Coord {
                    x: min.x + side,
                    y: min.y + side,
                };
                cells.push(GridCell {
                    row,
                    col,
                    polygon: Rect::new(min, max).to_polygon(),
                });
            }
        }
        debug!(rows, cols, side, "Tessellation generated");
        cells
    }

    fn repair(&self, geometry: &MultiPolygon) -> Result<Option<MultiPolygon>, LandcoverError> {
        let parts: Vec<Polygon> = geometry
            .0
            .iter()
            .filter_map(|polygon| {
                let exterior = clean_ring(polygon.exterior())?;
                let interiors = polygon.interiors().iter().filter_map(clean_ring).collect();
                Some(Polygon::new(exterior, interiors))
            })
            .collect();

        let mut repaired = MultiPolygon::new(parts);
        if !repaired.is_valid() {
            // Reconstruction par union : résout auto-intersections et recouvrements
            repaired = repaired.union(&MultiPolygon::new(Vec::new()));
        }
        let repaired = without_empty_parts(repaired);

        if repaired.0.is_empty() {
            return Ok(None);
        }
        Ok(Some(repaired.orient(Direction::Default)))
    }

    fn check(&self, geometry: Option<&MultiPolygon>) -> Vec<GeometryProblem> {
        let Some(geometry) = geometry else {
            return vec![GeometryProblem::NullGeometry];
        };
        if geometry.0.is_empty() {
            return vec![GeometryProblem::EmptyGeometry];
        }

        let mut problems = Vec::new();
        for polygon in &geometry.0 {
            let rings = std::iter::once((polygon.exterior(), true))
                .chain(polygon.interiors().iter().map(|r| (r, false)));
            for (ring, is_exterior) in rings {
                if ring.0.len() < 4 {
                    problems.push(GeometryProblem::TooFewPoints);
                    continue;
                }
                if ring.0.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
                    problems.push(GeometryProblem::NonFiniteCoordinate);
                    continue;
                }
                if ring.0.windows(2).any(|w| w[0] == w[1]) {
                    problems.push(GeometryProblem::DuplicateVertex);
                }
                let well_ordered = if is_exterior {
                    ring.is_ccw()
                } else {
                    ring.is_cw()
                };
                if !well_ordered {
                    problems.push(GeometryProblem::IncorrectRingOrdering);
                }
            }
        }

        if problems.is_empty() && !geometry.is_valid() {
            problems.push(GeometryProblem::SelfIntersection);
        }
        problems.sort();
        problems.dedup();
        problems
    }
}

/// Nettoie un anneau : coordonnées non finies et doublons consécutifs retirés,
/// fermeture assurée. `None` s'il reste moins de trois sommets distincts.
fn clean_ring(ring: &LineString) -> Option<LineString> {
    let mut coords: Vec<Coord> = Vec::with_capacity(ring.0.len());
    for c in ring.0.iter().filter(|c| c.x.is_finite() && c.y.is_finite()) {
        if coords.last() != Some(c) {
            coords.push(*c);
        }
    }
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    if coords.len() < 3 {
        return None;
    }
    coords.push(coords[0]);
    Some(LineString::new(coords))
}

fn without_empty_parts(mut geometry: MultiPolygon) -> MultiPolygon {
    geometry.0.retain(|p| p.unsigned_area() > 0.0);
    geometry
}
