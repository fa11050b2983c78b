//! Vectorisation d'un raster classifié
//!
//! Chaque région 4-connexe de cellules de même code devient un polygone.
//! Les bords de cellules séparant deux codes différents sont émis comme
//! arêtes orientées (intérieur à gauche), puis chaînés en anneaux : les
//! anneaux de surface positive sont des extérieurs, les autres des trous.
//! Les calculs se font sur la grille de sommets entiers (y vers le haut)
//! avant conversion en coordonnées carte.

use std::collections::HashMap;

use geo::{BoundingRect, Contains, Coord, LineString, Polygon};

use super::RasterLayer;

/// Sommet de la grille : (colonne, -ligne)
type Vertex = (i64, i64);

/// Polygone d'une région homogène
#[derive(Debug, Clone, PartialEq)]
pub struct RegionPolygon {
    /// Code natif de la région
    pub code: i64,
    pub polygon: Polygon,
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    from: Vertex,
    to: Vertex,
    code: i64,
}

impl Edge {
    fn direction(&self) -> Vertex {
        (self.to.0 - self.from.0, self.to.1 - self.from.1)
    }
}

/// Vectorise un raster.
///
/// Avec `simplify`, les sommets alignés le long des bords de cellules sont
/// supprimés ; sinon chaque coin de cellule est conservé. Les cellules
/// nodata ne produisent aucun polygone.
pub fn polygonize(raster: &RasterLayer, simplify: bool) -> Vec<RegionPolygon> {
    let edges = boundary_edges(raster);
    let rings = trace_rings(&edges, simplify);

    let mut outers: Vec<(i64, Vec<Vertex>, i64)> = Vec::new();
    let mut holes: Vec<(i64, Vec<Vertex>)> = Vec::new();
    for (code, ring) in rings {
        let area2 = signed_area2(&ring);
        if area2 > 0 {
            outers.push((code, ring, area2));
        } else if area2 < 0 {
            holes.push((code, ring));
        }
    }

    let grid_polygons: Vec<Polygon> = outers
        .iter()
        .map(|(_, ring, _)| Polygon::new(to_linestring(ring), vec![]))
        .collect();
    let mut outers_by_code: HashMap<i64, Vec<usize>> = HashMap::new();
    for (i, (code, _, _)) in outers.iter().enumerate() {
        outers_by_code.entry(*code).or_default().push(i);
    }

    // Rattacher chaque trou au plus petit extérieur de même code qui le contient
    let mut interiors: Vec<Vec<&[Vertex]>> = vec![Vec::new(); outers.len()];
    for (code, ring) in &holes {
        let inner = hole_inner_point(ring);
        let owner = outers_by_code
            .get(code)
            .into_iter()
            .flatten()
            .copied()
            .filter(|&i| {
                grid_polygons[i]
                    .bounding_rect()
                    .is_some_and(|r| rect_contains(r, inner))
            })
            .filter(|&i| grid_polygons[i].contains(&inner))
            .min_by_key(|&i| outers[i].2);
        match owner {
            Some(i) => interiors[i].push(ring),
            None => tracing::warn!(code, "Orphan hole ring dropped during polygonization"),
        }
    }

    let transform = raster.transform();
    let to_map = |ring: &[Vertex]| -> LineString {
        LineString::new(
            ring.iter()
                .map(|&(col, k)| transform.vertex(col as f64, -k as f64))
                .collect(),
        )
    };

    outers
        .iter()
        .zip(interiors)
        .map(|((code, ring, _), holes)| RegionPolygon {
            code: *code,
            polygon: Polygon::new(to_map(ring), holes.into_iter().map(to_map).collect()),
        })
        .collect()
}

/// Arêtes de frontière, intérieur de la cellule à gauche (sens direct)
fn boundary_edges(raster: &RasterLayer) -> Vec<Edge> {
    let mut edges = Vec::new();
    for row in 0..raster.height() as isize {
        for col in 0..raster.width() as isize {
            let Some(code) = raster.get(row, col) else {
                continue;
            };
            let (c, r) = (col as i64, row as i64);
            let differs = |dr: isize, dc: isize| raster.get(row + dr, col + dc) != Some(code);

            if differs(1, 0) {
                edges.push(Edge { from: (c, -r - 1), to: (c + 1, -r - 1), code });
            }
            if differs(0, 1) {
                edges.push(Edge { from: (c + 1, -r - 1), to: (c + 1, -r), code });
            }
            if differs(-1, 0) {
                edges.push(Edge { from: (c + 1, -r), to: (c, -r), code });
            }
            if differs(0, -1) {
                edges.push(Edge { from: (c, -r), to: (c, -r - 1), code });
            }
        }
    }
    edges
}

/// Chaîne les arêtes en anneaux fermés.
///
/// Aux sommets « pincés » (deux cellules de même code en diagonale), le
/// virage à gauche est prioritaire : les régions restent 4-connexes.
fn trace_rings(edges: &[Edge], simplify: bool) -> Vec<(i64, Vec<Vertex>)> {
    let mut outgoing: HashMap<(i64, Vertex), Vec<usize>> = HashMap::new();
    for (i, edge) in edges.iter().enumerate() {
        outgoing.entry((edge.code, edge.from)).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();

    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let code = edges[start].code;
        let mut ring = vec![edges[start].from];
        let mut current = start;

        loop {
            let incoming = edges[current].direction();
            let next = outgoing
                .get(&(code, edges[current].to))
                .into_iter()
                .flatten()
                .copied()
                .filter(|&i| !used[i] || i == start)
                .min_by_key(|&i| turn_rank(incoming, edges[i].direction()));

            match next {
                Some(i) if i == start => break,
                Some(i) => {
                    used[i] = true;
                    ring.push(edges[i].from);
                    current = i;
                }
                None => {
                    tracing::warn!(code, "Open boundary chain while tracing raster edges");
                    break;
                }
            }
        }

        if simplify {
            ring = drop_collinear(ring);
        }
        if ring.len() >= 3 {
            ring.push(ring[0]);
            rings.push((code, ring));
        }
    }
    rings
}

/// 0 = virage à gauche, 1 = tout droit, 2 = à droite, 3 = demi-tour
fn turn_rank(incoming: Vertex, outgoing: Vertex) -> u8 {
    let cross = incoming.0 * outgoing.1 - incoming.1 * outgoing.0;
    if cross > 0 {
        0
    } else if cross < 0 {
        2
    } else if incoming == outgoing {
        1
    } else {
        3
    }
}

/// Supprime les sommets alignés d'un anneau ouvert (sans répétition finale)
fn drop_collinear(ring: Vec<Vertex>) -> Vec<Vertex> {
    let n = ring.len();
    if n < 4 {
        return ring;
    }
    (0..n)
        .filter(|&i| {
            let prev = ring[(i + n - 1) % n];
            let cur = ring[i];
            let next = ring[(i + 1) % n];
            let a = (cur.0 - prev.0, cur.1 - prev.1);
            let b = (next.0 - cur.0, next.1 - cur.1);
            a.0 * b.1 - a.1 * b.0 != 0
        })
        .map(|i| ring[i])
        .collect()
}

/// Double de la surface signée (anneau fermé)
fn signed_area2(ring: &[Vertex]) -> i64 {
    ring.windows(2)
        .map(|w| w[0].0 * w[1].1 - w[1].0 * w[0].1)
        .sum()
}

/// Centre de la cellule située à droite de la première arête d'un trou,
/// donc à l'intérieur du trou
fn hole_inner_point(ring: &[Vertex]) -> Coord {
    let (a, b) = (ring[0], ring[1]);
    let len = ((b.0 - a.0).abs() + (b.1 - a.1).abs()).max(1);
    let d = ((b.0 - a.0) / len, (b.1 - a.1) / len);
    let right = (d.1, -d.0);
    Coord {
        x: a.0 as f64 + 0.5 * d.0 as f64 + 0.5 * right.0 as f64,
        y: a.1 as f64 + 0.5 * d.1 as f64 + 0.5 * right.1 as f64,
    }
}

fn to_linestring(ring: &[Vertex]) -> LineString {
    LineString::new(
        ring.iter()
            .map(|&(x, y)| Coord {
                x: x as f64,
                y: y as f64,
            })
            .collect(),
    )
}

fn rect_contains(rect: geo::Rect, c: Coord) -> bool {
    c.x >= rect.min().x && c.x <= rect.max().x && c.y >= rect.min().y && c.y <= rect.max().y
}
