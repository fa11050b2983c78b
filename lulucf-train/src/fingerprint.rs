//! Empreintes BLAKE3 des couches produites
//!
//! L'empreinte d'une géométrie ne dépend ni du sommet de départ des anneaux
//! ni de leur sens de parcours. L'empreinte d'une couche ne dépend pas de
//! l'ordre des features ni des identifiants attribués.

use blake3::Hasher;
use geo::{Coord, LineString, MultiPolygon, Winding};
use landcover::stages::identifier::find_identifier;
use landcover::{FeatureLayer, Value};

/// Hash stable d'une géométrie (nulle comprise)
pub fn geometry_hash(geometry: Option<&MultiPolygon>) -> [u8; 32] {
    let mut hasher = Hasher::new();
    match geometry {
        None => {
            hasher.update(b"NULL");
        }
        Some(multi) => {
            hasher.update(b"MULTIPOLYGON");
            for polygon in &multi.0 {
                hasher.update(b"POLY");
                hasher.update(b"EXT");
                hash_ring_normalized(&mut hasher, polygon.exterior());
                for interior in polygon.interiors() {
                    hasher.update(b"INT");
                    hash_ring_normalized(&mut hasher, interior);
                }
            }
        }
    }
    *hasher.finalize().as_bytes()
}

/// Hash un anneau parcouru dans le sens direct, depuis son plus petit sommet
fn hash_ring_normalized(hasher: &mut Hasher, ring: &LineString) {
    let mut coords: Vec<Coord> = ring.0.clone();
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    if coords.is_empty() {
        return;
    }
    if ring.is_cw() {
        coords.reverse();
    }

    let len = coords.len();
    let min_idx = (0..len)
        .min_by(|&a, &b| {
            coords[a]
                .x
                .total_cmp(&coords[b].x)
                .then_with(|| coords[a].y.total_cmp(&coords[b].y))
        })
        .unwrap_or(0);

    for i in 0..len {
        hash_coord(hasher, coords[(min_idx + i) % len]);
    }
}

/// Hash une coordonnée arrondie au millimètre
fn hash_coord(hasher: &mut Hasher, coord: Coord) {
    let x = (coord.x * 1_000.0).round() as i64;
    let y = (coord.y * 1_000.0).round() as i64;
    hasher.update(&x.to_le_bytes());
    hasher.update(&y.to_le_bytes());
}

fn hash_value(hasher: &mut Hasher, value: &Value) {
    match value {
        Value::Null => hasher.update(b"N"),
        Value::Integer(v) => hasher.update(b"I").update(&v.to_le_bytes()),
        // Les surfaces recalculées varient au bruit flottant près
        Value::Double(v) => hasher.update(b"D").update(&((v * 1_000.0).round() as i64).to_le_bytes()),
        Value::Text(s) => hasher.update(b"T").update(s.as_bytes()),
    };
}

/// Empreinte hexadécimale d'une couche
pub fn layer_fingerprint(layer: &FeatureLayer) -> String {
    let id_index = find_identifier(layer.schema());
    let fields: Vec<(usize, &str)> = layer
        .schema()
        .fields()
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != id_index)
        .map(|(i, f)| (i, f.name.as_str()))
        .collect();

    let mut feature_hashes: Vec<[u8; 32]> = layer
        .features()
        .iter()
        .map(|feature| {
            let mut hasher = Hasher::new();
            hasher.update(&geometry_hash(feature.geometry.as_ref()));
            for (index, name) in &fields {
                hasher.update(name.as_bytes());
                hash_value(&mut hasher, feature.value(*index));
            }
            *hasher.finalize().as_bytes()
        })
        .collect();
    feature_hashes.sort_unstable();

    let mut hasher = Hasher::new();
    hasher.update(&(feature_hashes.len() as u64).to_le_bytes());
    for hash in &feature_hashes {
        hasher.update(hash);
    }
    hex::encode(hasher.finalize().as_bytes())
}
