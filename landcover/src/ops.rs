//! Opérations de couche : découpage, intersection, éclatement, fusion, surface
//!
//! Chaque opération produit une nouvelle couche (identifiants `FID` frais)
//! à partir de vues en lecture seule, sauf [`calculate_area`] qui met à
//! jour la couche par lot.

use geo::{BoundingRect, MultiPolygon, Rect};
use rstar::{RTree, RTreeObject, AABB};
use tracing::debug;

use crate::engine::GeometryEngine;
use crate::types::{FeatureLayer, FieldDef, LayerView, Schema, Value, OID_FIELD};
use crate::LandcoverError;

/// Champ recevant l'identifiant parent lors d'un éclatement
pub const ORIG_FID_FIELD: &str = "ORIG_FID";

/// Boîte englobante indexée dans le R-tree
#[derive(Clone)]
struct IndexedBox {
    index: usize,
    env: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedBox {
    type Envelope = AABB<[f64; 2]>;

    #[inline]
    fn envelope(&self) -> Self::Envelope {
        self.env
    }
}

fn envelope(rect: Rect) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

fn rects_intersect(a: Rect, b: Rect) -> bool {
    a.min().x <= b.max().x && b.min().x <= a.max().x && a.min().y <= b.max().y && b.min().y <= a.max().y
}

/// Fusionne toutes les géométries d'une couche (limite de découpage)
pub fn dissolve<E: GeometryEngine>(engine: &E, layer: &FeatureLayer) -> MultiPolygon {
    let parts: Vec<MultiPolygon> = layer
        .features()
        .iter()
        .filter_map(|f| f.geometry.clone())
        .collect();
    engine.union(&parts)
}

/// Découpe une couche par une limite ; les features vides disparaissent
pub fn clip_layer<E: GeometryEngine>(
    engine: &E,
    layer: &FeatureLayer,
    boundary: &MultiPolygon,
    name: &str,
) -> Result<FeatureLayer, LandcoverError> {
    let mut clipped = FeatureLayer::new(name, layer.carried_fields());
    clipped.set_crs(layer.crs());

    let Some(boundary_rect) = boundary.bounding_rect() else {
        return Ok(clipped);
    };

    for feature in layer.features() {
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        let Some(rect) = geometry.bounding_rect() else {
            continue;
        };
        if !rects_intersect(rect, boundary_rect) {
            continue;
        }
        let result = engine.intersection(geometry, boundary);
        if result.0.is_empty() {
            continue;
        }
        clipped.push(Some(result), layer.carried_values(feature))?;
    }
    Ok(clipped)
}

/// Intersection géométrique de deux couches.
///
/// Schéma produit : `FID`, `FID_<a>`, champs de `a`, `FID_<b>`, champs de `b` ;
/// les noms en collision reçoivent un suffixe `_1`, `_2`...
/// L'ordre de sortie suit `a`, puis l'ordre de `b`.
pub fn intersect_layers<E: GeometryEngine>(
    engine: &E,
    a: &LayerView<'_>,
    b: &LayerView<'_>,
    name: &str,
) -> Result<FeatureLayer, LandcoverError> {
    let (layer_a, layer_b) = (a.layer(), b.layer());

    let mut schema = Schema::new(vec![FieldDef::integer(OID_FIELD)]);
    let mut fields = Vec::new();
    for layer in [layer_a, layer_b] {
        let mut parent_fields = vec![FieldDef::integer(format!("{}_{}", OID_FIELD, layer.name()))];
        parent_fields.extend(layer.carried_fields());
        for mut field in parent_fields {
            field.name = schema.unique_name(&field.name);
            schema = Schema::new(schema.fields().iter().cloned().chain([field.clone()]).collect());
            fields.push(field);
        }
    }
    let mut output = FeatureLayer::new(name, fields);
    output.set_crs(layer_a.crs());

    let b_features: Vec<_> = b.iter().collect();
    let tree = RTree::bulk_load(
        b_features
            .iter()
            .enumerate()
            .filter_map(|(index, f)| {
                let rect = f.geometry.as_ref()?.bounding_rect()?;
                Some(IndexedBox {
                    index,
                    env: envelope(rect),
                })
            })
            .collect(),
    );

    for fa in a.iter() {
        let Some(geometry_a) = &fa.geometry else {
            continue;
        };
        let Some(rect_a) = geometry_a.bounding_rect() else {
            continue;
        };
        let mut candidates: Vec<usize> = tree
            .locate_in_envelope_intersecting(&envelope(rect_a))
            .map(|b| b.index)
            .collect();
        candidates.sort_unstable();

        for index in candidates {
            let fb = b_features[index];
            let Some(geometry_b) = &fb.geometry else {
                continue;
            };
            let overlap = engine.intersection(geometry_a, geometry_b);
            if overlap.0.is_empty() {
                continue;
            }
            let mut values = vec![layer_a.oid_of(fa).map_or(Value::Null, Value::Integer)];
            values.extend(layer_a.carried_values(fa));
            values.push(layer_b.oid_of(fb).map_or(Value::Null, Value::Integer));
            values.extend(layer_b.carried_values(fb));
            output.push(Some(overlap), values)?;
        }
    }

    debug!(
        a = layer_a.name(),
        b = layer_b.name(),
        features = output.len(),
        "Intersection computed"
    );
    Ok(output)
}

/// Éclate les multi-parties : une feature à N parties devient N features,
/// chacune héritant des attributs du parent (et de son identifiant en `ORIG_FID`).
/// Les géométries nulles ou vides sont abandonnées.
pub fn explode(layer: &LayerView<'_>, name: &str) -> Result<FeatureLayer, LandcoverError> {
    let parent = layer.layer();
    let mut fields = parent.carried_fields();
    let orig = FieldDef::integer(Schema::new(fields.clone()).unique_name(ORIG_FID_FIELD));
    fields.push(orig);

    let mut output = FeatureLayer::new(name, fields);
    output.set_crs(parent.crs());

    for feature in layer.iter() {
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        for part in &geometry.0 {
            let mut values = parent.carried_values(feature);
            values.push(parent.oid_of(feature).map_or(Value::Null, Value::Integer));
            output.push(Some(MultiPolygon::new(vec![part.clone()])), values)?;
        }
    }
    Ok(output)
}

/// Fusionne deux couches ; les schémas sont unis par nom de champ
/// (ordre de `a` d'abord), les champs absents d'un côté valent NULL.
pub fn merge(a: &LayerView<'_>, b: &LayerView<'_>, name: &str) -> Result<FeatureLayer, LandcoverError> {
    let mut fields = a.layer().carried_fields();
    for field in b.layer().carried_fields() {
        if Schema::new(fields.clone()).index_of(&field.name).is_none() {
            fields.push(field);
        }
    }
    let schema = Schema::new(fields.clone());

    let mut output = FeatureLayer::new(name, fields);
    output.set_crs(a.layer().crs().or(b.layer().crs()));

    for view in [a, b] {
        let source = view.layer();
        let carried = source.carried_fields();
        let mapping: Vec<Option<usize>> = schema
            .fields()
            .iter()
            .map(|f| carried.iter().position(|c| c.name.eq_ignore_ascii_case(&f.name)))
            .collect();
        for feature in view.iter() {
            let values = source.carried_values(feature);
            let row = mapping
                .iter()
                .map(|m| m.map_or(Value::Null, |i| values[i].clone()))
                .collect();
            output.push(feature.geometry.clone(), row)?;
        }
    }
    Ok(output)
}

/// Calcule la surface planaire (m²) dans `field`, créé au besoin
pub fn calculate_area<E: GeometryEngine>(
    engine: &E,
    layer: &mut FeatureLayer,
    field: &str,
) -> Result<(), LandcoverError> {
    let index = match layer.schema().index_of(field) {
        Some(index) => index,
        None => layer.add_field(FieldDef::double(field), Value::Null)?,
    };
    for feature in layer.features_mut() {
        let area = feature
            .geometry
            .as_ref()
            .map_or(Value::Null, |g| Value::Double(engine.area(g)));
        feature.set(index, area);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::GeoEngine;
    use geo::{Coord, Polygon};

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon {
        Rect::new(Coord { x: x0, y: y0 }, Coord { x: x1, y: y1 }).to_polygon()
    }

    fn layer(name: &str, rows: &[(Polygon, i64)]) -> FeatureLayer {
        let mut layer = FeatureLayer::new(name, vec![FieldDef::integer("lulucf")]);
        for (polygon, code) in rows {
            layer
                .push(
                    Some(MultiPolygon::new(vec![polygon.clone()])),
                    vec![Value::Integer(*code)],
                )
                .unwrap();
        }
        layer
    }

    #[test]
    fn test_intersect_schema_and_values() {
        let engine = GeoEngine::new();
        let a = layer("wc", &[(rect(0.0, 0.0, 10.0, 10.0), 1), (rect(10.0, 0.0, 20.0, 10.0), 3)]);
        let b = layer("dw", &[(rect(5.0, 0.0, 15.0, 10.0), 1)]);

        let out = intersect_layers(&engine, &a.view_all(), &b.view_all(), "inter").unwrap();
        let names: Vec<&str> = out.schema().names().collect();
        assert_eq!(names, vec!["FID", "FID_wc", "lulucf", "FID_dw", "lulucf_1"]);
        assert_eq!(out.len(), 2);

        let first = &out.features()[0];
        assert_eq!(first.value(2), &Value::Integer(1));
        assert_eq!(first.value(4), &Value::Integer(1));
        assert!((engine.area(first.geometry.as_ref().unwrap()) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_touching_polygons_do_not_intersect() {
        let engine = GeoEngine::new();
        let a = layer("a", &[(rect(0.0, 0.0, 10.0, 10.0), 1)]);
        let b = layer("b", &[(rect(10.0, 0.0, 20.0, 10.0), 1)]);
        let out = intersect_layers(&engine, &a.view_all(), &b.view_all(), "inter").unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_explode_multipart() {
        let mut parent = FeatureLayer::new("eroded", vec![FieldDef::integer("lulucf")]);
        parent
            .push(
                Some(MultiPolygon::new(vec![
                    rect(0.0, 0.0, 1.0, 1.0),
                    rect(5.0, 5.0, 6.0, 6.0),
                    rect(9.0, 9.0, 10.0, 10.0),
                ])),
                vec![Value::Integer(4)],
            )
            .unwrap();
        parent.push(None, vec![Value::Integer(2)]).unwrap();

        let single = explode(&parent.view_all(), "single").unwrap();
        assert_eq!(single.len(), 3);
        assert!(single.features().iter().all(|f| !f.is_multipart()));
        let orig = single.field_index(ORIG_FID_FIELD).unwrap();
        let lulucf = single.field_index("lulucf").unwrap();
        assert!(single
            .features()
            .iter()
            .all(|f| f.value(orig) == &Value::Integer(0) && f.value(lulucf) == &Value::Integer(4)));
    }

    #[test]
    fn test_merge_unions_schema() {
        let a = layer("small", &[(rect(0.0, 0.0, 1.0, 1.0), 1)]);
        let mut b = FeatureLayer::new("tiles", vec![FieldDef::text("GRID_ID"), FieldDef::integer("lulucf")]);
        b.push(
            Some(MultiPolygon::new(vec![rect(2.0, 2.0, 3.0, 3.0)])),
            vec![Value::Text("1-1".into()), Value::Integer(5)],
        )
        .unwrap();

        let merged = merge(&a.view_all(), &b.view_all(), "merged").unwrap();
        let names: Vec<&str> = merged.schema().names().collect();
        assert_eq!(names, vec!["FID", "lulucf", "GRID_ID"]);
        assert_eq!(merged.features()[0].value(2), &Value::Null);
        assert_eq!(merged.features()[1].value(1), &Value::Integer(5));
        assert_eq!(merged.oid_of(&merged.features()[1]), Some(1));
    }

    #[test]
    fn test_clip_drops_outside() {
        let engine = GeoEngine::new();
        let l = layer("vec", &[(rect(0.0, 0.0, 10.0, 10.0), 1), (rect(50.0, 50.0, 60.0, 60.0), 2)]);
        let boundary = MultiPolygon::new(vec![rect(5.0, 5.0, 20.0, 20.0)]);
        let clipped = clip_layer(&engine, &l, &boundary, "clip").unwrap();
        assert_eq!(clipped.len(), 1);
        assert!((engine.area(clipped.features()[0].geometry.as_ref().unwrap()) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_calculate_area_recomputes() {
        let engine = GeoEngine::new();
        let mut l = layer("single", &[(rect(0.0, 0.0, 30.0, 60.0), 1)]);
        calculate_area(&engine, &mut l, "area").unwrap();
        let index = l.field_index("area").unwrap();
        assert_eq!(l.features()[0].value(index).as_f64(), Some(1800.0));

        l.features_mut()[0].geometry = Some(MultiPolygon::new(vec![rect(0.0, 0.0, 10.0, 10.0)]));
        calculate_area(&engine, &mut l, "area").unwrap();
        assert_eq!(l.features()[0].value(index).as_f64(), Some(100.0));
    }
}
