//! Lecture et écriture des couches en GeoJSON
//!
//! L'écriture est en streaming avec geozero. Deux membres étrangers
//! accompagnent la FeatureCollection : `crs` (URN EPSG) et `fields`
//! (schéma ordonné et typé), pour qu'une couche relue retrouve l'ordre
//! et le type de ses champs.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use geo::MultiPolygon;
use geojson::{GeoJson, JsonObject, JsonValue};
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;

use landcover::{Crs, Feature, FeatureLayer, FieldDef, FieldType, Schema, Value};

const CRS_URN_PREFIX: &str = "urn:ogc:def:crs:EPSG::";

/// Écrit une couche dans un fichier GeoJSON
pub fn export_layer(layer: &FeatureLayer, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)
        .context(format!("Failed to create file: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);
    write_layer(&mut writer, layer)?;
    writer.flush()?;
    Ok(())
}

/// Écrit une couche en FeatureCollection
pub fn write_layer<W: Write>(writer: &mut W, layer: &FeatureLayer) -> Result<()> {
    write!(
        writer,
        r#"{{"type":"FeatureCollection","name":"{}","#,
        escape_json(layer.name())
    )?;

    if let Some(epsg) = layer.crs().and_then(|c| c.epsg) {
        write!(
            writer,
            r#""crs":{{"type":"name","properties":{{"name":"{}{}"}}}},"#,
            CRS_URN_PREFIX, epsg
        )?;
    }

    write!(writer, r#""fields":["#)?;
    for (i, field) in layer.schema().fields().iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write!(
            writer,
            r#"{{"name":"{}","type":"{}"}}"#,
            escape_json(&field.name),
            field.field_type.as_str()
        )?;
    }
    write!(writer, r#"],"features":["#)?;

    for (i, feature) in layer.features().iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write_feature(writer, layer.schema(), feature)?;
    }

    write!(writer, "]}}")?;
    Ok(())
}

/// Écrit une feature ; une géométrie nulle donne `"geometry":null`
fn write_feature<W: Write>(writer: &mut W, schema: &Schema, feature: &Feature) -> Result<()> {
    write!(writer, r#"{{"type":"Feature","geometry":"#)?;
    match &feature.geometry {
        Some(geometry) => {
            let mut geom_buf = Vec::new();
            let mut geom_writer = GeoJsonWriter::new(&mut geom_buf);
            geo::Geometry::MultiPolygon(geometry.clone()).process_geom(&mut geom_writer)?;
            writer.write_all(&geom_buf)?;
        }
        None => write!(writer, "null")?,
    }

    write!(writer, r#","properties":{{"#)?;
    for (i, (field, value)) in schema.fields().iter().zip(feature.attributes()).enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write!(writer, r#""{}":{}"#, escape_json(&field.name), json_value(value))?;
    }
    write!(writer, "}}}}")?;
    Ok(())
}

fn json_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Integer(v) => v.to_string(),
        Value::Double(v) => serde_json::Number::from_f64(*v)
            .map(|n| n.to_string())
            .unwrap_or_else(|| "null".to_string()),
        Value::Text(s) => format!("\"{}\"", escape_json(s)),
    }
}

/// Échappe une chaîne pour JSON
fn escape_json(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c.is_control() => {
                result.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => result.push(c),
        }
    }
    result
}

/// Lit une couche depuis un fichier GeoJSON
pub fn read_layer(path: &Path, name: &str) -> Result<FeatureLayer> {
    let content = std::fs::read_to_string(path)
        .context(format!("Failed to read GeoJSON file: {}", path.display()))?;
    parse_layer(&content, name).context(format!("Invalid GeoJSON layer: {}", path.display()))
}

/// Analyse une FeatureCollection polygonale
pub fn parse_layer(content: &str, name: &str) -> Result<FeatureLayer> {
    let collection = match content.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => collection,
        GeoJson::Feature(feature) => geojson::FeatureCollection {
            bbox: None,
            features: vec![feature],
            foreign_members: None,
        },
        GeoJson::Geometry(_) => bail!("Expected a FeatureCollection, found a bare geometry"),
    };

    let members = collection.foreign_members.as_ref();
    let crs = members.and_then(parse_crs);
    let schema = match members.and_then(|m| m.get("fields")) {
        Some(fields) => parse_fields(fields)?,
        None => infer_schema(collection.features.first().and_then(|f| f.properties.as_ref())),
    };

    let mut features = Vec::with_capacity(collection.features.len());
    for feature in collection.features {
        let geometry = feature.geometry.map(to_multipolygon).transpose()?;
        let attributes = schema
            .fields()
            .iter()
            .map(|field| {
                let raw = feature.properties.as_ref().and_then(|p| p.get(&field.name));
                value_from_json(raw, field.field_type)
            })
            .collect();
        features.push(Feature::new(geometry, attributes));
    }

    Ok(FeatureLayer::from_parts(name, schema, features, crs)?)
}

fn to_multipolygon(geometry: geojson::Geometry) -> Result<MultiPolygon> {
    match geo::Geometry::<f64>::try_from(geometry)? {
        geo::Geometry::Polygon(polygon) => Ok(MultiPolygon::new(vec![polygon])),
        geo::Geometry::MultiPolygon(multi) => Ok(multi),
        _ => bail!("Only Polygon and MultiPolygon geometries are supported"),
    }
}

/// `urn:ogc:def:crs:EPSG::32633` ou `EPSG:32633`
fn parse_crs(members: &JsonObject) -> Option<Crs> {
    let name = members
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()?;
    let code = name.rsplit(':').next()?.parse().ok()?;
    Some(Crs::from_epsg(code))
}

fn parse_fields(fields: &JsonValue) -> Result<Schema> {
    let Some(entries) = fields.as_array() else {
        bail!("\"fields\" member must be an array");
    };
    let mut defs = Vec::with_capacity(entries.len());
    for entry in entries {
        let name = entry
            .get("name")
            .and_then(JsonValue::as_str)
            .context("Field without name")?;
        let field_type: FieldType = entry
            .get("type")
            .and_then(JsonValue::as_str)
            .unwrap_or("text")
            .parse()
            .map_err(anyhow::Error::msg)?;
        defs.push(FieldDef::new(name, field_type));
    }
    Ok(Schema::new(defs))
}

/// Schéma déduit des propriétés de la première feature
fn infer_schema(properties: Option<&JsonObject>) -> Schema {
    let fields = properties
        .into_iter()
        .flatten()
        .map(|(name, value)| {
            let field_type = match value {
                JsonValue::Number(n) if n.is_i64() || n.is_u64() => FieldType::Integer,
                JsonValue::Number(_) => FieldType::Double,
                _ => FieldType::Text,
            };
            FieldDef::new(name.as_str(), field_type)
        })
        .collect();
    Schema::new(fields)
}

fn value_from_json(value: Option<&JsonValue>, field_type: FieldType) -> Value {
    match (value, field_type) {
        (None | Some(JsonValue::Null), _) => Value::Null,
        (Some(v), FieldType::Integer) => v
            .as_i64()
            .or_else(|| v.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map_or(Value::Null, Value::Integer),
        (Some(v), FieldType::Double) => v.as_f64().map_or(Value::Null, Value::Double),
        (Some(JsonValue::String(s)), FieldType::Text) => Value::Text(s.clone()),
        (Some(v), FieldType::Text) => Value::Text(v.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Area};

    fn sample_layer() -> FeatureLayer {
        let mut layer = FeatureLayer::new(
            "train_data",
            vec![
                FieldDef::integer("lulucf"),
                FieldDef::double("area"),
                FieldDef::text("GRID_ID"),
            ],
        );
        layer.set_crs(Some(Crs::from_epsg(32633)));
        layer
            .push(
                Some(MultiPolygon::new(vec![polygon![
                    (x: 0.0, y: 0.0),
                    (x: 100.0, y: 0.0),
                    (x: 100.0, y: 50.0),
                    (x: 0.0, y: 50.0),
                ]])),
                vec![Value::Integer(1), Value::Double(5000.0), Value::Text("1-2".into())],
            )
            .unwrap();
        layer
            .push(None, vec![Value::Integer(3), Value::Null, Value::Text("a \"quoted\" id".into())])
            .unwrap();
        layer
    }

    #[test]
    fn test_write_then_parse_keeps_schema_and_values() {
        let mut buffer = Vec::new();
        write_layer(&mut buffer, &sample_layer()).unwrap();
        let json = String::from_utf8(buffer).unwrap();
        assert!(json.contains("EPSG::32633"));
        assert!(json.contains(r#""type":"FeatureCollection""#));

        let layer = parse_layer(&json, "train_data").unwrap();
        let names: Vec<&str> = layer.schema().names().collect();
        assert_eq!(names, vec!["FID", "lulucf", "area", "GRID_ID"]);
        assert_eq!(layer.crs().and_then(|c| c.epsg), Some(32633));
        assert_eq!(layer.len(), 2);

        let first = &layer.features()[0];
        assert_eq!(first.value(0), &Value::Integer(0));
        assert_eq!(first.value(2), &Value::Double(5000.0));
        assert!((first.geometry.as_ref().unwrap().unsigned_area() - 5000.0).abs() < 1e-9);

        let second = &layer.features()[1];
        assert!(second.geometry.is_none());
        assert!(second.value(2).is_null());
        assert_eq!(second.value(3), &Value::Text("a \"quoted\" id".into()));

        // Le FID relu reste l'identifiant automatique
        assert_eq!(layer.oid_of(first), Some(0));
    }

    #[test]
    fn test_parse_plain_geojson_infers_schema() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {"type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]]},
                "properties": {"name": "Ostrava", "id": 7}
            }]
        }"#;
        let layer = parse_layer(json, "clip").unwrap();
        assert_eq!(layer.len(), 1);
        assert!(layer.crs().is_none());
        let id = layer.field_index("id").unwrap();
        assert_eq!(layer.features()[0].value(id), &Value::Integer(7));
        assert_eq!(layer.features()[0].geometry.as_ref().unwrap().0.len(), 1);
    }

    #[test]
    fn test_non_polygonal_geometry_rejected() {
        let json = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":{"type":"Point","coordinates":[1,2]},"properties":{}}
        ]}"#;
        assert!(parse_layer(json, "clip").is_err());
    }

    #[test]
    fn test_escape_json() {
        assert_eq!(escape_json("hello"), "hello");
        assert_eq!(escape_json("hello\"world"), "hello\\\"world");
        assert_eq!(escape_json("line\nbreak"), "line\\nbreak");
    }

    #[test]
    fn test_export_layer_to_file() {
        let path = std::env::temp_dir().join("lulucf_export_test.geojson");
        export_layer(&sample_layer(), &path).unwrap();
        let layer = read_layer(&path, "train_data").unwrap();
        assert_eq!(layer.len(), 2);
        std::fs::remove_file(path).ok();
    }
}
