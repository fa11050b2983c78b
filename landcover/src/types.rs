//! Types de données pour le crate landcover

use std::fmt;
use std::str::FromStr;

use geo::{BoundingRect, Coord, MultiPolygon, Rect};

use crate::predicate::Predicate;
use crate::LandcoverError;

/// Nom du champ identifiant attribué aux couches créées par la chaîne
pub const OID_FIELD: &str = "FID";

/// Type d'un champ attributaire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Double,
    Text,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Integer => "integer",
            FieldType::Double => "double",
            FieldType::Text => "text",
        }
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "integer" | "long" | "short" | "int" => Ok(FieldType::Integer),
            "double" | "float" | "real" => Ok(FieldType::Double),
            "text" | "string" => Ok(FieldType::Text),
            _ => Err(format!("Invalid field type: {}. Use: integer, double, text", s)),
        }
    }
}

/// Définition d'un champ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn double(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Double)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Text)
    }
}

/// Valeur attributaire
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Double(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Schéma ordonné d'une couche
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<FieldDef>,
}

impl Schema {
    pub fn new(fields: Vec<FieldDef>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Index d'un champ (comparaison insensible à la casse, comme les SIG)
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Retourne `base`, ou `base_1`, `base_2`... si le nom est déjà pris
    pub fn unique_name(&self, base: &str) -> String {
        if self.index_of(base).is_none() {
            return base.to_string();
        }
        (1..)
            .map(|i| format!("{}_{}", base, i))
            .find(|candidate| self.index_of(candidate).is_none())
            .unwrap_or_else(|| base.to_string())
    }

    fn push(&mut self, field: FieldDef) -> usize {
        self.fields.push(field);
        self.fields.len() - 1
    }
}

/// Une feature polygonale : géométrie éventuellement nulle + ligne attributaire
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Géométrie (mono ou multi-parties), `None` pour une géométrie nulle
    pub geometry: Option<MultiPolygon>,

    attributes: Vec<Value>,
}

impl Feature {
    pub fn new(geometry: Option<MultiPolygon>, attributes: Vec<Value>) -> Self {
        Self {
            geometry,
            attributes,
        }
    }

    pub fn attributes(&self) -> &[Value] {
        &self.attributes
    }

    pub fn value(&self, index: usize) -> &Value {
        self.attributes.get(index).unwrap_or(&Value::Null)
    }

    pub fn set(&mut self, index: usize, value: Value) {
        if let Some(slot) = self.attributes.get_mut(index) {
            *slot = value;
        }
    }

    pub fn is_multipart(&self) -> bool {
        self.geometry.as_ref().is_some_and(|g| g.0.len() > 1)
    }
}

/// Type de système de coordonnées
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrsKind {
    Projected,
    Geographic,
    Unknown,
}

/// Système de coordonnées d'une couche
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crs {
    /// Code EPSG si connu
    pub epsg: Option<u32>,

    pub kind: CrsKind,

    /// Code EPSG de l'unité linéaire (9001 = mètre)
    pub linear_unit: Option<u16>,
}

/// Codes EPSG projetés de la plage 4000-4999 (le reste de la plage est géographique)
const PROJECTED_IN_GEOGRAPHIC_RANGE: &[(u32, u32)] = &[
    (4026, 4026),
    (4087, 4088),
    (4491, 4554),
    (4568, 4589),
    (4647, 4647),
];

/// Codes EPSG géographiques hors de la plage 4000-4999
const GEOGRAPHIC_OUTSIDE_RANGE: &[u32] = &[6318, 6322, 6325, 6668, 6706, 7844];

/// Type déduit d'un code EPSG seul
fn epsg_kind(epsg: u32) -> CrsKind {
    let in_ranges = |ranges: &[(u32, u32)]| ranges.iter().any(|&(lo, hi)| (lo..=hi).contains(&epsg));
    if (4000..=4999).contains(&epsg) && !in_ranges(PROJECTED_IN_GEOGRAPHIC_RANGE) {
        CrsKind::Geographic
    } else if GEOGRAPHIC_OUTSIDE_RANGE.contains(&epsg) {
        CrsKind::Geographic
    } else {
        CrsKind::Projected
    }
}

/// EPSG:9001, mètre
pub const METRE_UNIT: u16 = 9001;

impl Crs {
    /// Déduit le type depuis un code EPSG seul.
    ///
    /// Les codes 4000-4999 sont géographiques (ou géocentriques) sauf les
    /// quelques projections connues de cette plage. Les rasters ne passent
    /// pas par ici : leur type vient de `GTModelTypeGeoKey`.
    pub fn from_epsg(epsg: u32) -> Self {
        Self {
            epsg: Some(epsg),
            kind: epsg_kind(epsg),
            linear_unit: None,
        }
    }

    /// Vérifie que le CRS est projeté et métrique.
    ///
    /// Les constantes de la chaîne (érosion, tessellation, UMC) sont en mètres
    /// et n'ont aucun sens en degrés. Un CRS déclaré dont le type n'a pas pu
    /// être déterminé est refusé.
    pub fn ensure_metric(&self, layer: &str) -> Result<(), LandcoverError> {
        let epsg = self.epsg.map(|e| format!(" EPSG:{}", e)).unwrap_or_default();
        match self.kind {
            CrsKind::Geographic => Err(LandcoverError::UnsupportedCrs {
                layer: layer.to_string(),
                reason: format!(
                    "geographic CRS{} (degrees), a projected metric CRS is required",
                    epsg
                ),
            }),
            CrsKind::Unknown => Err(LandcoverError::UnsupportedCrs {
                layer: layer.to_string(),
                reason: format!("CRS{} has no model type, cannot check it is projected", epsg),
            }),
            CrsKind::Projected => match self.linear_unit {
                Some(unit) if unit != METRE_UNIT => Err(LandcoverError::UnsupportedCrs {
                    layer: layer.to_string(),
                    reason: format!("linear unit EPSG:{} is not the metre", unit),
                }),
                Some(_) => Ok(()),
                None => {
                    tracing::warn!(layer, epsg = ?self.epsg, "Linear unit unknown, assuming metres");
                    Ok(())
                }
            },
        }
    }
}

/// Collection ordonnée de features partageant un schéma
#[derive(Debug, Clone)]
pub struct FeatureLayer {
    name: String,
    schema: Schema,
    features: Vec<Feature>,
    crs: Option<Crs>,
    oid: Option<usize>,
    next_oid: i64,
}

impl FeatureLayer {
    /// Crée une couche vide avec un champ `FID` numéroté automatiquement
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self::with_oid(name, OID_FIELD, fields)
    }

    /// Crée une couche vide dont l'identifiant porte un autre nom (ex: `OBJECTID`)
    pub fn with_oid(name: impl Into<String>, oid_name: &str, fields: Vec<FieldDef>) -> Self {
        let mut all = Vec::with_capacity(fields.len() + 1);
        all.push(FieldDef::integer(oid_name));
        all.extend(fields);
        Self {
            name: name.into(),
            schema: Schema::new(all),
            features: Vec::new(),
            crs: None,
            oid: Some(0),
            next_oid: 0,
        }
    }

    /// Reconstruit une couche lue depuis un stockage, sans renumérotation
    pub fn from_parts(
        name: impl Into<String>,
        schema: Schema,
        features: Vec<Feature>,
        crs: Option<Crs>,
    ) -> Result<Self, LandcoverError> {
        let name = name.into();
        if let Some(bad) = features
            .iter()
            .find(|f| f.attributes.len() != schema.len())
        {
            return Err(LandcoverError::SchemaMismatch {
                layer: name,
                expected: schema.len(),
                actual: bad.attributes.len(),
            });
        }
        // Un champ `FID` entier relu redevient l'identifiant automatique
        let oid = schema
            .index_of(OID_FIELD)
            .filter(|&i| schema.fields()[i].field_type == FieldType::Integer);
        let next_oid = oid
            .and_then(|i| features.iter().filter_map(|f| f.value(i).as_i64()).max())
            .map_or(0, |max| max + 1);
        Ok(Self {
            name,
            schema,
            features,
            crs,
            oid,
            next_oid,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn features_mut(&mut self) -> &mut [Feature] {
        &mut self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn crs(&self) -> Option<Crs> {
        self.crs
    }

    pub fn set_crs(&mut self, crs: Option<Crs>) {
        self.crs = crs;
    }

    /// Index d'un champ, erreur s'il est absent
    pub fn field_index(&self, name: &str) -> Result<usize, LandcoverError> {
        self.schema
            .index_of(name)
            .ok_or_else(|| LandcoverError::missing_field(&self.name, name))
    }

    /// Champs recopiés vers une couche dérivée (tout sauf l'identifiant auto)
    pub fn carried_fields(&self) -> Vec<FieldDef> {
        self.schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != self.oid)
            .map(|(_, f)| f.clone())
            .collect()
    }

    /// Valeurs correspondant à [`Self::carried_fields`] pour une feature
    pub fn carried_values(&self, feature: &Feature) -> Vec<Value> {
        feature
            .attributes
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != self.oid)
            .map(|(_, v)| v.clone())
            .collect()
    }

    /// Identifiant automatique d'une feature de cette couche
    pub fn oid_of(&self, feature: &Feature) -> Option<i64> {
        self.oid.and_then(|i| feature.value(i).as_i64())
    }

    /// Ajoute une feature ; `values` exclut l'identifiant, attribué ici
    pub fn push(
        &mut self,
        geometry: Option<MultiPolygon>,
        mut values: Vec<Value>,
    ) -> Result<i64, LandcoverError> {
        let oid = self.next_oid;
        if let Some(index) = self.oid {
            values.insert(index.min(values.len()), Value::Integer(oid));
        }
        if values.len() != self.schema.len() {
            return Err(LandcoverError::SchemaMismatch {
                layer: self.name.clone(),
                expected: self.schema.len(),
                actual: values.len(),
            });
        }
        self.features.push(Feature::new(geometry, values));
        self.next_oid += 1;
        Ok(oid)
    }

    /// Ajoute un champ et initialise toutes les lignes avec `default`
    pub fn add_field(&mut self, field: FieldDef, default: Value) -> Result<usize, LandcoverError> {
        if self.schema.index_of(&field.name).is_some() {
            return Err(LandcoverError::DuplicateField {
                layer: self.name.clone(),
                field: field.name,
            });
        }
        let index = self.schema.push(field);
        for feature in &mut self.features {
            feature.attributes.push(default.clone());
        }
        Ok(index)
    }

    /// Sélection non destructive
    pub fn view(&self, predicate: &Predicate) -> Result<LayerView<'_>, LandcoverError> {
        let compiled = predicate.compile(self)?;
        let indices = self
            .features
            .iter()
            .enumerate()
            .filter(|(_, f)| compiled.matches(f))
            .map(|(i, _)| i)
            .collect();
        Ok(LayerView {
            layer: self,
            indices,
        })
    }

    pub fn view_all(&self) -> LayerView<'_> {
        LayerView {
            layer: self,
            indices: (0..self.features.len()).collect(),
        }
    }

    /// Conserve uniquement les features qui satisfont le prédicat.
    /// Retourne le nombre de features supprimées.
    pub fn retain(&mut self, predicate: &Predicate) -> Result<usize, LandcoverError> {
        let compiled = predicate.compile(self)?;
        let before = self.features.len();
        self.features.retain(|f| compiled.matches(f));
        Ok(before - self.features.len())
    }

    /// Conserve les features selon une fonction arbitraire
    pub fn retain_features(&mut self, mut keep: impl FnMut(&Feature) -> bool) -> usize {
        let before = self.features.len();
        self.features.retain(|f| keep(f));
        before - self.features.len()
    }

    /// Emprise de toutes les géométries non nulles
    pub fn extent(&self) -> Option<Rect> {
        self.view_all().extent()
    }
}

/// Vue filtrée d'une couche (indices, pas de copie)
#[derive(Debug, Clone)]
pub struct LayerView<'a> {
    layer: &'a FeatureLayer,
    indices: Vec<usize>,
}

impl<'a> LayerView<'a> {
    pub fn layer(&self) -> &'a FeatureLayer {
        self.layer
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Feature> + '_ {
        let layer = self.layer;
        self.indices.iter().map(move |&i| &layer.features[i])
    }

    /// Emprise des géométries de la vue, `None` si la vue est vide
    pub fn extent(&self) -> Option<Rect> {
        self.iter()
            .filter_map(|f| f.geometry.as_ref())
            .filter_map(|g| g.bounding_rect())
            .reduce(|a, b| {
                Rect::new(
                    Coord {
                        x: a.min().x.min(b.min().x),
                        y: a.min().y.min(b.min().y),
                    },
                    Coord {
                        x: a.max().x.max(b.max().x),
                        y: a.max().y.max(b.max().y),
                    },
                )
            })
    }

    /// Matérialise la vue en nouvelle couche (identifiants conservés)
    pub fn to_layer(&self, name: impl Into<String>) -> FeatureLayer {
        let features: Vec<Feature> = self.iter().cloned().collect();
        let next_oid = self
            .layer
            .oid
            .and_then(|i| features.iter().filter_map(|f| f.value(i).as_i64()).max())
            .map_or(0, |max| max + 1);
        FeatureLayer {
            name: name.into(),
            schema: self.layer.schema.clone(),
            features,
            crs: self.layer.crs,
            oid: self.layer.oid,
            next_oid,
        }
    }
}
