//! Légendes LULUCF et reclassification des codes natifs

use std::collections::BTreeMap;
use std::fmt;

use tracing::info;

use crate::types::{FeatureLayer, FieldDef, Value};
use crate::LandcoverError;

/// Champ portant le code natif issu de la vectorisation
pub const GRIDCODE_FIELD: &str = "gridcode";

/// Champ portant la catégorie LULUCF unifiée
pub const LULUCF_FIELD: &str = "lulucf";

/// Catégorie LULUCF unifiée
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Forest = 1,
    Cropland = 2,
    Grassland = 3,
    Wetlands = 4,
    Settlements = 5,
    /// Non classé ou désaccord (sentinelle 99)
    Unclassified = 99,
}

impl Category {
    /// Les cinq classes valides, par ordre croissant
    pub const CLASSIFIED: [Category; 5] = [
        Category::Forest,
        Category::Cropland,
        Category::Grassland,
        Category::Wetlands,
        Category::Settlements,
    ];

    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Category::Forest),
            2 => Some(Category::Cropland),
            3 => Some(Category::Grassland),
            4 => Some(Category::Wetlands),
            5 => Some(Category::Settlements),
            99 => Some(Category::Unclassified),
            _ => None,
        }
    }

    pub fn is_classified(self) -> bool {
        self != Category::Unclassified
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Forest => "Forest land",
            Category::Cropland => "Cropland",
            Category::Grassland => "Grassland",
            Category::Wetlands => "Wetlands",
            Category::Settlements => "Settlements",
            Category::Unclassified => "Unclassified",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.code())
    }
}

/// Correspondance code natif -> catégorie LULUCF pour une source raster
#[derive(Debug, Clone, Copy)]
pub struct Legend {
    pub name: &'static str,
    entries: &'static [(i64, Category)],
}

/// ESA WorldCover
pub const WORLD_COVER: Legend = Legend {
    name: "ESA WorldCover",
    entries: &[
        (10, Category::Forest),
        (20, Category::Unclassified),
        (30, Category::Grassland),
        (40, Category::Cropland),
        (50, Category::Settlements),
        (60, Category::Unclassified),
        (80, Category::Wetlands),
        (90, Category::Wetlands),
    ],
};

/// Google Dynamic World
pub const DYNAMIC_WORLD: Legend = Legend {
    name: "Dynamic World",
    entries: &[
        (0, Category::Wetlands),
        (1, Category::Forest),
        (2, Category::Grassland),
        (3, Category::Wetlands),
        (4, Category::Cropland),
        (5, Category::Unclassified),
        (6, Category::Settlements),
        (7, Category::Unclassified),
        (8, Category::Unclassified),
    ],
};

impl Legend {
    /// Catégorie d'un code natif ; code absent ou nul => 99
    pub fn category(&self, code: Option<i64>) -> Category {
        code.and_then(|c| {
            self.entries
                .iter()
                .find(|(native, _)| *native == c)
                .map(|(_, category)| *category)
        })
        .unwrap_or(Category::Unclassified)
    }

    pub fn entries(&self) -> &'static [(i64, Category)] {
        self.entries
    }
}

/// Bilan d'une reclassification
#[derive(Debug, Clone, Default)]
pub struct RemapStats {
    /// Nombre de features par catégorie
    pub by_category: BTreeMap<Category, usize>,
    /// Codes natifs absents de la légende (ou nuls)
    pub unmapped: usize,
}

/// Reclassification pure : codes natifs -> catégories
pub fn remap_codes(codes: &[Option<i64>], legend: &Legend) -> Vec<Category> {
    codes.iter().map(|&code| legend.category(code)).collect()
}

/// Ajoute le champ `lulucf` et le renseigne pour chaque feature (mise à jour par lot)
pub fn remap(layer: &mut FeatureLayer, legend: &Legend) -> Result<RemapStats, LandcoverError> {
    let gridcode = layer.field_index(GRIDCODE_FIELD)?;
    let codes: Vec<Option<i64>> = layer
        .features()
        .iter()
        .map(|f| f.value(gridcode).as_i64())
        .collect();
    let categories = remap_codes(&codes, legend);

    let lulucf = layer.add_field(FieldDef::integer(LULUCF_FIELD), Value::Null)?;

    let mut stats = RemapStats::default();
    for ((feature, category), code) in layer
        .features_mut()
        .iter_mut()
        .zip(categories)
        .zip(&codes)
    {
        feature.set(lulucf, Value::Integer(category.code()));
        *stats.by_category.entry(category).or_default() += 1;
        if code.map_or(true, |c| !legend.entries.iter().any(|(n, _)| *n == c)) {
            stats.unmapped += 1;
        }
    }

    info!(
        layer = layer.name(),
        legend = legend.name,
        features = layer.len(),
        unmapped = stats.unmapped,
        "Successful update of LULUCF values"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_cover_legend() {
        assert_eq!(WORLD_COVER.category(Some(10)), Category::Forest);
        assert_eq!(WORLD_COVER.category(Some(40)), Category::Cropland);
        assert_eq!(WORLD_COVER.category(Some(90)), Category::Wetlands);
        assert_eq!(WORLD_COVER.category(Some(20)), Category::Unclassified);
        // 95 (mangroves) et 100 (mousses) ne sont pas dans la légende
        assert_eq!(WORLD_COVER.category(Some(95)), Category::Unclassified);
        assert_eq!(WORLD_COVER.category(None), Category::Unclassified);
    }

    #[test]
    fn test_dynamic_world_legend() {
        assert_eq!(DYNAMIC_WORLD.category(Some(0)), Category::Wetlands);
        assert_eq!(DYNAMIC_WORLD.category(Some(1)), Category::Forest);
        assert_eq!(DYNAMIC_WORLD.category(Some(6)), Category::Settlements);
        assert_eq!(DYNAMIC_WORLD.category(Some(5)), Category::Unclassified);
        assert_eq!(DYNAMIC_WORLD.category(Some(9)), Category::Unclassified);
    }

    #[test]
    fn test_remap_adds_field_and_is_complete() {
        let mut layer = FeatureLayer::new("world_cover", vec![FieldDef::integer(GRIDCODE_FIELD)]);
        for code in [Value::Integer(10), Value::Integer(20), Value::Integer(77), Value::Null] {
            layer.push(None, vec![code]).unwrap();
        }

        let stats = remap(&mut layer, &WORLD_COVER).unwrap();
        let lulucf = layer.field_index(LULUCF_FIELD).unwrap();

        let values: Vec<i64> = layer
            .features()
            .iter()
            .map(|f| f.value(lulucf).as_i64().unwrap())
            .collect();
        assert_eq!(values, vec![1, 99, 99, 99]);
        assert!(values
            .iter()
            .all(|&v| Category::from_code(v).is_some()));
        assert_eq!(stats.unmapped, 2);
        assert_eq!(stats.by_category[&Category::Unclassified], 3);
    }

    #[test]
    fn test_remap_requires_gridcode() {
        let mut layer = FeatureLayer::new("raw", vec![FieldDef::integer("value")]);
        assert!(remap(&mut layer, &DYNAMIC_WORLD).is_err());
    }

    #[test]
    fn test_unclassified_is_not_below_ten() {
        assert!(Category::Unclassified.code() >= 10);
        assert!(Category::CLASSIFIED.iter().all(|c| c.code() < 10));
    }
}
