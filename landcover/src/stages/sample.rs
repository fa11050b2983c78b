//! Tirage aléatoire stratifié par catégorie LULUCF

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use super::identifier::{identifier_values, resolve_identifier};
use super::PipelineContext;
use crate::legend::{Category, LULUCF_FIELD};
use crate::predicate::Predicate;
use crate::store::LayerStore;
use crate::types::FeatureLayer;
use crate::LandcoverError;

/// Tirage d'une catégorie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySample {
    pub category: Category,
    /// Nombre de polygones disponibles
    pub population: usize,
    pub quota: usize,
    /// Identifiants retenus, dans l'ordre du tirage
    pub selected: Vec<i64>,
}

impl CategorySample {
    pub fn is_underfilled(&self) -> bool {
        self.selected.len() < self.quota
    }
}

/// Résultat complet du tirage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleSelection {
    /// Champ identifiant résolu sur la couche d'entraînement
    pub identifier: String,
    pub categories: Vec<CategorySample>,
}

impl SampleSelection {
    /// Identifiants concaténés par catégorie croissante
    pub fn selected_ids(&self) -> Vec<i64> {
        self.categories
            .iter()
            .flat_map(|c| c.selected.iter().copied())
            .collect()
    }

    pub fn total(&self) -> usize {
        self.categories.iter().map(|c| c.selected.len()).sum()
    }
}

/// Tirage pur : le générateur est initialisé une seule fois avec `seed`,
/// puis chaque liste est mélangée dans l'ordre croissant des catégories
/// du tableau de quotas avant d'en prendre les `quota` premiers.
pub fn select_identifiers(
    groups: &BTreeMap<Category, Vec<i64>>,
    quotas: &BTreeMap<Category, usize>,
    seed: u64,
) -> Vec<CategorySample> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    quotas
        .iter()
        .map(|(&category, &quota)| {
            let mut ids = groups.get(&category).cloned().unwrap_or_default();
            let population = ids.len();
            ids.shuffle(&mut rng);
            ids.truncate(quota);
            CategorySample {
                category,
                population,
                quota,
                selected: ids,
            }
        })
        .collect()
}

/// Regroupe les identifiants par catégorie en une passe ; seules les
/// catégories présentes dans les quotas sont retenues
fn group_by_category(
    layer: &FeatureLayer,
    identifier: &str,
    quotas: &BTreeMap<Category, usize>,
) -> Result<BTreeMap<Category, Vec<i64>>, LandcoverError> {
    let lulucf = layer.field_index(LULUCF_FIELD)?;
    let ids = identifier_values(layer, identifier)?;

    let mut groups: BTreeMap<Category, Vec<i64>> = BTreeMap::new();
    for (feature, id) in layer.features().iter().zip(ids) {
        let category = feature.value(lulucf).as_i64().and_then(Category::from_code);
        if let Some(category) = category.filter(|c| quotas.contains_key(c)) {
            groups.entry(category).or_default().push(id);
        }
    }
    Ok(groups)
}

/// Tire l'échantillon depuis la couche d'entraînement persistée et le
/// persiste sous `outputs.sample`.
///
/// L'ordre des features de l'échantillon est celui de la couche source,
/// pas celui du tirage.
pub fn sample<E, S: LayerStore>(
    ctx: &PipelineContext<'_, E, S>,
) -> Result<(FeatureLayer, SampleSelection), LandcoverError> {
    let train = ctx.store.load(&ctx.outputs.train_data)?;
    let identifier = resolve_identifier(&train)?;

    let groups = group_by_category(&train, &identifier, &ctx.params.quotas)?;
    let categories = select_identifiers(&groups, &ctx.params.quotas, ctx.params.seed);
    for c in categories.iter().filter(|c| c.is_underfilled()) {
        warn!(
            category = %c.category,
            population = c.population,
            quota = c.quota,
            "Fewer polygons than the quota, all are selected"
        );
    }
    let selection = SampleSelection {
        identifier,
        categories,
    };

    let membership = Predicate::is_in(selection.identifier.as_str(), selection.selected_ids());
    let sample = train.view(&membership)?.to_layer(ctx.outputs.sample.as_str());
    ctx.store.save(&ctx.outputs.sample, &sample)?;

    info!(
        identifier = %selection.identifier,
        selected = selection.total(),
        features = sample.len(),
        "Random selection of train data successful"
    );
    Ok((sample, selection))
}
