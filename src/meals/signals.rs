use serde_json::Value;

use crate::meals::analyzer::MealAnalysis;
use crate::meals::tagger::MealTags;

/// Protein midpoint (grams) at which an analysed meal counts as protein-rich.
pub const PROTEIN_RICH_GRAMS: f64 = 15.0;

/// The coarse view of a meal that hints and summaries work from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MealSignals {
    pub protein: bool,
    pub veggies: bool,
    pub junk: bool,
}

impl From<&MealTags> for MealSignals {
    fn from(t: &MealTags) -> Self {
        Self {
            protein: t.protein,
            veggies: t.veggies,
            junk: t.junk,
        }
    }
}

impl From<&MealAnalysis> for MealSignals {
    fn from(a: &MealAnalysis) -> Self {
        Self {
            protein: a
                .nutrition
                .protein_g
                .as_ref()
                .is_some_and(|p| p.midpoint() >= PROTEIN_RICH_GRAMS),
            veggies: a.categories.veggies.value,
            junk: a.categories.junk.value,
        }
    }
}

impl MealSignals {
    /// Reads a stored `meals.tags` blob. `None` for `{}` or anything unrecognised.
    pub fn from_blob(blob: &Value) -> Option<Self> {
        if blob.as_object().map_or(true, |o| o.is_empty()) {
            return None;
        }
        if let Ok(tags) = serde_json::from_value::<MealTags>(blob.clone()) {
            return Some(Self::from(&tags));
        }
        serde_json::from_value::<MealAnalysis>(blob.clone())
            .ok()
            .map(|a| Self::from(&a))
    }
}
