pub mod analyzer;
pub mod hints;
pub mod repo;
pub mod repo_types;
pub mod signals;
pub mod tagger;

pub use repo_types::{Meal, NewMeal, SourceType};
pub use signals::MealSignals;

/// True when `hour` falls in the late-eating window: from `late_hour` until 05:00.
pub fn is_late_hour(hour: u8, late_hour: u8) -> bool {
    hour >= late_hour || hour < 5
}
