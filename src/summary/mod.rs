use std::sync::Arc;

use serde::Serialize;
use time::{Date, UtcOffset};
use uuid::Uuid;

use crate::clock::day_bounds;
use crate::meals::{is_late_hour, MealSignals};
use crate::store::Store;
use crate::users::repo_types::DEFAULT_LATE_HOUR;
use crate::users::Tone;

pub const NO_MEALS_SUGGESTION: &str = "Remember to log your meals tomorrow!";
pub const LATE_MEALS_SUGGESTION: &str = "Try to finish eating earlier in the evening.";
pub const VEGGIES_SUGGESTION: &str = "Add more vegetables to your meals.";
pub const PROTEIN_SUGGESTION: &str = "Include a protein source in more of your meals.";
pub const JUNK_SUGGESTION: &str = "Cut back on junk food and processed snacks.";
pub const POSITIVE_SUGGESTION: &str = "Great job! Keep up the balanced eating.";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Summary {
    pub date: Date,
    pub meals_count: usize,
    pub late_meals_count: usize,
    pub veggies_ratio: f64,
    pub protein_ratio: f64,
    pub junk_ratio: f64,
    pub suggestions: Vec<String>,
}

#[derive(Clone)]
pub struct SummaryComposer {
    store: Arc<dyn Store>,
    offset: UtcOffset,
}

impl SummaryComposer {
    pub fn new(store: Arc<dyn Store>, offset: UtcOffset) -> Self {
        Self { store, offset }
    }

    /// Aggregates the meals logged on `date` (local calendar day).
    pub async fn compose(&self, user_id: Uuid, date: Date) -> anyhow::Result<Summary> {
        let (start, end) = day_bounds(date, self.offset);
        let meals = self.store.list_meals_between(user_id, start, end).await?;
        let late_hour = self
            .store
            .get_preferences(user_id)
            .await?
            .map(|p| p.late_hour())
            .unwrap_or(DEFAULT_LATE_HOUR);

        if meals.is_empty() {
            return Ok(Summary {
                date,
                meals_count: 0,
                late_meals_count: 0,
                veggies_ratio: 0.0,
                protein_ratio: 0.0,
                junk_ratio: 0.0,
                suggestions: vec![NO_MEALS_SUGGESTION.to_string()],
            });
        }

        let late_meals_count = meals
            .iter()
            .filter(|m| is_late_hour(m.created_at.to_offset(self.offset).hour(), late_hour))
            .count();

        let signals: Vec<MealSignals> = meals
            .iter()
            .filter_map(|m| MealSignals::from_blob(&m.tags))
            .collect();
        let ratio = |pred: fn(&MealSignals) -> bool| {
            if signals.is_empty() {
                0.0
            } else {
                signals.iter().filter(|s| pred(s)).count() as f64 / signals.len() as f64
            }
        };
        let veggies_ratio = ratio(|s| s.veggies);
        let protein_ratio = ratio(|s| s.protein);
        let junk_ratio = ratio(|s| s.junk);

        Ok(Summary {
            date,
            meals_count: meals.len(),
            late_meals_count,
            veggies_ratio,
            protein_ratio,
            junk_ratio,
            suggestions: suggestions(late_meals_count, veggies_ratio, protein_ratio, junk_ratio),
        })
    }
}

fn suggestions(late: usize, veggies: f64, protein: f64, junk: f64) -> Vec<String> {
    let rules: [(bool, &str); 4] = [
        (late > 0, LATE_MEALS_SUGGESTION),
        (veggies < 0.5, VEGGIES_SUGGESTION),
        (protein < 0.6, PROTEIN_SUGGESTION),
        (junk > 0.3, JUNK_SUGGESTION),
    ];
    let out: Vec<String> = rules
        .iter()
        .filter(|(fires, _)| *fires)
        .map(|(_, text)| text.to_string())
        .collect();
    if out.is_empty() {
        vec![POSITIVE_SUGGESTION.to_string()]
    } else {
        out
    }
}

fn percent(ratio: f64) -> i64 {
    (ratio * 100.0).round() as i64
}

/// Renders a summary for WhatsApp; only the header and tips label vary by tone.
pub fn format_summary_text(summary: &Summary, tone: Tone) -> String {
    let (header, tips_label) = match tone {
        Tone::Friendly => ("🌟 Your Daily Summary", "💡 Tips"),
        Tone::Clinical => ("📊 Daily Nutrition Report", "📋 Recommendations"),
        Tone::Funny => ("🎉 Your Food Adventure Recap", "💡 Tips"),
    };

    let mut text = format!(
        "{header} ({date})\n\n\
         🍽️ Meals logged: {meals}\n\
         🌙 Late meals: {late}\n\
         🥦 Veggies: {veg}%\n\
         🍗 Protein: {protein}%\n\
         🍟 Junk food: {junk}%\n\n\
         {tips_label}:",
        date = summary.date,
        meals = summary.meals_count,
        late = summary.late_meals_count,
        veg = percent(summary.veggies_ratio),
        protein = percent(summary.protein_ratio),
        junk = percent(summary.junk_ratio),
    );
    for s in &summary.suggestions {
        text.push_str("\n• ");
        text.push_str(s);
    }
    text
}
