//! Offline keyword tagging of free-text meal descriptions.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CarbsLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Noon,
    Evening,
    Late,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MealTags {
    pub protein: bool,
    pub veggies: bool,
    pub carbs: CarbsLevel,
    pub junk: bool,
    pub time_of_day: TimeOfDay,
}

/// Keywords matched as plain substrings, so "cheeseburger" hits both "cheese" and "burger".
/// `except` names longer words that are blanked out first ("peach" is not a "pea").
struct KeywordSet {
    words: Regex,
    except: Option<Regex>,
}

impl KeywordSet {
    fn new(words: &[&str], except: &[&str]) -> Self {
        Self {
            words: alternation(words),
            except: (!except.is_empty()).then(|| alternation(except)),
        }
    }

    fn is_match(&self, text: &str) -> bool {
        match &self.except {
            Some(except) => self.words.is_match(&except.replace_all(text, " ")),
            None => self.words.is_match(text),
        }
    }
}

fn alternation(words: &[&str]) -> Regex {
    let pattern = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&pattern).unwrap()
}

lazy_static! {
    static ref PROTEIN: KeywordSet = KeywordSet::new(
        &[
            "chicken", "beef", "steak", "pork", "turkey", "lamb", "fish", "salmon", "tuna", "cod",
            "shrimp", "prawn", "egg", "tofu", "tempeh", "lentil", "bean", "chickpea", "yogurt",
            "yoghurt", "cottage cheese", "cheese", "protein", "ham", "seitan",
        ],
        &[],
    );
    static ref VEGGIES: KeywordSet = KeywordSet::new(
        &[
            "salad", "broccoli", "spinach", "kale", "lettuce", "carrot", "tomato", "cucumber",
            "pepper", "zucchini", "cauliflower", "cabbage", "asparagus", "green bean", "pea",
            "onion", "mushroom", "vegetable", "veggie", "greens", "eggplant", "celery", "beet",
        ],
        &["peach", "peanut", "pear", "pepperoni"],
    );
    static ref JUNK: KeywordSet = KeywordSet::new(
        &[
            "pizza", "burger", "fries", "chips", "crisps", "soda", "coke", "candy", "donut",
            "doughnut", "cake", "cookie", "chocolate bar", "ice cream", "fast food", "hot dog",
            "nugget", "energy drink",
        ],
        &[],
    );
    static ref CARBS_HIGH: KeywordSet = KeywordSet::new(
        &[
            "pasta", "spaghetti", "rice", "bread", "pizza", "potato", "fries", "noodle", "bagel",
            "croissant", "cake", "donut", "pastry", "cereal", "sugar", "pancake", "waffle",
            "tortilla", "burrito",
        ],
        &[],
    );
    static ref CARBS_MEDIUM: KeywordSet = KeywordSet::new(
        &[
            "oat", "oatmeal", "quinoa", "sweet potato", "fruit", "banana", "apple", "corn",
            "lentil", "bean", "chickpea", "couscous", "wholegrain", "whole grain", "granola",
        ],
        &["goat", "boat", "coat"],
    );
    static ref CARBS_LOW: KeywordSet = KeywordSet::new(
        &[
            "salad", "egg", "chicken", "fish", "steak", "broccoli", "spinach", "cheese", "nut",
            "avocado", "tofu", "salmon", "tuna", "greens",
        ],
        &[],
    );
}

/// Tags a meal description. `hour` is the local hour the meal was eaten.
pub fn tag_meal(text: &str, hour: u8) -> MealTags {
    let text = text.to_lowercase();
    MealTags {
        protein: PROTEIN.is_match(&text),
        veggies: VEGGIES.is_match(&text),
        carbs: carbs_level(&text),
        junk: JUNK.is_match(&text),
        time_of_day: time_of_day(hour),
    }
}

/// High beats medium beats low; no match at all reads as medium.
fn carbs_level(text: &str) -> CarbsLevel {
    if CARBS_HIGH.is_match(text) {
        CarbsLevel::High
    } else if CARBS_MEDIUM.is_match(text) {
        CarbsLevel::Medium
    } else if CARBS_LOW.is_match(text) {
        CarbsLevel::Low
    } else {
        CarbsLevel::Medium
    }
}

pub fn time_of_day(hour: u8) -> TimeOfDay {
    match hour {
        5..=10 => TimeOfDay::Morning,
        11..=16 => TimeOfDay::Noon,
        17..=20 => TimeOfDay::Evening,
        _ => TimeOfDay::Late,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grilled_chicken_and_salad() {
        let tags = tag_meal("Grilled chicken and salad", 13);
        assert!(tags.protein);
        assert!(tags.veggies);
        assert!(!tags.junk);
        assert_eq!(tags.carbs, CarbsLevel::Low);
        assert_eq!(tags.time_of_day, TimeOfDay::Noon);
    }

    #[test]
    fn protein_keyword_always_marks_protein() {
        for text in ["chicken wrap", "two eggs", "Salmon sushi", "tofu stir fry"] {
            assert!(tag_meal(text, 12).protein, "{text}");
        }
    }

    #[test]
    fn carbs_default_to_medium_without_keywords() {
        assert_eq!(tag_meal("a glass of water", 9).carbs, CarbsLevel::Medium);
    }

    #[test]
    fn carbs_high_wins_over_low() {
        assert_eq!(tag_meal("chicken with rice", 19).carbs, CarbsLevel::High);
        assert_eq!(tag_meal("oatmeal with nuts", 8).carbs, CarbsLevel::Medium);
    }

    #[test]
    fn junk_detection() {
        let tags = tag_meal("Pizza and a coke", 22);
        assert!(tags.junk);
        assert_eq!(tags.carbs, CarbsLevel::High);
        assert_eq!(tags.time_of_day, TimeOfDay::Late);
    }

    #[test]
    fn keywords_match_inside_compound_words() {
        let burger = tag_meal("cheeseburger", 12);
        assert!(burger.protein);
        assert!(burger.junk);
        assert!(tag_meal("hamburger", 12).protein);
        assert!(tag_meal("chickenburger", 12).protein);
        assert!(tag_meal("fishcakes", 12).protein);
        assert!(tag_meal("cheesecake", 12).junk);
        assert!(tag_meal("scrambled eggs", 8).protein);
    }

    #[test]
    fn excluded_words_do_not_trip_shorter_keywords() {
        assert!(!tag_meal("peach", 10).veggies);
        assert!(!tag_meal("peanut butter toast", 10).veggies);
        assert!(tag_meal("peach and peas", 10).veggies);
        assert_eq!(tag_meal("goat cheese", 10).carbs, CarbsLevel::Low);
    }

    #[test]
    fn time_buckets_are_half_open() {
        assert_eq!(time_of_day(4), TimeOfDay::Late);
        assert_eq!(time_of_day(5), TimeOfDay::Morning);
        assert_eq!(time_of_day(10), TimeOfDay::Morning);
        assert_eq!(time_of_day(11), TimeOfDay::Noon);
        assert_eq!(time_of_day(17), TimeOfDay::Evening);
        assert_eq!(time_of_day(20), TimeOfDay::Evening);
        assert_eq!(time_of_day(21), TimeOfDay::Late);
        assert_eq!(time_of_day(0), TimeOfDay::Late);
    }

    #[test]
    fn tags_serialize_with_snake_case_keys() {
        let json = serde_json::to_value(tag_meal("grilled chicken and salad", 13)).unwrap();
        assert_eq!(json["protein"], true);
        assert_eq!(json["veggies"], true);
        assert_eq!(json["time_of_day"], "noon");
    }
}
