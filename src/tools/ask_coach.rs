use async_trait::async_trait;

use super::args::{ToolArgs, ToolName};
use super::{mismatched, ToolContext, ToolHandler, ToolResponse};

pub(super) const APOLOGY: &str =
    "Sorry, I couldn't understand your question. Could you rephrase it?";

const GENERIC_TIP: &str = "Great question! Focus on whole foods, plenty of vegetables and a \
     protein source at every meal. Log what you eat and I'll help you spot patterns.";

/// Keyword groups checked in order; the first hit wins.
const TIPS: &[(&[&str], &str)] = &[
    (
        &["breakfast"],
        "🍳 A good breakfast pairs protein with fibre: eggs with wholegrain toast, Greek yogurt \
         with berries, or oats with nuts.",
    ),
    (
        &["snack"],
        "🥜 Smart snacks: a handful of nuts, fruit with peanut butter, hummus with veggie sticks \
         or a yogurt.",
    ),
    (
        &["water", "hydrat", "drink"],
        "💧 Aim for around 2 litres of water a day, more when it's hot or you train. Keep a \
         bottle nearby.",
    ),
    (
        &["exercise", "workout", "training", "gym"],
        "🏃 Eat a light carb and protein meal 1-2 hours before training and get some protein \
         within a couple of hours after.",
    ),
    (
        &["weight loss", "lose weight", "fat loss"],
        "⚖️ For weight loss, keep a modest calorie deficit, fill half your plate with veggies and \
         keep protein high to stay full.",
    ),
    (
        &["muscle", "gain weight", "bulk"],
        "💪 For muscle gain, spread 20-40 g of protein across 3-5 meals and eat a small calorie \
         surplus.",
    ),
];

/// Picks a canned tip by keyword; falls back to a generic reply.
pub fn coach_reply(question: &str) -> &'static str {
    let q = question.to_lowercase();
    TIPS.iter()
        .find(|(keywords, _)| keywords.iter().any(|k| q.contains(k)))
        .map(|(_, tip)| *tip)
        .unwrap_or(GENERIC_TIP)
}

pub struct AskCoachTool;

#[async_trait]
impl ToolHandler for AskCoachTool {
    fn name(&self) -> ToolName {
        ToolName::AskCoach
    }

    fn apology(&self) -> &'static str {
        APOLOGY
    }

    async fn handle(&self, args: ToolArgs, _ctx: &ToolContext<'_>) -> anyhow::Result<ToolResponse> {
        match args {
            ToolArgs::AskCoach(a) => Ok(ToolResponse::new(coach_reply(&a.question), "coach_reply")),
            other => Ok(mismatched(self, &other)),
        }
    }
}
