use crate::meals::signals::MealSignals;
use crate::users::{FocusArea, Goal, Tone};

enum Hint {
    Junk,
    Protein,
    Veggies,
    Late,
    Goal(Goal),
}

fn text(hint: Hint, tone: Tone) -> &'static str {
    use Tone::*;
    match (hint, tone) {
        (Hint::Junk, Friendly) => "Treats are fine now and then, try pairing the next one with something fresh!",
        (Hint::Junk, Clinical) => "High-processed item detected. Limit frequency and balance with whole foods.",
        (Hint::Junk, Funny) => "Your taste buds had a party. Invite a vegetable to the next one!",

        (Hint::Protein, Friendly) => "Nice! Adding a protein source like eggs, beans or chicken would round this out.",
        (Hint::Protein, Clinical) => "Protein content appears low. Include a lean protein source.",
        (Hint::Protein, Funny) => "Your muscles are asking where the protein went. Send some their way!",

        (Hint::Veggies, Friendly) => "Looks good! A handful of veggies would make it even better.",
        (Hint::Veggies, Clinical) => "No vegetables recorded. Add one to two portions of vegetables.",
        (Hint::Veggies, Funny) => "Plot twist: broccoli wants to be in your next meal.",

        (Hint::Late, Friendly) => "Late bite noted. Try to wrap up eating a bit earlier when you can.",
        (Hint::Late, Clinical) => "Late-evening intake recorded. Earlier meal timing supports sleep quality.",
        (Hint::Late, Funny) => "Midnight snack detected. The fridge light misses you already.",

        (Hint::Goal(Goal::FatLoss), Friendly) => "Keep portions mindful and fill up on veggies.",
        (Hint::Goal(Goal::FatLoss), Clinical) => "Maintain a moderate caloric deficit with high-fibre foods.",
        (Hint::Goal(Goal::FatLoss), Funny) => "Your jeans are cheering quietly.",

        (Hint::Goal(Goal::MuscleGain), Friendly) => "Keep the protein coming to fuel those gains.",
        (Hint::Goal(Goal::MuscleGain), Clinical) => "Distribute protein evenly across meals to support synthesis.",
        (Hint::Goal(Goal::MuscleGain), Funny) => "Gains loading... please keep eating.",

        (Hint::Goal(Goal::Maintenance), Friendly) => "Nice and steady, keep it balanced.",
        (Hint::Goal(Goal::Maintenance), Clinical) => "Intake consistent with maintenance goals.",
        (Hint::Goal(Goal::Maintenance), Funny) => "Balance level: tightrope walker.",

        (Hint::Goal(Goal::General), Friendly) => "Keep it up, every entry helps.",
        (Hint::Goal(Goal::General), Clinical) => "Continue regular logging.",
        (Hint::Goal(Goal::General), Funny) => "Your food diary thanks you.",
    }
}

/// Picks one short hint for a freshly logged meal. The first matching rule wins.
pub fn generate_hint(
    goal: Goal,
    tone: Tone,
    focus: &[FocusArea],
    signals: &MealSignals,
    late: bool,
) -> &'static str {
    let hint = if signals.junk {
        Hint::Junk
    } else if focus.contains(&FocusArea::Protein) && !signals.protein {
        Hint::Protein
    } else if focus.contains(&FocusArea::Veggies) && !signals.veggies {
        Hint::Veggies
    } else if focus.contains(&FocusArea::LateEating) && late {
        Hint::Late
    } else {
        Hint::Goal(goal)
    };
    text(hint, tone)
}
