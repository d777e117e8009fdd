//! Cost of a ticket as a function of its text and the form's pricing rule.

/// How a form charges for a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingRule {
    /// A fixed amount of sats regardless of the text.
    FlatRate { amount: u64 },
    /// A fixed amount of sats for every word of the text.
    PerWord { amount_per_word: u64 },
}

impl PricingRule {
    /// Builds the rule from the `flatrate`/`amount` pair stored on a form.
    pub fn from_form_fields(flatrate: bool, amount: u64) -> Self {
        if flatrate {
            PricingRule::FlatRate { amount }
        } else {
            PricingRule::PerWord {
                amount_per_word: amount,
            }
        }
    }

    /// Returns the cost in sats of submitting `text`.
    pub fn cost(&self, text: &str) -> u64 {
        match *self {
            PricingRule::FlatRate { amount } => amount,
            PricingRule::PerWord { amount_per_word } => {
                word_count(text).saturating_mul(amount_per_word)
            }
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, PricingRule::FlatRate { .. })
    }

    pub fn amount(&self) -> u64 {
        match *self {
            PricingRule::FlatRate { amount } => amount,
            PricingRule::PerWord { amount_per_word } => amount_per_word,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PricingRule::FlatRate { .. } => "Charge flat rate",
            PricingRule::PerWord { .. } => "Charge per word",
        }
    }
}

/// Counts words after trimming and collapsing whitespace runs.
pub fn word_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

/// The amount shown to the submitter, e.g. `"8 Sats to pay"`.
pub fn amount_label(sats: u64) -> String {
    format!("{} Sats to pay", sats)
}
