// SPDX-License-Identifier: MIT

//! Keyword rule tables for travel and food suggestions
//!
//! Rules are checked in order; the first rule with a keyword contained in the
//! text wins, otherwise the fallback applies. Matching ignores case.

use serde::{Deserialize, Serialize};

pub const INDOOR_ATTRACTIONS: &str =
    "Visit indoor attractions like museums, art galleries, or enjoy a day at the mall.";
pub const COZY_INDOORS: &str =
    "Consider activities like visiting an aquarium, a science center, or enjoying a cozy café.";
pub const STAY_SAFE: &str =
    "Stay safe indoors. Enjoy a good book, watch a movie, or try indoor yoga.";
pub const WINTER_INDOORS: &str = "Explore indoor winter activities like skating in an indoor rink or sipping hot chocolate by a fireplace.";
pub const OUTDOOR_ACTIVITIES: &str =
    "Enjoy outdoor activities like hiking, biking, or a picnic in the park!";

pub const PACK_SNACKS: &str = "Pack some easy-to-carry snacks like sandwiches, granola bars, and fresh fruit. Don't forget plenty of water!";
pub const COMFORT_FOOD: &str = "Warm up with comfort food like soups, hot beverages, or enjoy a cozy brunch at a nearby bakery.";
pub const HEARTY_MEALS: &str =
    "Enjoy hearty meals like stews, hot chocolate, or baked goods to keep you warm.";
pub const STREET_FOOD: &str =
    "Explore the local street food scene or grab a quick bite from food trucks in the area.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Any of these, as a substring, selects the rule
    pub keywords: Vec<String>,
    pub outcome: String,
}

impl Rule {
    /// Case-insensitive, unlike a plain `contains`: "Cloudy" matches `cloudy`
    fn matches(&self, lowered: &str) -> bool {
        self.keywords
            .iter()
            .any(|k| lowered.contains(&k.to_lowercase()))
    }
}

/// Ordered keyword rules with a fallback outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTable {
    pub rules: Vec<Rule>,
    pub fallback: String,
}

impl RuleTable {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            rules: Vec::new(),
            fallback: fallback.into(),
        }
    }

    pub fn rule(mut self, keywords: &[&str], outcome: impl Into<String>) -> Self {
        self.rules.push(Rule {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            outcome: outcome.into(),
        });
        self
    }

    /// Index of the first matching rule, `None` when the fallback applies
    pub fn matching_rule(&self, text: &str) -> Option<usize> {
        let lowered = text.to_lowercase();
        self.rules.iter().position(|r| r.matches(&lowered))
    }

    pub fn evaluate(&self, text: &str) -> &str {
        match self.matching_rule(text) {
            Some(i) => &self.rules[i].outcome,
            None => &self.fallback,
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }
}

/// Weather description to activity recommendation
pub fn travel_rules() -> RuleTable {
    RuleTable::new(OUTDOOR_ACTIVITIES)
        .rule(&["rain"], INDOOR_ATTRACTIONS)
        .rule(&["cloudy"], COZY_INDOORS)
        .rule(&["storm", "thunder"], STAY_SAFE)
        .rule(&["snow"], WINTER_INDOORS)
        .rule(&["misty"], INDOOR_ATTRACTIONS)
}

/// Activity recommendation to food suggestion
pub fn food_rules() -> RuleTable {
    RuleTable::new(STREET_FOOD)
        .rule(&["outdoor"], PACK_SNACKS)
        .rule(&["cloudy"], COMFORT_FOOD)
        .rule(&["snow", "rain", "misty"], HEARTY_MEALS)
}
