use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::item::ItemResponse;

/// Categories offered when listing an item.
pub const ITEM_TYPES: [&str; 8] = [
    "Ball Sports",
    "Fitness & Gym",
    "Water Sports",
    "Winter Sports",
    "Racquet Sports",
    "Outdoor & Adventure",
    "Track & Field",
    "Martial Arts & Boxing",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    New,
    Used,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::New => "New",
            Condition::Used => "Used",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(Condition::New),
            "used" => Ok(Condition::Used),
            _ => Err(format!(
                "Invalid condition '{}'. Valid options: new, used",
                s
            )),
        }
    }
}

/// Resolves user input to one of [`ITEM_TYPES`], ignoring case.
pub fn parse_item_type(s: &str) -> Result<&'static str, String> {
    ITEM_TYPES
        .iter()
        .find(|t| t.eq_ignore_ascii_case(s.trim()))
        .copied()
        .ok_or_else(|| {
            format!(
                "Invalid item type '{}'. Valid options: {}",
                s,
                ITEM_TYPES.join(", ")
            )
        })
}

/// Filters a fetched list by [`ItemResponse::matches`], keeping order.
pub fn search<'a>(items: &'a [ItemResponse], query: &str) -> Vec<&'a ItemResponse> {
    items.iter().filter(|item| item.matches(query)).collect()
}
