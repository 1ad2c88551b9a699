use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use super::forest::{Forest, Node, NodeContent};
use super::ids::{CATEGORY_PREFIX, ITEM_PREFIX, IdSource, claim_id};
use super::lenient;

/// Stock status of a pantry item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    ToBuy,
    Stocked,
    NotNeeded,
}

impl ItemStatus {
    /// Parse a status name. Accepts `to_buy`, `to-buy` and `tobuy` spellings.
    pub fn parse_status(s: &str) -> Option<Self> {
        let key: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| *c != '_' && *c != '-' && *c != ' ')
            .collect();
        match key.as_str() {
            "tobuy" | "buy" => Some(ItemStatus::ToBuy),
            "stocked" | "instock" => Some(ItemStatus::Stocked),
            "notneeded" | "skip" => Some(ItemStatus::NotNeeded),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::ToBuy => "to_buy",
            ItemStatus::Stocked => "stocked",
            ItemStatus::NotNeeded => "not_needed",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn lenient_status<'de, D: Deserializer<'de>>(d: D) -> Result<ItemStatus, D::Error> {
    let raw = lenient::string(d)?;
    Ok(ItemStatus::parse_status(&raw).unwrap_or_default())
}

/// A stock item inside a pantry category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: ItemStatus,
    #[serde(default, deserialize_with = "lenient::string")]
    pub notes: String,
}

impl Item {
    pub fn new(id: String, name: String) -> Self {
        Item {
            id,
            name,
            status: ItemStatus::ToBuy,
            notes: String::new(),
        }
    }
}

/// Leaf payload of a pantry category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PantryContent {
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub items: Vec<Item>,
}

impl NodeContent for PantryContent {
    const NODE_PREFIX: &'static str = CATEGORY_PREFIX;

    fn leaf_ids(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.id.as_str()).collect()
    }

    fn normalize(&mut self, ids: &mut dyn IdSource, taken: &mut HashSet<String>) {
        for item in &mut self.items {
            claim_id(&mut item.id, ITEM_PREFIX, ids, taken);
        }
    }
}

pub type PantryCategory = Node<PantryContent>;
pub type PantryForest = Forest<PantryContent>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parsing_is_forgiving() {
        assert_eq!(ItemStatus::parse_status("to_buy"), Some(ItemStatus::ToBuy));
        assert_eq!(ItemStatus::parse_status("Not-Needed"), Some(ItemStatus::NotNeeded));
        assert_eq!(ItemStatus::parse_status("stocked"), Some(ItemStatus::Stocked));
        assert_eq!(ItemStatus::parse_status("eaten"), None);
    }

    #[test]
    fn unknown_status_loads_as_to_buy() {
        let item: Item = serde_json::from_str(r#"{"id":"I-001","name":"Oats","status":"gone"}"#).unwrap();
        assert_eq!(item.status, ItemStatus::ToBuy);
        assert_eq!(item.notes, "");
    }

    #[test]
    fn status_serializes_snake_case() {
        let mut item = Item::new("I-002".into(), "Rice".into());
        item.status = ItemStatus::NotNeeded;
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["status"], "not_needed");
    }
}
