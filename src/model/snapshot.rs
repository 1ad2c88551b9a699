use serde::{Deserialize, Serialize};

use super::lenient;
use super::pantry::PantryContent;
use super::thread::ThreadContent;

/// A node as it appears in a persisted document: nested, with the payload
/// fields (`questions`/`tasks` or `items`) flattened alongside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord<C> {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default = "lenient::default_true", deserialize_with = "lenient::bool_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub children: Vec<NodeRecord<C>>,
    #[serde(flatten)]
    pub content: C,
}

/// The pantry half of a document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PantrySnapshot {
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub categories: Vec<NodeRecord<PantryContent>>,
}

/// The whole persisted document: `{threads, pantry: {categories}}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub threads: Vec<NodeRecord<ThreadContent>>,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub pantry: PantrySnapshot,
}

impl Snapshot {
    /// Parse a document. Callers substitute [`Snapshot::default`] on error.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty() && self.pantry.categories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_object_is_default() {
        assert_eq!(Snapshot::from_json("{}").unwrap(), Snapshot::default());
        assert_eq!(
            Snapshot::from_json(r#"{"threads":null,"pantry":null}"#).unwrap(),
            Snapshot::default()
        );
    }

    #[test]
    fn legacy_document_without_pantry_loads() {
        let snap = Snapshot::from_json(
            r#"{"threads":[{"id":"node_1","name":"Fitness","children":[
                {"id":"node_2","name":"Strength","questions":[],"tasks":[{"id":"t_1","text":"Squat"}]}
            ]}]}"#,
        )
        .unwrap();
        assert!(snap.pantry.categories.is_empty());
        let fitness = &snap.threads[0];
        assert!(fitness.enabled);
        assert!(fitness.content.tasks.is_empty());
        let strength = &fitness.children[0];
        assert_eq!(strength.content.tasks[0].priority, 3);
    }

    #[test]
    fn wrong_shape_is_an_error() {
        assert!(Snapshot::from_json(r#"{"threads": 5}"#).is_err());
        assert!(Snapshot::from_json("not json").is_err());
    }

    #[test]
    fn serialized_shape_matches_document_layout() {
        let snap = Snapshot::from_json(
            r#"{"threads":[{"id":"N-001","name":"A"}],
                "pantry":{"categories":[{"id":"C-001","name":"Dry","items":[{"id":"I-001","name":"Oats"}]}]}}"#,
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&snap.to_json().unwrap()).unwrap();
        assert_eq!(value["threads"][0]["questions"], serde_json::json!([]));
        assert_eq!(value["threads"][0]["enabled"], true);
        assert_eq!(value["pantry"]["categories"][0]["items"][0]["status"], "to_buy");
    }
}
