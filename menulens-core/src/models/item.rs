use serde::{Deserialize, Serialize};

/// A menu entry as loaded from a dataset file.
///
/// Only `name` is required; unknown fields are kept in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MenuItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl MenuItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            price: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// Records that can be labelled in the chart.
pub trait ItemName {
    fn item_name(&self) -> &str;
}

impl ItemName for MenuItem {
    fn item_name(&self) -> &str {
        &self.name
    }
}

impl ItemName for String {
    fn item_name(&self) -> &str {
        self
    }
}

impl ItemName for &str {
    fn item_name(&self) -> &str {
        self
    }
}
