use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Deal classification the model assigns to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    Equity,
    Merger,
    Distressed,
}

impl Property {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "股权" => Some(Property::Equity),
            "并购" => Some(Property::Merger),
            "不良" => Some(Property::Distressed),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Property::Equity => "股权",
            Property::Merger => "并购",
            Property::Distressed => "不良",
        }
    }
}

/// Flat summary record returned by `/analyze`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredSummary {
    pub name: String,
    pub property: String,
    pub status: String,
    pub industry: String,
    pub description: String,
    #[serde(rename = "aiSummary")]
    pub ai_summary: String,
    /// Anything else the model chose to add is passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StructuredSummary {
    pub fn classification(&self) -> Option<Property> {
        Property::from_label(&self.property)
    }
}
