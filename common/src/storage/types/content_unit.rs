use std::fmt;

use serde::{Deserialize, Serialize};

/// Owner id used for units that belong to no profile.
pub const OWNERLESS: &str = "default";

/// Retrieval partition key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentCategory {
    Profile,
    Project,
    Document,
    Conversation,
}

impl ContentCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Project => "project",
            Self::Document => "document",
            Self::Conversation => "conversation",
        }
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category-specific metadata carried next to a unit's text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentExtra {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visitor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chatbot_id: Option<String>,
    /// RFC 3339 timestamp of the source event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// One independently retrievable fragment of text.
///
/// `id` is derived from category, owner, subcategory and chunk position so re-indexing the
/// same source reproduces the same ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentUnit {
    pub id: String,
    pub category: ContentCategory,
    pub subcategory: String,
    pub owner_id: String,
    pub text: String,
    #[serde(default)]
    pub extra: ContentExtra,
}

impl ContentUnit {
    pub fn new(
        id: String,
        category: ContentCategory,
        subcategory: impl Into<String>,
        owner_id: &str,
        text: String,
        extra: ContentExtra,
    ) -> Self {
        let owner_id = if owner_id.trim().is_empty() {
            OWNERLESS.to_string()
        } else {
            owner_id.to_string()
        };
        Self {
            id,
            category,
            subcategory: subcategory.into(),
            owner_id,
            text,
            extra,
        }
    }
}

/// Vector-store hit: the unit and its cosine distance to the query (lower is closer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredUnit {
    pub unit: ContentUnit,
    pub distance: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_owner_becomes_sentinel() {
        let unit = ContentUnit::new(
            "name_x".into(),
            ContentCategory::Profile,
            "name",
            "  ",
            "Ava".into(),
            ContentExtra::default(),
        );
        assert_eq!(unit.owner_id, OWNERLESS);
    }

    #[test]
    fn test_category_serializes_lowercase() {
        let json = serde_json::to_string(&ContentCategory::Conversation).expect("serialize");
        assert_eq!(json, "\"conversation\"");
        assert_eq!(ContentCategory::Document.to_string(), "document");
    }
}
