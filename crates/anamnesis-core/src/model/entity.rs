use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Metadata;

/// Entity type vocabulary extracted by [`crate::extract::EntityExtractor`].
///
/// `Custom` absorbs anything the registry cannot classify more precisely,
/// matching the "CONCEPT | …" open tail in the data model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[non_exhaustive]
pub enum EntityType {
    Person,
    Organization,
    Location,
    Date,
    Number,
    Email,
    Url,
    Phone,
    Concept,
    Custom(String),
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityType::Person => write!(f, "PERSON"),
            EntityType::Organization => write!(f, "ORGANIZATION"),
            EntityType::Location => write!(f, "LOCATION"),
            EntityType::Date => write!(f, "DATE"),
            EntityType::Number => write!(f, "NUMBER"),
            EntityType::Email => write!(f, "EMAIL"),
            EntityType::Url => write!(f, "URL"),
            EntityType::Phone => write!(f, "PHONE"),
            EntityType::Concept => write!(f, "CONCEPT"),
            EntityType::Custom(s) => write!(f, "{}", s.to_uppercase()),
        }
    }
}

/// A named concept or referent.
///
/// Equality for deduplication purposes is `(normalised_name, type)`, not
/// `id` — see [`Entity::normalised_name`] and
/// [`crate::write::resolver::EntityResolver`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Entity {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(default)]
    pub properties: Metadata,
    pub confidence: f64,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

impl Entity {
    pub fn new(
        name: impl Into<String>,
        entity_type: EntityType,
        confidence: f64,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            entity_type,
            properties: Metadata::new(),
            confidence: confidence.clamp(0.0, 1.0),
            source: source.into(),
            created_at: Utc::now(),
        }
    }

    /// `lower(trim(name))`, used as the first component of the dedup key.
    pub fn normalised_name(&self) -> String {
        self.name.trim().to_lowercase()
    }

    /// §3 invariant, checked post-resolution: trimmed non-empty name of
    /// length in `[2,100]` and confidence in range.
    pub fn is_valid(&self) -> bool {
        let len = self.normalised_name().len();
        (2..=100).contains(&len) && (0.0..=1.0).contains(&self.confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalised_name_trims_and_lowercases() {
        let e = Entity::new("  Dr. Smith  ", EntityType::Person, 0.8, "s1");
        assert_eq!(e.normalised_name(), "dr. smith");
    }

    #[test]
    fn single_char_name_is_invalid() {
        let e = Entity::new("x", EntityType::Concept, 0.8, "s1");
        assert!(!e.is_valid());
    }

    #[test]
    fn display_uppercases_type() {
        assert_eq!(EntityType::Person.to_string(), "PERSON");
        assert_eq!(EntityType::Custom("widget".into()).to_string(), "WIDGET");
    }
}
