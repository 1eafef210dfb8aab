use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use uuid::Uuid;

use crate::error::UploadError;

pub const ID_FIELD: &str = "image_folder";

pub const LEGACY_ID_FIELD: &str = "docID";

pub const COLLECTION_FIELD: &str = "collection";

pub const TEST_COLLECTION: &str = "test_collection";

/// Internet Archive item identifier.
///
/// Identifiers are 1 to 100 characters of ASCII letters, digits, `_`, `-`
/// and `.`, and may not start with a punctuation character.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ItemId(String);

impl ItemId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = UploadError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let is_valid = !trimmed.is_empty()
            && trimmed.len() <= 100
            && trimmed
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'))
            && trimmed
                .chars()
                .next()
                .map(|ch| ch.is_ascii_alphanumeric())
                .unwrap_or(false);
        if !is_valid {
            return Err(UploadError::InvalidIdentifier(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

pub fn remote_archive_name(folder: &str) -> String {
    format!("{folder}_images.zip")
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn generated_ids_are_valid_and_distinct() {
        let first = ItemId::generate();
        let second = ItemId::generate();
        assert_ne!(first, second);
        let parsed: ItemId = first.as_str().parse().unwrap();
        assert_eq!(parsed, first);
    }

    #[test]
    fn parse_item_id_invalid() {
        assert_matches!(
            "bad id".parse::<ItemId>(),
            Err(UploadError::InvalidIdentifier(_))
        );
        assert_matches!(
            "-leading".parse::<ItemId>(),
            Err(UploadError::InvalidIdentifier(_))
        );
        assert_matches!("".parse::<ItemId>(), Err(UploadError::InvalidIdentifier(_)));
    }

    #[test]
    fn archive_name_uses_folder() {
        assert_eq!(remote_archive_name("abc123"), "abc123_images.zip");
    }
}
