use std::collections::BTreeMap;
use std::collections::btree_map;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::debug;

use crate::domain::{COLLECTION_FIELD, ID_FIELD, LEGACY_ID_FIELD};
use crate::error::UploadError;

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDateTime),
}

impl CellValue {
    pub fn to_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(value) if value.is_empty() => None,
            CellValue::Text(value) => Some(value.clone()),
            CellValue::Number(value) if value.is_nan() => None,
            CellValue::Number(value) => Some(format_number(*value)),
            CellValue::Bool(true) => Some("True".to_string()),
            CellValue::Bool(false) => Some("False".to_string()),
            CellValue::Date(value) => Some(format_date(value)),
        }
    }
}

fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn format_date(value: &NaiveDateTime) -> String {
    if value.time() == chrono::NaiveTime::MIN {
        value.format("%Y-%m-%d").to_string()
    } else {
        value.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: Vec<(String, CellValue)>,
}

impl Row {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.fields
            .iter()
            .map(|(field, value)| (field.as_str(), value))
    }
}

impl<K: Into<String>> FromIterator<(K, CellValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, CellValue)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(field, value)| (field.into(), value))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    pub fn folder(&self) -> Result<&str, UploadError> {
        self.get(ID_FIELD)
            .ok_or_else(|| UploadError::MissingField(ID_FIELD.to_string()))
    }

    pub fn set_collection(&mut self, collection: &str) {
        self.insert(COLLECTION_FIELD, collection);
    }
}

impl<'a> IntoIterator for &'a Metadata {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub fn normalize_key(key: &str) -> String {
    let key = key.trim().replace(' ', "_");
    if key == LEGACY_ID_FIELD {
        ID_FIELD.to_string()
    } else {
        key
    }
}

pub fn normalize(row: &Row) -> Metadata {
    let mut metadata = Metadata::new();
    for (field, value) in row.iter() {
        if let Some(text) = value.to_text() {
            let key = normalize_key(field);
            if metadata.get(&key).is_some() {
                debug!(%key, %field, "field overwrites an earlier column");
            }
            metadata.insert(key, text);
        }
    }
    metadata
}
