//! Data models for livesync
//!
//! The dataset is an ordered list of opaque records. The client never looks
//! inside a record beyond its identifier field; `Game` is a typed view that
//! consumers can opt into.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default identifier field of a record
pub const DEFAULT_KEY_FIELD: &str = "game_id";

/// A single opaque domain record (a JSON object)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Wrap an already-decoded JSON object
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Get a field value
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Get the identifier of this record
    ///
    /// String identifiers are returned as-is, numeric ones are rendered.
    pub fn id(&self, key_field: &str) -> Option<String> {
        match self.0.get(key_field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Borrow the underlying JSON object
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Decode into a typed view, if the record has that shape
    pub fn to_typed<T: DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_value(Value::Object(self.0.clone())).ok()
    }

    /// Convert back into a JSON value
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// The full synchronized dataset
///
/// Always replaced wholesale, never merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    /// Create a dataset from decoded records
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the dataset has no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, in the order the server sent them
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Iterate over records
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Find a record by identifier
    pub fn find_by(&self, key_field: &str, id: &str) -> Option<&Record> {
        self.records
            .iter()
            .find(|r| r.id(key_field).as_deref() == Some(id))
    }

    /// Typed view of every record that looks like a game
    ///
    /// Records of another shape are skipped, not rejected.
    pub fn games(&self) -> Vec<Game> {
        self.records.iter().filter_map(Record::to_typed).collect()
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// A live game, as published by the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Game {
    pub game_id: String,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub home_score: i64,
    #[serde(default)]
    pub away_score: i64,
    #[serde(default)]
    pub home_record: String,
    #[serde(default)]
    pub away_record: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub home_win_prob: Option<f64>,
    #[serde(default)]
    pub away_win_prob: Option<f64>,
}

impl Game {
    /// Home win probability as a whole percentage
    pub fn home_win_percent(&self) -> Option<u8> {
        self.home_win_prob.map(to_percent)
    }

    /// Away win probability as a whole percentage
    pub fn away_win_percent(&self) -> Option<u8> {
        self.away_win_prob.map(to_percent)
    }
}

fn to_percent(prob: f64) -> u8 {
    (prob.clamp(0.0, 1.0) * 100.0).round() as u8
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} @ {} {}",
            self.away_team, self.away_score, self.home_team, self.home_score
        )?;
        if !self.status.is_empty() {
            write!(f, " ({})", self.status)?;
        }
        Ok(())
    }
}
