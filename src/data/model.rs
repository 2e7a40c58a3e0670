//! Core record types shared by the loaders and the aggregator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One experimental site and the target EC its nutrient solution was held at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct School {
    pub name: String,
    pub target_ec: f64,
    /// Display color for charts. Not used by the core.
    #[serde(default)]
    pub color: String,
}

impl School {
    pub fn new(name: impl Into<String>, target_ec: f64) -> Self {
        Self {
            name: name.into(),
            target_ec,
            color: String::new(),
        }
    }
}

/// Numeric fields that can be averaged and correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Temperature,
    Humidity,
    Ph,
    Ec,
    Weight,
    LeafCount,
    ShootLength,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Temperature,
        Field::Humidity,
        Field::Ph,
        Field::Ec,
        Field::Weight,
        Field::LeafCount,
        Field::ShootLength,
    ];

    /// Stable key used in config files, CLI flags and exported headers.
    pub fn key(self) -> &'static str {
        match self {
            Field::Temperature => "temperature",
            Field::Humidity => "humidity",
            Field::Ph => "ph",
            Field::Ec => "ec",
            Field::Weight => "weight",
            Field::LeafCount => "leaf_count",
            Field::ShootLength => "shoot_length",
        }
    }

    pub fn from_key(key: &str) -> Option<Field> {
        let key = key.trim();
        Field::ALL
            .into_iter()
            .find(|f| f.key().eq_ignore_ascii_case(key))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Records whose numeric fields can be summarized per school.
pub trait Measured {
    /// Fields carried by this record type, in display order.
    fn fields() -> &'static [Field];

    /// Value of `field`; NaN marks a missing cell.
    fn value(&self, field: Field) -> f64;
}

/// One environment sensor sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentRecord {
    pub school: String,
    pub time: String,
    pub temperature: f64,
    pub humidity: f64,
    pub ph: f64,
    pub ec: f64,
}

impl Measured for EnvironmentRecord {
    fn fields() -> &'static [Field] {
        &[Field::Temperature, Field::Humidity, Field::Ph, Field::Ec]
    }

    fn value(&self, field: Field) -> f64 {
        match field {
            Field::Temperature => self.temperature,
            Field::Humidity => self.humidity,
            Field::Ph => self.ph,
            Field::Ec => self.ec,
            _ => f64::NAN,
        }
    }
}

/// One plant individual measured at the end of the experiment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthRecord {
    pub school: String,
    /// Fresh weight in grams.
    pub weight: f64,
    pub leaf_count: f64,
    /// Above-ground length in millimetres.
    pub shoot_length: f64,
}

impl Measured for GrowthRecord {
    fn fields() -> &'static [Field] {
        &[Field::Weight, Field::LeafCount, Field::ShootLength]
    }

    fn value(&self, field: Field) -> f64 {
        match field {
            Field::Weight => self.weight,
            Field::LeafCount => self.leaf_count,
            Field::ShootLength => self.shoot_length,
            _ => f64::NAN,
        }
    }
}

/// Ordered school -> value mapping.
///
/// Iteration follows insertion order, which the loaders set to the configured
/// school order (environment) or the workbook's sheet order (growth).
#[derive(Debug, Clone, PartialEq)]
pub struct SchoolTable<T> {
    entries: Vec<(String, T)>,
}

impl<T> Default for SchoolTable<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> SchoolTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value for `school`. Replacing keeps the original position.
    pub fn insert(&mut self, school: impl Into<String>, value: T) {
        let school = school.into();
        match self.entries.iter_mut().find(|(name, _)| *name == school) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((school, value)),
        }
    }

    pub fn get(&self, school: &str) -> Option<&T> {
        self.entries
            .iter()
            .find(|(name, _)| name == school)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, school: &str) -> bool {
        self.get(school).is_some()
    }

    pub fn schools(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(name, v)| (name.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> FromIterator<(String, T)> for SchoolTable<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        let mut table = SchoolTable::new();
        for (school, value) in iter {
            table.insert(school, value);
        }
        table
    }
}

impl<T> IntoIterator for SchoolTable<T> {
    type Item = (String, T);
    type IntoIter = std::vec::IntoIter<(String, T)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn school_table_keeps_insertion_order() {
        let mut table = SchoolTable::new();
        table.insert("하늘고", 2);
        table.insert("송도고", 1);
        table.insert("하늘고", 3);

        let order: Vec<&str> = table.schools().collect();
        assert_eq!(order, vec!["하늘고", "송도고"]);
        assert_eq!(table.get("하늘고"), Some(&3));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn field_keys_round_trip() {
        for field in Field::ALL {
            assert_eq!(Field::from_key(field.key()), Some(field));
        }
        assert_eq!(Field::from_key(" EC "), Some(Field::Ec));
        assert_eq!(Field::from_key("pressure"), None);
    }
}
