//! Entity types stored in a visualization database.
//!
//! Every identifier is assigned by the caller. Cross-references are plain
//! ids; no entity owns another.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

pub type LocationId = i64;
pub type DimensionId = i64;
pub type VariableId = i64;

/// Name given to the synthetic dimension attached to scalar variables.
pub const SCALAR_DIMENSION_NAME: &str = "-";

// ─── Info ────────────────────────────────────────────────────────────────────

/// Store-level metadata entry. `key` is unique within a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
  pub key:   String,
  pub value: Option<String>,
  pub label: Option<String>,
}

impl Info {
  pub fn new(
    key: impl Into<String>,
    value: impl Into<String>,
    label: impl Into<String>,
  ) -> Self {
    Self {
      key:   key.into(),
      value: Some(value.into()),
      label: Some(label.into()),
    }
  }

  /// The conventional `name` entry shown as the dataset title.
  pub fn name(value: impl Into<String>) -> Self { Self::new("name", value, "Name") }

  pub fn description(value: impl Into<String>) -> Self {
    Self::new("description", value, "Description")
  }
}

// ─── Location ────────────────────────────────────────────────────────────────

/// A point or polygon the data is attached to.
///
/// `geometry` follows the GeoJSON geometry layout and `metadata` is an
/// arbitrary JSON object. Neither is interpreted here; they only have to
/// survive a write/read cycle structurally intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
  pub id:       LocationId,
  pub geometry: serde_json::Value,
  #[serde(default)]
  pub metadata: serde_json::Value,
}

impl Location {
  pub fn new(id: LocationId, geometry: serde_json::Value) -> Self {
    Self { id, geometry, metadata: serde_json::Value::Null }
  }

  pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
    self.metadata = metadata;
    self
  }
}

// ─── Dimension ───────────────────────────────────────────────────────────────

/// An axis values can be indexed over (time, layer, level, ...).
///
/// `size` and `value_labels` are declarative: neither is checked against the
/// coordinates actually written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
  pub id:           DimensionId,
  pub name:         String,
  pub size:         u32,
  pub description:  Option<String>,
  pub value_labels: Option<Vec<String>>,
}

impl Dimension {
  pub fn new(id: DimensionId, name: impl Into<String>, size: u32) -> Self {
    Self {
      id,
      name: name.into(),
      size,
      description: None,
      value_labels: None,
    }
  }

  /// The size-1 placeholder axis carried by variables that have no natural
  /// dimension, so every value has at least one coordinate.
  pub fn scalar(id: DimensionId) -> Self { Self::new(id, SCALAR_DIMENSION_NAME, 1) }

  pub fn is_scalar(&self) -> bool {
    self.size == 1 && self.name == SCALAR_DIMENSION_NAME
  }

  pub fn with_description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  pub fn with_value_labels<I, S>(mut self, labels: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.value_labels = Some(labels.into_iter().map(Into::into).collect());
    self
  }
}

// ─── Variable ────────────────────────────────────────────────────────────────

/// A measured or derived quantity.
///
/// `dimensions` lists, in order and without repeats, the axes this
/// variable's values are indexed over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
  pub id:          VariableId,
  pub name:        String,
  pub unit:        Option<String>,
  pub description: Option<String>,
  pub dimensions:  Vec<DimensionId>,
}

impl Variable {
  pub fn new(
    id: VariableId,
    name: impl Into<String>,
    dimensions: impl IntoIterator<Item = DimensionId>,
  ) -> Self {
    Self {
      id,
      name: name.into(),
      unit: None,
      description: None,
      dimensions: dimensions.into_iter().collect(),
    }
  }

  pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
    self.unit = Some(unit.into());
    self
  }

  pub fn with_description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  /// True if `coordinates` names exactly this variable's dimensions.
  pub fn accepts(&self, coordinates: &Coordinates) -> bool {
    coordinates.len() == self.dimensions.len()
      && self.dimensions.iter().all(|d| coordinates.get(*d).is_some())
  }

  /// True if both variables are indexed over the same set of dimensions,
  /// regardless of order.
  pub fn same_dimensions(&self, other: &Variable) -> bool {
    let mut ours = self.dimensions.clone();
    let mut theirs = other.dimensions.clone();
    ours.sort_unstable();
    theirs.sort_unstable();
    ours == theirs
  }
}

/// Selects a variable either by id or by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableRef {
  Id(VariableId),
  Name(String),
}

impl VariableRef {
  pub fn matches(&self, variable: &Variable) -> bool {
    match self {
      Self::Id(id) => variable.id == *id,
      Self::Name(name) => variable.name == *name,
    }
  }
}

impl fmt::Display for VariableRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Id(id) => write!(f, "#{id}"),
      Self::Name(name) => write!(f, "{name:?}"),
    }
  }
}

impl From<VariableId> for VariableRef {
  fn from(id: VariableId) -> Self { Self::Id(id) }
}

impl From<&str> for VariableRef {
  fn from(name: &str) -> Self { Self::Name(name.to_owned()) }
}

// ─── Coordinates ─────────────────────────────────────────────────────────────

/// Index along each of a variable's dimensions, keyed by dimension id.
///
/// Ordered so that two tuples with the same entries compare and hash equal
/// no matter how they were built.
#[derive(
  Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Coordinates(BTreeMap<DimensionId, u32>);

impl Coordinates {
  pub fn new() -> Self { Self::default() }

  pub fn insert(&mut self, dimension: DimensionId, index: u32) -> Option<u32> {
    self.0.insert(dimension, index)
  }

  pub fn with(mut self, dimension: DimensionId, index: u32) -> Self {
    self.0.insert(dimension, index);
    self
  }

  pub fn get(&self, dimension: DimensionId) -> Option<u32> {
    self.0.get(&dimension).copied()
  }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn dimensions(&self) -> impl Iterator<Item = DimensionId> + '_ {
    self.0.keys().copied()
  }

  pub fn iter(&self) -> impl Iterator<Item = (DimensionId, u32)> + '_ {
    self.0.iter().map(|(d, i)| (*d, *i))
  }
}

impl FromIterator<(DimensionId, u32)> for Coordinates {
  fn from_iter<T: IntoIterator<Item = (DimensionId, u32)>>(iter: T) -> Self {
    Self(iter.into_iter().collect())
  }
}

impl<const N: usize> From<[(DimensionId, u32); N]> for Coordinates {
  fn from(entries: [(DimensionId, u32); N]) -> Self { entries.into_iter().collect() }
}

impl fmt::Display for Coordinates {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("{")?;
    for (i, (dimension, index)) in self.iter().enumerate() {
      if i > 0 {
        f.write_str(", ")?;
      }
      write!(f, "{dimension}: {index}")?;
    }
    f.write_str("}")
  }
}

// ─── Value ───────────────────────────────────────────────────────────────────

/// One fact: the value of `variable` at `location` and `coordinates`.
///
/// `value` is `None` for missing or invalid data; a present value must be
/// finite to be stored. `(location, variable, coordinates)` is unique within
/// a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Value {
  pub location:    LocationId,
  pub variable:    VariableId,
  pub coordinates: Coordinates,
  pub value:       Option<f64>,
}

impl Value {
  pub fn new(
    location: LocationId,
    variable: VariableId,
    coordinates: impl Into<Coordinates>,
    value: Option<f64>,
  ) -> Self {
    Self {
      location,
      variable,
      coordinates: coordinates.into(),
      value,
    }
  }
}
