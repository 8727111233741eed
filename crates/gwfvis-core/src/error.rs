//! Error types for `gwfvis-core`.

use thiserror::Error;

use crate::entity::{Coordinates, DimensionId, LocationId, VariableId, VariableRef};

#[derive(Debug, Error)]
pub enum Error {
  #[error("variable not found: {0}")]
  UnknownVariable(VariableRef),

  #[error("{entity} id {id} is used more than once")]
  DuplicateId { entity: &'static str, id: i64 },

  #[error("info key {0:?} is used more than once")]
  DuplicateInfoKey(String),

  /// An id points at an entity absent from its collection.
  #[error("{owner} references unknown {entity} {id}")]
  ReferentialIntegrity {
    owner:  String,
    entity: &'static str,
    id:     i64,
  },

  /// A value's coordinates do not name exactly its variable's dimensions.
  #[error(
    "value of variable {variable} at location {location} has coordinates \
     {coordinates}, expected dimensions {expected:?}"
  )]
  CoordinateMismatch {
    location:    LocationId,
    variable:    VariableId,
    coordinates: Coordinates,
    expected:    Vec<DimensionId>,
  },

  #[error(
    "variable {variable} already has a value at location {location} for \
     coordinates {coordinates}"
  )]
  DuplicateValue {
    location:    LocationId,
    variable:    VariableId,
    coordinates: Coordinates,
  },

  /// NaN and infinities have no stored form; SQLite would keep NaN as NULL.
  #[error(
    "variable {variable} at location {location} has non-finite value {value} \
     for coordinates {coordinates}"
  )]
  NonFiniteValue {
    location:    LocationId,
    variable:    VariableId,
    coordinates: Coordinates,
    value:       f64,
  },

  #[error("variables {base} and {subtrahend} are indexed over different dimensions")]
  DimensionMismatch {
    base:       VariableId,
    subtrahend: VariableId,
  },

  /// Derivation found no partner value for one of the base values.
  #[error(
    "variable {variable} has no value at location {location} for coordinates \
     {coordinates}"
  )]
  UnmatchedTuple {
    variable:    VariableId,
    location:    LocationId,
    coordinates: Coordinates,
  },

  #[error("source and destination are the same store")]
  SameStore,
}

impl Error {
  /// Schema violations: the data does not fit the shape the store declares.
  pub fn is_schema_violation(&self) -> bool {
    matches!(
      self,
      Self::DuplicateId { .. }
        | Self::DuplicateInfoKey(_)
        | Self::CoordinateMismatch { .. }
        | Self::DuplicateValue { .. }
        | Self::NonFiniteValue { .. }
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
