//! Deriving a new variable from two existing ones.
//!
//! Each value of the base variable is paired with the value of the second
//! variable at the same location and the same coordinates; the new
//! variable's value is a function of the pair.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  entity::{Coordinates, LocationId, Value, Variable, VariableRef},
  options::Options,
};

/// What to derive, and from which variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivationRequest {
  pub base:        VariableRef,
  pub subtrahend:  VariableRef,
  /// Name of the new variable.
  pub name:        String,
  /// Defaults to a description naming both inputs.
  pub description: Option<String>,
}

impl DerivationRequest {
  pub fn difference(
    base: impl Into<VariableRef>,
    subtrahend: impl Into<VariableRef>,
    name: impl Into<String>,
  ) -> Self {
    Self {
      base:        base.into(),
      subtrahend:  subtrahend.into(),
      name:        name.into(),
      description: None,
    }
  }
}

/// A derived variable together with its values, ready to be appended.
#[derive(Debug, Clone, PartialEq)]
pub struct Derived {
  pub variable: Variable,
  pub values:   Vec<Value>,
}

/// `base - subtrahend`, matched by location and coordinates.
pub fn derive_difference(options: &Options, request: &DerivationRequest) -> Result<Derived> {
  derive_with(options, request, |a, b| a - b)
}

/// Derive a variable whose values are `op(base, other)`.
///
/// Both variables must be indexed over the same dimensions. Every base value
/// needs a partner; a missing one is [`Error::UnmatchedTuple`]. A null on
/// either side yields a null. The new variable takes the next free id and
/// inherits the base variable's unit and dimensions.
pub fn derive_with(
  options: &Options,
  request: &DerivationRequest,
  op: impl Fn(f64, f64) -> f64,
) -> Result<Derived> {
  let base = options
    .variable(&request.base)
    .ok_or_else(|| Error::UnknownVariable(request.base.clone()))?;
  let other = options
    .variable(&request.subtrahend)
    .ok_or_else(|| Error::UnknownVariable(request.subtrahend.clone()))?;

  if !base.same_dimensions(other) {
    return Err(Error::DimensionMismatch {
      base:       base.id,
      subtrahend: other.id,
    });
  }

  let variable = Variable {
    id:          options.next_variable_id(),
    name:        request.name.clone(),
    unit:        base.unit.clone(),
    description: Some(
      request
        .description
        .clone()
        .unwrap_or_else(|| format!("{} minus {}", base.name, other.name)),
    ),
    dimensions:  base.dimensions.clone(),
  };

  let partners: HashMap<(LocationId, &Coordinates), Option<f64>> = options
    .values_of(other.id)
    .map(|v| ((v.location, &v.coordinates), v.value))
    .collect();

  let values = options
    .values_of(base.id)
    .map(|a| {
      let b = partners
        .get(&(a.location, &a.coordinates))
        .ok_or_else(|| Error::UnmatchedTuple {
          variable:    other.id,
          location:    a.location,
          coordinates: a.coordinates.clone(),
        })?;
      Ok(Value {
        location:    a.location,
        variable:    variable.id,
        coordinates: a.coordinates.clone(),
        value:       a.value.zip(*b).map(|(a, b)| op(a, b)),
      })
    })
    .collect::<Result<Vec<_>>>()?;

  tracing::debug!(
    variable = %variable.name,
    id = variable.id,
    values = values.len(),
    "derived variable"
  );

  Ok(Derived { variable, values })
}

impl Options {
  /// Append a derived variable and its values.
  pub fn with_derived(mut self, derived: Derived) -> Self {
    self.variables.push(derived.variable);
    self.values.extend(derived.values);
    self
  }
}
