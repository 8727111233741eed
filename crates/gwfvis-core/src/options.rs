//! [`Options`]: the complete contents of one store, held in memory.
//!
//! `Options` is the unit that is written and read back. For grids too large
//! to materialise, [`Options::into_parts`] separates the small [`Catalog`]
//! (everything but values) from the value stream so the writer can consume
//! values in a single pass.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  entity::{
    Dimension, DimensionId, Info, Location, LocationId, Value, Variable, VariableId,
    VariableRef,
  },
};

// ─── Options ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Options {
  pub info:       Vec<Info>,
  pub locations:  Vec<Location>,
  pub dimensions: Vec<Dimension>,
  pub variables:  Vec<Variable>,
  pub values:     Vec<Value>,
}

impl Options {
  pub fn from_parts(catalog: Catalog, values: Vec<Value>) -> Self {
    let Catalog { info, locations, dimensions, variables } = catalog;
    Self { info, locations, dimensions, variables, values }
  }

  pub fn into_parts(self) -> (Catalog, Vec<Value>) {
    let Self { info, locations, dimensions, variables, values } = self;
    (Catalog { info, locations, dimensions, variables }, values)
  }

  pub fn variable(&self, selector: &VariableRef) -> Option<&Variable> {
    self.variables.iter().find(|v| selector.matches(v))
  }

  pub fn dimension(&self, id: DimensionId) -> Option<&Dimension> {
    self.dimensions.iter().find(|d| d.id == id)
  }

  pub fn location(&self, id: LocationId) -> Option<&Location> {
    self.locations.iter().find(|l| l.id == id)
  }

  /// All values of one variable, in stored order.
  pub fn values_of(&self, variable: VariableId) -> impl Iterator<Item = &Value> {
    self.values.iter().filter(move |v| v.variable == variable)
  }

  /// One past the largest variable id, or 0 for a store without variables.
  pub fn next_variable_id(&self) -> VariableId {
    self
      .variables
      .iter()
      .map(|v| v.id)
      .max()
      .map_or(0, |max| max + 1)
  }

  /// Give every dimensionless variable the synthetic scalar dimension `id`.
  ///
  /// The dimension is added if missing, the affected variables list it as
  /// their only axis, and their values get coordinate `{id: 0}`. Fails if
  /// `id` is already taken by a dimension that is not a scalar placeholder.
  pub fn attach_scalar_dimension(&mut self, id: DimensionId) -> Result<()> {
    let scalar: HashSet<VariableId> = self
      .variables
      .iter()
      .filter(|v| v.dimensions.is_empty())
      .map(|v| v.id)
      .collect();
    if scalar.is_empty() {
      return Ok(());
    }

    match self.dimension(id) {
      Some(existing) if !existing.is_scalar() => {
        return Err(Error::DuplicateId { entity: "dimension", id });
      }
      Some(_) => {}
      None => self.dimensions.push(Dimension::scalar(id)),
    }

    for variable in &mut self.variables {
      if scalar.contains(&variable.id) {
        variable.dimensions.push(id);
      }
    }
    for value in &mut self.values {
      if scalar.contains(&value.variable) && value.coordinates.is_empty() {
        value.coordinates.insert(id, 0);
      }
    }
    Ok(())
  }

  /// Sort every collection by its key. Two bundles holding the same
  /// entities compare equal once normalized.
  pub fn normalized(mut self) -> Self {
    self.info.sort_by(|a, b| a.key.cmp(&b.key));
    self.locations.sort_by_key(|l| l.id);
    self.dimensions.sort_by_key(|d| d.id);
    self.variables.sort_by_key(|v| v.id);
    self.values.sort_by(|a, b| {
      (a.location, a.variable, &a.coordinates).cmp(&(
        b.location,
        b.variable,
        &b.coordinates,
      ))
    });
    self
  }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// Everything in a store except the fact rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
  pub info:       Vec<Info>,
  pub locations:  Vec<Location>,
  pub dimensions: Vec<Dimension>,
  pub variables:  Vec<Variable>,
}

impl Catalog {
  /// Check keys and cross-references, then build a validator for the value
  /// stream that will accompany this catalog.
  pub fn validator(&self) -> Result<ValueValidator> {
    let mut keys = HashSet::new();
    for info in &self.info {
      if !keys.insert(info.key.as_str()) {
        return Err(Error::DuplicateInfoKey(info.key.clone()));
      }
    }

    let locations = unique_ids("location", self.locations.iter().map(|l| l.id))?;
    let dimensions = unique_ids("dimension", self.dimensions.iter().map(|d| d.id))?;
    unique_ids("variable", self.variables.iter().map(|v| v.id))?;

    let mut variables = HashMap::with_capacity(self.variables.len());
    for variable in &self.variables {
      let mut seen = HashSet::new();
      for dimension in &variable.dimensions {
        if !dimensions.contains(dimension) {
          return Err(Error::ReferentialIntegrity {
            owner:  format!("variable {}", variable.id),
            entity: "dimension",
            id:     *dimension,
          });
        }
        if !seen.insert(*dimension) {
          return Err(Error::DuplicateId { entity: "dimension", id: *dimension });
        }
      }
      variables.insert(variable.id, variable.clone());
    }

    Ok(ValueValidator { locations, variables })
  }
}

fn unique_ids(
  entity: &'static str,
  ids: impl Iterator<Item = i64>,
) -> Result<HashSet<i64>> {
  let mut seen = HashSet::new();
  for id in ids {
    if !seen.insert(id) {
      return Err(Error::DuplicateId { entity, id });
    }
  }
  Ok(seen)
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Checks values one at a time against a validated [`Catalog`].
///
/// Owns its lookup tables so it can travel with a value stream onto another
/// thread. Key uniqueness is not tracked here; the store enforces it.
#[derive(Debug, Clone)]
pub struct ValueValidator {
  locations: HashSet<LocationId>,
  variables: HashMap<VariableId, Variable>,
}

impl ValueValidator {
  pub fn check(&self, value: &Value) -> Result<()> {
    if !self.locations.contains(&value.location) {
      return Err(Error::ReferentialIntegrity {
        owner:  format!("value of variable {}", value.variable),
        entity: "location",
        id:     value.location,
      });
    }

    let variable = self.variables.get(&value.variable).ok_or_else(|| {
      Error::ReferentialIntegrity {
        owner:  format!("value at location {}", value.location),
        entity: "variable",
        id:     value.variable,
      }
    })?;

    if !variable.accepts(&value.coordinates) {
      return Err(Error::CoordinateMismatch {
        location:    value.location,
        variable:    value.variable,
        coordinates: value.coordinates.clone(),
        expected:    variable.dimensions.clone(),
      });
    }

    if let Some(number) = value.value
      && !number.is_finite()
    {
      return Err(Error::NonFiniteValue {
        location:    value.location,
        variable:    value.variable,
        coordinates: value.coordinates.clone(),
        value:       number,
      });
    }
    Ok(())
  }
}
