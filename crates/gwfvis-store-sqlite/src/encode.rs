//! Conversions between domain types and the rows stored in SQLite.
//!
//! Nested structures (geometry, metadata, value labels) are stored as
//! compact JSON text. Absent value labels are stored as JSON `null`, so the
//! column is always present.

use std::collections::{HashMap, HashSet};

use gwfvis_core::{
  Error as CoreError,
  entity::{
    Coordinates, Dimension, DimensionId, Info, Location, LocationId, Value, Variable,
    VariableId,
  },
  options::{Catalog, Options},
};

use crate::Result;

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_json(value: &serde_json::Value) -> Result<String> {
  Ok(serde_json::to_string(value)?)
}

/// NULL columns (from stores written by other tools) decode as JSON null.
pub fn decode_json(text: Option<&str>) -> Result<serde_json::Value> {
  match text {
    Some(text) => Ok(serde_json::from_str(text)?),
    None => Ok(serde_json::Value::Null),
  }
}

pub fn encode_labels(labels: Option<&[String]>) -> Result<String> {
  Ok(serde_json::to_string(&labels)?)
}

pub fn decode_labels(text: Option<&str>) -> Result<Option<Vec<String>>> {
  match text {
    Some(text) => Ok(serde_json::from_str(text)?),
    None => Ok(None),
  }
}

// ─── Write side ──────────────────────────────────────────────────────────────

pub struct RawLocation {
  pub id:       LocationId,
  pub geometry: String,
  pub metadata: String,
}

pub struct RawDimension {
  pub id:           DimensionId,
  pub name:         String,
  pub size:         u32,
  pub description:  Option<String>,
  pub value_labels: Option<String>,
}

/// A catalog with its JSON columns already serialised, so the database
/// closure only binds parameters.
pub struct EncodedCatalog {
  pub info:       Vec<Info>,
  pub locations:  Vec<RawLocation>,
  pub dimensions: Vec<RawDimension>,
  pub variables:  Vec<Variable>,
}

impl EncodedCatalog {
  pub fn encode(catalog: Catalog) -> Result<Self> {
    let locations = catalog
      .locations
      .iter()
      .map(|l| -> Result<RawLocation> {
        Ok(RawLocation {
          id:       l.id,
          geometry: encode_json(&l.geometry)?,
          metadata: encode_json(&l.metadata)?,
        })
      })
      .collect::<Result<_>>()?;

    let dimensions = catalog
      .dimensions
      .into_iter()
      .map(|d| -> Result<RawDimension> {
        Ok(RawDimension {
          value_labels: Some(encode_labels(d.value_labels.as_deref())?),
          id:           d.id,
          name:         d.name,
          size:         d.size,
          description:  d.description,
        })
      })
      .collect::<Result<_>>()?;

    Ok(Self {
      info: catalog.info,
      locations,
      dimensions,
      variables: catalog.variables,
    })
  }
}

/// Parameters for one `value` row, in column order.
pub fn value_params(
  value: &Value,
  dimension_ids: &[DimensionId],
) -> Vec<rusqlite::types::Value> {
  use rusqlite::types::Value as Sql;

  let mut params = Vec::with_capacity(dimension_ids.len() + 3);
  params.push(Sql::Integer(value.location));
  params.push(Sql::Integer(value.variable));
  for dimension in dimension_ids {
    params.push(match value.coordinates.get(*dimension) {
      Some(index) => Sql::Integer(i64::from(index)),
      None => Sql::Null,
    });
  }
  params.push(value.value.map_or(Sql::Null, Sql::Real));
  params
}

// ─── Read side ───────────────────────────────────────────────────────────────

pub struct RawStoredLocation {
  pub id:       LocationId,
  pub geometry: Option<String>,
  pub metadata: Option<String>,
}

pub struct RawValue {
  pub location:    LocationId,
  pub variable:    VariableId,
  /// One entry per dimension column, in [`RawStore::dimension_columns`]
  /// order.
  pub coordinates: Vec<Option<u32>>,
  pub value:       Option<f64>,
}

/// Everything read from a store file, before ids are cross-checked.
pub struct RawStore {
  pub info:              Vec<Info>,
  pub locations:         Vec<RawStoredLocation>,
  pub dimensions:        Vec<RawDimension>,
  pub variables:         Vec<Variable>,
  pub links:             Vec<(VariableId, DimensionId)>,
  pub dimension_columns: Vec<DimensionId>,
  pub values:            Vec<RawValue>,
}

impl RawStore {
  pub fn into_options(self) -> Result<Options> {
    let locations: Vec<Location> = self
      .locations
      .into_iter()
      .map(|l| -> Result<Location> {
        Ok(Location {
          id:       l.id,
          geometry: decode_json(l.geometry.as_deref())?,
          metadata: decode_json(l.metadata.as_deref())?,
        })
      })
      .collect::<Result<_>>()?;

    let dimensions: Vec<Dimension> = self
      .dimensions
      .into_iter()
      .map(|d| -> Result<Dimension> {
        Ok(Dimension {
          value_labels: decode_labels(d.value_labels.as_deref())?,
          id:           d.id,
          name:         d.name,
          size:         d.size,
          description:  d.description,
        })
      })
      .collect::<Result<_>>()?;

    let location_ids: HashSet<LocationId> = locations.iter().map(|l| l.id).collect();
    let dimension_ids: HashSet<DimensionId> = dimensions.iter().map(|d| d.id).collect();

    let mut variables = self.variables;
    let positions: HashMap<VariableId, usize> =
      variables.iter().enumerate().map(|(i, v)| (v.id, i)).collect();

    for (variable, dimension) in self.links {
      let owner = || format!("variable_dimension link ({variable}, {dimension})");
      let position = *positions.get(&variable).ok_or_else(|| CoreError::ReferentialIntegrity {
        owner:  owner(),
        entity: "variable",
        id:     variable,
      })?;
      if !dimension_ids.contains(&dimension) {
        return Err(
          CoreError::ReferentialIntegrity {
            owner:  owner(),
            entity: "dimension",
            id:     dimension,
          }
          .into(),
        );
      }
      variables[position].dimensions.push(dimension);
    }

    for dimension in &self.dimension_columns {
      if !dimension_ids.contains(dimension) {
        return Err(
          CoreError::ReferentialIntegrity {
            owner:  format!("value column {}", crate::schema::dimension_column(*dimension)),
            entity: "dimension",
            id:     *dimension,
          }
          .into(),
        );
      }
    }

    let values = self
      .values
      .into_iter()
      .map(|raw| -> Result<Value> {
        let coordinates: Coordinates = self
          .dimension_columns
          .iter()
          .zip(raw.coordinates)
          .filter_map(|(dimension, index)| index.map(|i| (*dimension, i)))
          .collect();

        if !location_ids.contains(&raw.location) {
          return Err(
            CoreError::ReferentialIntegrity {
              owner:  format!("value of variable {}", raw.variable),
              entity: "location",
              id:     raw.location,
            }
            .into(),
          );
        }
        let variable = positions
          .get(&raw.variable)
          .map(|i| &variables[*i])
          .ok_or_else(|| CoreError::ReferentialIntegrity {
            owner:  format!("value at location {}", raw.location),
            entity: "variable",
            id:     raw.variable,
          })?;
        if !variable.accepts(&coordinates) {
          return Err(
            CoreError::CoordinateMismatch {
              location:    raw.location,
              variable:    raw.variable,
              coordinates,
              expected:    variable.dimensions.clone(),
            }
            .into(),
          );
        }

        Ok(Value {
          location: raw.location,
          variable: raw.variable,
          coordinates,
          value: raw.value,
        })
      })
      .collect::<Result<_>>()?;

    Ok(Options {
      info: self.info,
      locations,
      dimensions,
      variables,
      values,
    })
  }
}
