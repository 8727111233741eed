//! Subcommand implementations.

use std::{collections::HashMap, fmt, path::Path};

use anyhow::{Context as _, Result};
use gwfvis_core::{
  derive::DerivationRequest,
  entity::Variable,
  options::Options,
  store::{VisStore, derive_into},
};
use gwfvis_store_sqlite::SqliteStore;

pub async fn inspect(path: &Path) -> Result<Summary> {
  let options = SqliteStore::new(path)
    .read()
    .await
    .with_context(|| format!("reading {}", path.display()))?;
  Ok(Summary::of(&options))
}

pub async fn clone(source: &Path, destination: &Path) -> Result<()> {
  SqliteStore::new(source)
    .copy_to(&SqliteStore::new(destination))
    .await
    .with_context(|| format!("copying {} to {}", source.display(), destination.display()))
}

pub async fn derive(
  source: &Path,
  destination: &Path,
  request: &DerivationRequest,
) -> Result<Variable> {
  derive_into(&SqliteStore::new(source), &SqliteStore::new(destination), request)
    .await
    .with_context(|| format!("deriving {:?} from {}", request.name, source.display()))
}

// ─── Summary ─────────────────────────────────────────────────────────────────

/// Counts and names describing a store, for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
  pub name:       Option<String>,
  pub locations:  usize,
  pub dimensions: Vec<(String, u32)>,
  pub variables:  Vec<VariableSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableSummary {
  pub id:         i64,
  pub name:       String,
  pub unit:       Option<String>,
  pub dimensions: Vec<String>,
  pub values:     usize,
  pub nulls:      usize,
}

impl Summary {
  pub fn of(options: &Options) -> Self {
    let mut counts: HashMap<i64, (usize, usize)> = HashMap::new();
    for value in &options.values {
      let entry = counts.entry(value.variable).or_default();
      entry.0 += 1;
      if value.value.is_none() {
        entry.1 += 1;
      }
    }

    let variables = options
      .variables
      .iter()
      .map(|v| {
        let (values, nulls) = counts.get(&v.id).copied().unwrap_or_default();
        VariableSummary {
          id: v.id,
          name: v.name.clone(),
          unit: v.unit.clone(),
          dimensions: v
            .dimensions
            .iter()
            .map(|d| {
              options
                .dimension(*d)
                .map_or_else(|| format!("#{d}"), |d| d.name.clone())
            })
            .collect(),
          values,
          nulls,
        }
      })
      .collect();

    Self {
      name: options
        .info
        .iter()
        .find(|i| i.key == "name")
        .and_then(|i| i.value.clone()),
      locations: options.locations.len(),
      dimensions: options
        .dimensions
        .iter()
        .map(|d| (d.name.clone(), d.size))
        .collect(),
      variables,
    }
  }
}

impl fmt::Display for Summary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "name:       {}", self.name.as_deref().unwrap_or("-"))?;
    writeln!(f, "locations:  {}", self.locations)?;
    write!(f, "dimensions:")?;
    for (name, size) in &self.dimensions {
      write!(f, " {name}[{size}]")?;
    }
    writeln!(f)?;
    writeln!(f, "variables:")?;
    for v in &self.variables {
      writeln!(
        f,
        "  #{} {} ({}) over [{}]: {} values, {} null",
        v.id,
        v.name,
        v.unit.as_deref().unwrap_or("-"),
        v.dimensions.join(", "),
        v.values,
        v.nulls,
      )?;
    }
    Ok(())
  }
}
