//! SQL schema for a visualization database.
//!
//! Five tables are fixed. The `value` fact table is shaped by the store's
//! dimensions: one nullable integer column `dimension_<id>` per dimension,
//! all of them part of the primary key. [`ValueTableSchema`] describes that
//! table as data and renders it to SQL.

use std::collections::HashSet;

use gwfvis_core::entity::{Dimension, DimensionId};

/// Tables every store must contain.
pub const TABLES: [&str; 6] = [
  "info",
  "location",
  "dimension",
  "variable",
  "variable_dimension",
  "value",
];

/// DDL for the tables whose shape does not depend on the data.
pub const FIXED_SCHEMA: &str = "
CREATE TABLE info (
    key   VARCHAR PRIMARY KEY,
    value TEXT,
    label VARCHAR
);

-- geometry and metadata are JSON text.
CREATE TABLE location (
    id       INTEGER PRIMARY KEY,
    geometry TEXT,
    metadata TEXT
);

-- value_labels is a JSON array, or JSON null when absent.
CREATE TABLE dimension (
    id           INTEGER PRIMARY KEY,
    name         VARCHAR NOT NULL,
    size         INTEGER NOT NULL,
    description  TEXT,
    value_labels TEXT
);

CREATE TABLE variable (
    id          INTEGER PRIMARY KEY,
    name        VARCHAR NOT NULL,
    unit        VARCHAR,
    description TEXT
);

CREATE TABLE variable_dimension (
    variable  INTEGER NOT NULL,
    dimension INTEGER NOT NULL,
    FOREIGN KEY (variable)  REFERENCES variable (id),
    FOREIGN KEY (dimension) REFERENCES dimension (id),
    PRIMARY KEY (variable, dimension)
);
";

/// Stands in for NULL coordinates in the uniqueness index; indices are
/// never negative.
const NULL_COORDINATE: i64 = -1;

const DIMENSION_PREFIX: &str = "dimension_";

pub fn dimension_column(id: DimensionId) -> String { format!("{DIMENSION_PREFIX}{id}") }

/// Inverse of [`dimension_column`]; `None` for any other column name.
pub fn parse_dimension_column(name: &str) -> Option<DimensionId> {
  let id: DimensionId = name.strip_prefix(DIMENSION_PREFIX)?.parse().ok()?;
  (dimension_column(id) == name).then_some(id)
}

fn quote(identifier: &str) -> String { format!("\"{}\"", identifier.replace('"', "\"\"")) }

// ─── Column descriptors ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
  Integer,
  Real,
}

impl ColumnKind {
  fn sql(self) -> &'static str {
    match self {
      Self::Integer => "INTEGER",
      Self::Real => "FLOAT",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
  pub name:      String,
  pub kind:      ColumnKind,
  pub nullable:  bool,
  /// Set for the per-dimension coordinate columns.
  pub dimension: Option<DimensionId>,
}

impl Column {
  fn required(name: &str, kind: ColumnKind) -> Self {
    Self { name: name.to_owned(), kind, nullable: false, dimension: None }
  }

  fn definition(&self) -> String {
    let null = if self.nullable { "" } else { " NOT NULL" };
    format!("{} {}{null}", quote(&self.name), self.kind.sql())
  }
}

// ─── Value table ─────────────────────────────────────────────────────────────

/// The fact table layout for one set of dimensions.
///
/// Columns are `location`, `variable`, one `dimension_<id>` per dimension
/// in the given order, then `value`. The primary key covers every column
/// except `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueTableSchema {
  columns: Vec<Column>,
}

impl ValueTableSchema {
  /// Fails if two dimensions share an id, since they would share a column.
  pub fn from_dimensions(dimensions: &[Dimension]) -> gwfvis_core::Result<Self> {
    Self::from_dimension_ids(dimensions.iter().map(|d| d.id))
  }

  /// Layout over bare dimension ids, as discovered in an existing table.
  pub fn from_dimension_ids(
    ids: impl IntoIterator<Item = DimensionId>,
  ) -> gwfvis_core::Result<Self> {
    let mut seen = HashSet::new();
    let mut columns = vec![
      Column::required("location", ColumnKind::Integer),
      Column::required("variable", ColumnKind::Integer),
    ];

    for id in ids {
      if !seen.insert(id) {
        return Err(gwfvis_core::Error::DuplicateId { entity: "dimension", id });
      }
      columns.push(Column {
        name:      dimension_column(id),
        kind:      ColumnKind::Integer,
        nullable:  true,
        dimension: Some(id),
      });
    }

    columns.push(Column {
      name:      "value".to_owned(),
      kind:      ColumnKind::Real,
      nullable:  true,
      dimension: None,
    });

    Ok(Self { columns })
  }

  pub fn dimension_ids(&self) -> impl Iterator<Item = DimensionId> + '_ {
    self.columns.iter().filter_map(|c| c.dimension)
  }

  pub fn primary_key(&self) -> impl Iterator<Item = &Column> {
    self.columns.iter().filter(|c| c.name != "value")
  }

  pub fn create_table_sql(&self) -> String {
    let mut parts: Vec<String> = self.columns.iter().map(Column::definition).collect();
    parts.push("FOREIGN KEY (\"variable\") REFERENCES variable (id)".to_owned());
    parts.push(format!(
      "PRIMARY KEY ({})",
      self
        .primary_key()
        .map(|c| quote(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
    ));
    format!("CREATE TABLE \"value\" (\n    {}\n)", parts.join(",\n    "))
  }

  /// SQLite lets NULLs repeat inside a composite primary key, so rows that
  /// leave a dimension column empty need this index to stay unique.
  pub fn unique_index_sql(&self) -> String {
    let key = self
      .primary_key()
      .map(|c| match c.dimension {
        Some(_) => format!("IFNULL({}, {NULL_COORDINATE})", quote(&c.name)),
        None => quote(&c.name),
      })
      .collect::<Vec<_>>()
      .join(", ");
    format!("CREATE UNIQUE INDEX value_key ON \"value\" ({key})")
  }

  pub fn insert_sql(&self) -> String {
    let names = self
      .columns
      .iter()
      .map(|c| quote(&c.name))
      .collect::<Vec<_>>()
      .join(", ");
    let params = (1..=self.columns.len())
      .map(|i| format!("?{i}"))
      .collect::<Vec<_>>()
      .join(", ");
    format!("INSERT INTO \"value\" ({names}) VALUES ({params})")
  }

  pub fn select_sql(&self) -> String {
    let names = self
      .columns
      .iter()
      .map(|c| quote(&c.name))
      .collect::<Vec<_>>()
      .join(", ");
    format!("SELECT {names} FROM \"value\" ORDER BY rowid")
  }
}
