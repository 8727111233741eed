//! [`SqliteStore`]: the SQLite implementation of [`VisStore`].

use std::{
  io,
  path::{Path, PathBuf},
};

use gwfvis_core::{
  entity::{Info, Value, Variable},
  options::{Catalog, Options, ValueValidator},
  store::VisStore,
};
use rusqlite::OpenFlags;
use tracing::{debug, info, warn};

use crate::{
  Error, Result,
  encode::{EncodedCatalog, RawDimension, RawStore, RawStoredLocation, RawValue, value_params},
  schema::{FIXED_SCHEMA, TABLES, ValueTableSchema, parse_dimension_column},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A visualization database stored as a single SQLite file.
///
/// The handle is only a path; each operation opens its own connection and
/// closes it before returning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteStore {
  path: PathBuf,
}

impl SqliteStore {
  pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

  pub fn path(&self) -> &Path { &self.path }

  /// Sibling file the next write is built in before being renamed over
  /// `path`. Same directory, so the rename never crosses filesystems.
  fn staging_path(&self) -> PathBuf {
    let name = self
      .path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| "store".to_owned());
    self
      .path
      .with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()))
  }

  async fn ensure_exists(&self) -> Result<()> {
    match tokio::fs::metadata(&self.path).await {
      Ok(meta) if meta.is_file() => Ok(()),
      Ok(_) => Err(Error::StoreNotFound(self.path.clone())),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        Err(Error::StoreNotFound(self.path.clone()))
      }
      Err(e) => Err(e.into()),
    }
  }

  /// Open the existing file read-only; never creates a database.
  async fn open_existing(&self) -> Result<tokio_rusqlite::Connection> {
    self.ensure_exists().await?;
    let conn = tokio_rusqlite::Connection::open_with_flags(
      &self.path,
      OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .await?;
    Ok(conn)
  }

  /// Check that the open file is a database holding every store table.
  async fn verify_tables(&self, conn: &tokio_rusqlite::Connection) -> Result<()> {
    let names: std::result::Result<Vec<String>, String> = conn
      .call(|conn| {
        let listed = conn
          .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")
          .and_then(|mut stmt| {
            let names = stmt
              .query_map([], |row| row.get(0))?
              .collect::<rusqlite::Result<Vec<String>>>();
            names
          });
        // A file that is not SQLite at all fails here.
        Ok(listed.map_err(|e| e.to_string()))
      })
      .await?;

    let names = names.map_err(|reason| Error::InvalidStore {
      path: self.path.clone(),
      reason,
    })?;

    if let Some(missing) = TABLES.iter().find(|t| !names.iter().any(|n| n == *t)) {
      return Err(Error::InvalidStore {
        path:   self.path.clone(),
        reason: format!("missing table {missing:?}"),
      });
    }
    Ok(())
  }

  /// Build a complete store in `staging`. Returns the number of values.
  async fn build(
    staging: &Path,
    catalog: EncodedCatalog,
    schema: ValueTableSchema,
    validator: ValueValidator,
    values: impl IntoIterator<Item = Value> + Send + 'static,
  ) -> Result<u64> {
    let conn = tokio_rusqlite::Connection::open(staging).await?;

    let result = conn
      .call(move |conn| {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let tx = conn.transaction()?;

        tx.execute_batch(FIXED_SCHEMA)?;
        let create_value = schema.create_table_sql();
        debug!(sql = %create_value, "creating value table");
        tx.execute(&create_value, [])?;
        tx.execute(&schema.unique_index_sql(), [])?;

        insert_catalog(&tx, &catalog)?;
        let count = insert_values(&tx, &schema, &validator, values)?;

        tx.commit()?;
        Ok(count)
      })
      .await
      .map_err(Error::from_call);

    // Release the file before it is renamed or removed.
    let closed = conn.close().await;
    let count = result?;
    closed?;
    Ok(count)
  }
}

/// Delete `path`, treating "already gone" as success.
async fn remove_if_exists(path: &Path) -> Result<()> {
  match tokio::fs::remove_file(path).await {
    Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
    _ => Ok(()),
  }
}

/// Move a finished staging file over `destination`, or delete it if the
/// step that produced it failed.
async fn publish<T>(staging: &Path, destination: &Path, outcome: Result<T>) -> Result<T> {
  let outcome = match outcome {
    Ok(value) => tokio::fs::rename(staging, destination)
      .await
      .map(|()| value)
      .map_err(Error::from),
    Err(e) => Err(e),
  };

  if outcome.is_err()
    && let Err(cleanup) = remove_if_exists(staging).await
  {
    warn!(path = %staging.display(), error = %cleanup, "failed to remove staging file");
  }
  outcome
}

// ─── Inserts ─────────────────────────────────────────────────────────────────

fn insert_catalog(tx: &rusqlite::Transaction<'_>, catalog: &EncodedCatalog) -> rusqlite::Result<()> {
  let mut stmt = tx.prepare("INSERT INTO info (key, value, label) VALUES (?1, ?2, ?3)")?;
  for Info { key, value, label } in &catalog.info {
    stmt.execute(rusqlite::params![key, value, label])?;
  }

  let mut stmt = tx.prepare("INSERT INTO location (id, geometry, metadata) VALUES (?1, ?2, ?3)")?;
  for location in &catalog.locations {
    stmt.execute(rusqlite::params![location.id, location.geometry, location.metadata])?;
  }

  let mut stmt = tx.prepare(
    "INSERT INTO dimension (id, name, size, description, value_labels)
     VALUES (?1, ?2, ?3, ?4, ?5)",
  )?;
  for d in &catalog.dimensions {
    stmt.execute(rusqlite::params![d.id, d.name, d.size, d.description, d.value_labels])?;
  }

  let mut stmt =
    tx.prepare("INSERT INTO variable (id, name, unit, description) VALUES (?1, ?2, ?3, ?4)")?;
  for v in &catalog.variables {
    stmt.execute(rusqlite::params![v.id, v.name, v.unit, v.description])?;
  }

  let mut stmt =
    tx.prepare("INSERT INTO variable_dimension (variable, dimension) VALUES (?1, ?2)")?;
  for v in &catalog.variables {
    for dimension in &v.dimensions {
      stmt.execute(rusqlite::params![v.id, dimension])?;
    }
  }

  info!(
    info = catalog.info.len(),
    locations = catalog.locations.len(),
    dimensions = catalog.dimensions.len(),
    variables = catalog.variables.len(),
    "wrote catalog"
  );
  Ok(())
}

/// Consume `values` once, validating and inserting each row.
fn insert_values(
  tx: &rusqlite::Transaction<'_>,
  schema: &ValueTableSchema,
  validator: &ValueValidator,
  values: impl IntoIterator<Item = Value>,
) -> tokio_rusqlite::Result<u64> {
  let dimension_ids: Vec<_> = schema.dimension_ids().collect();
  let mut stmt = tx.prepare(&schema.insert_sql())?;
  let mut count = 0u64;

  for value in values {
    validator.check(&value).map_err(other)?;
    let params = value_params(&value, &dimension_ids);
    match stmt.execute(rusqlite::params_from_iter(params)) {
      Ok(_) => count += 1,
      Err(e) if is_key_violation(&e) => {
        return Err(other(gwfvis_core::Error::DuplicateValue {
          location:    value.location,
          variable:    value.variable,
          coordinates: value.coordinates,
        }));
      }
      Err(e) => return Err(e.into()),
    }
  }

  info!(values = count, "wrote values");
  Ok(count)
}

fn other(err: gwfvis_core::Error) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(err))
}

fn is_key_violation(err: &rusqlite::Error) -> bool {
  matches!(
    err,
    rusqlite::Error::SqliteFailure(e, _)
      if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
  )
}

// ─── Reads ───────────────────────────────────────────────────────────────────

/// Entity tables keyed by `id INTEGER PRIMARY KEY` come back in id order;
/// the others in insertion order.
fn read_raw(conn: &rusqlite::Connection) -> tokio_rusqlite::Result<RawStore> {
  let info = conn
    .prepare("SELECT key, value, label FROM info ORDER BY rowid")?
    .query_map([], |row| {
      Ok(Info {
        key:   row.get(0)?,
        value: row.get(1)?,
        label: row.get(2)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let locations = conn
    .prepare("SELECT id, geometry, metadata FROM location ORDER BY id")?
    .query_map([], |row| {
      Ok(RawStoredLocation {
        id:       row.get(0)?,
        geometry: row.get(1)?,
        metadata: row.get(2)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let dimensions = conn
    .prepare("SELECT id, name, size, description, value_labels FROM dimension ORDER BY id")?
    .query_map([], |row| {
      Ok(RawDimension {
        id:           row.get(0)?,
        name:         row.get(1)?,
        size:         row.get(2)?,
        description:  row.get(3)?,
        value_labels: row.get(4)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let variables = conn
    .prepare("SELECT id, name, unit, description FROM variable ORDER BY id")?
    .query_map([], |row| {
      Ok(Variable {
        id:          row.get(0)?,
        name:        row.get(1)?,
        unit:        row.get(2)?,
        description: row.get(3)?,
        dimensions:  Vec::new(),
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let links = conn
    .prepare("SELECT variable, dimension FROM variable_dimension ORDER BY rowid")?
    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  // The fact table's shape is only known from its columns.
  let discovered = conn
    .prepare("SELECT name FROM pragma_table_info('value') ORDER BY cid")?
    .query_map([], |row| row.get::<_, String>(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?
    .iter()
    .filter_map(|name| parse_dimension_column(name))
    .collect::<Vec<_>>();
  let schema = ValueTableSchema::from_dimension_ids(discovered).map_err(other)?;
  let dimension_columns: Vec<_> = schema.dimension_ids().collect();

  let width = dimension_columns.len();
  let values = conn
    .prepare(&schema.select_sql())?
    .query_map([], |row| {
      Ok(RawValue {
        location:    row.get(0)?,
        variable:    row.get(1)?,
        coordinates: (0..width)
          .map(|i| row.get(2 + i))
          .collect::<rusqlite::Result<_>>()?,
        value:       row.get(2 + width)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  Ok(RawStore {
    info,
    locations,
    dimensions,
    variables,
    links,
    dimension_columns,
    values,
  })
}

// ─── VisStore impl ───────────────────────────────────────────────────────────

impl VisStore for SqliteStore {
  type Error = Error;

  async fn write(&self, options: Options) -> Result<()> {
    let (catalog, values) = options.into_parts();
    self.write_stream(catalog, values).await?;
    Ok(())
  }

  async fn write_stream<I>(&self, catalog: Catalog, values: I) -> Result<u64>
  where
    I: IntoIterator<Item = Value> + Send + 'static,
  {
    let validator = catalog.validator()?;
    let schema = ValueTableSchema::from_dimensions(&catalog.dimensions)?;
    let encoded = EncodedCatalog::encode(catalog)?;

    let staging = self.staging_path();
    remove_if_exists(&staging).await?;
    debug!(path = %staging.display(), "building store");

    let built = Self::build(&staging, encoded, schema, validator, values).await;
    let count = publish(&staging, &self.path, built).await?;

    info!(path = %self.path.display(), values = count, "store written");
    Ok(count)
  }

  async fn read(&self) -> Result<Options> {
    let conn = self.open_existing().await?;
    let verified = self.verify_tables(&conn).await;
    let raw = match verified {
      Ok(()) => conn.call(|conn| read_raw(conn)).await.map_err(Error::from_call),
      Err(e) => Err(e),
    };
    let closed = conn.close().await;

    let raw = raw?;
    closed?;
    let options = raw.into_options()?;
    info!(
      path = %self.path.display(),
      locations = options.locations.len(),
      variables = options.variables.len(),
      values = options.values.len(),
      "store read"
    );
    Ok(options)
  }

  async fn copy_to<'a>(&'a self, destination: &'a Self) -> Result<()> {
    if self.is_same_store(destination) {
      return Err(gwfvis_core::Error::SameStore.into());
    }

    let conn = self.open_existing().await?;
    let verified = self.verify_tables(&conn).await;
    let closed = conn.close().await;
    verified?;
    closed?;

    let staging = destination.staging_path();
    remove_if_exists(&staging).await?;
    let copied = tokio::fs::copy(&self.path, &staging).await.map_err(Error::from);
    let bytes = publish(&staging, &destination.path, copied).await?;

    info!(
      from = %self.path.display(),
      to = %destination.path.display(),
      bytes,
      "store cloned"
    );
    Ok(())
  }

  fn is_same_store(&self, other: &Self) -> bool {
    if self.path == other.path {
      return true;
    }
    match (self.path.canonicalize(), other.path.canonicalize()) {
      (Ok(a), Ok(b)) => a == b,
      _ => false,
    }
  }
}
