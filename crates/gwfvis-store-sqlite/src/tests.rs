//! Integration tests for `SqliteStore` against store files in a temporary
//! directory.

use gwfvis_core::{
  derive::DerivationRequest,
  entity::{Coordinates, Dimension, Info, Location, Value, Variable},
  options::Options,
  store::{VisStore, derive_into},
};
use serde_json::json;
use tempfile::TempDir;

use crate::{Error, SqliteStore};

fn dir() -> TempDir { tempfile::tempdir().expect("temp dir") }

fn store(dir: &TempDir, name: &str) -> SqliteStore { SqliteStore::new(dir.path().join(name)) }

fn t(index: u32) -> Coordinates { Coordinates::from([(0, index)]) }

fn tl(time: u32, layer: u32) -> Coordinates { Coordinates::from([(0, time), (1, layer)]) }

/// A small two-dimensional dataset in the shape of the MESH output.
fn mesh() -> Options {
  Options {
    info:       vec![
      Info::name("mesh"),
      Info::description("Bow river at Banff"),
      Info {
        key:   "location_index".into(),
        value: Some("[[1, 2]]".into()),
        label: None,
      },
    ],
    locations:  vec![
      Location::new(
        1,
        json!({
          "type": "Polygon",
          "coordinates": [[[-115.57, 51.17], [-115.5612345678901, 51.18], [-115.57, 51.17]]]
        }),
      )
      .with_metadata(json!({"COMID": 1, "name": "upper", "area": 12.75, "tags": ["a", "b"]})),
      Location::new(2, json!({"type": "Point", "coordinates": [-115.6, 51.2]})),
    ],
    dimensions: vec![
      Dimension::new(0, "time", 2),
      Dimension::new(1, "layer", 3)
        .with_description("soil layer")
        .with_value_labels(["1", "2", "3"]),
    ],
    variables:  vec![
      Variable::new(0, "STGW", [0])
        .with_unit("mm")
        .with_description("Total water storage [mm]"),
      Variable::new(1, "SNO", [0]).with_unit("mm"),
      Variable::new(2, "LQWSSOL", [0, 1]).with_unit("mm"),
    ],
    values:     vec![
      Value::new(1, 0, t(0), Some(10.0)),
      Value::new(1, 0, t(1), Some(20.0)),
      Value::new(2, 0, t(0), None),
      Value::new(2, 0, t(1), Some(-0.125)),
      Value::new(1, 1, t(0), Some(3.0)),
      Value::new(1, 1, t(1), Some(5.0)),
      Value::new(2, 1, t(0), Some(1.0)),
      Value::new(2, 1, t(1), Some(2.0)),
      Value::new(1, 2, tl(0, 0), Some(0.1)),
      Value::new(1, 2, tl(0, 2), Some(0.3)),
      Value::new(1, 2, tl(1, 1), None),
    ],
  }
}

fn files_in(dir: &TempDir) -> Vec<String> {
  let mut names: Vec<String> = std::fs::read_dir(dir.path())
    .unwrap()
    .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
    .collect();
  names.sort();
  names
}

// ─── Round trip ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn round_trip_many_dimensions() {
  let dir = dir();
  let s = store(&dir, "mesh.gwfvisdb");
  let options = mesh();

  s.write(options.clone()).await.unwrap();
  let read = s.read().await.unwrap();

  assert_eq!(read, options);
  assert_eq!(files_in(&dir), vec!["mesh.gwfvisdb"]);
}

#[tokio::test]
async fn round_trip_is_order_insensitive() {
  let dir = dir();
  let s = store(&dir, "mesh.gwfvisdb");
  let mut options = mesh();
  options.values.reverse();
  options.locations.reverse();

  s.write(options.clone()).await.unwrap();
  let read = s.read().await.unwrap();

  assert_eq!(read.normalized(), options.normalized());
}

#[tokio::test]
async fn entities_are_read_back_in_id_order() {
  let dir = dir();
  let s = store(&dir, "mesh.gwfvisdb");
  let mut options = mesh();
  options.locations.reverse();
  options.variables.reverse();
  options.dimensions.reverse();

  s.write(options.clone()).await.unwrap();
  let read = s.read().await.unwrap();

  let ids = |read: &Options| {
    (
      read.locations.iter().map(|l| l.id).collect::<Vec<_>>(),
      read.dimensions.iter().map(|d| d.id).collect::<Vec<_>>(),
      read.variables.iter().map(|v| v.id).collect::<Vec<_>>(),
    )
  };
  assert_eq!(ids(&read), (vec![1, 2], vec![0, 1], vec![0, 1, 2]));
  assert_eq!(read.info, options.info);
  assert_eq!(read.values, options.values);
  assert_eq!(read.variables[2].dimensions, vec![0, 1]);
  assert_eq!(read.normalized(), options.normalized());
}

#[tokio::test]
async fn round_trip_without_dimensions() {
  let dir = dir();
  let s = store(&dir, "stations.gwfvisdb");
  let options = Options {
    info:       vec![Info::name("stations")],
    locations:  vec![Location::new(7, json!({"type": "Point", "coordinates": [0.5, 0.5]}))],
    dimensions: vec![],
    variables:  vec![Variable::new(0, "water_level", []).with_unit("m")],
    values:     vec![Value::new(7, 0, Coordinates::new(), Some(1.5))],
  };

  s.write(options.clone()).await.unwrap();
  assert_eq!(s.read().await.unwrap(), options);
}

#[tokio::test]
async fn round_trip_scalar_dimension() {
  let dir = dir();
  let s = store(&dir, "stations.gwfvisdb");
  let mut options = Options {
    info:       vec![],
    locations:  vec![Location::new(7, json!({"type": "Point", "coordinates": [0.5, 0.5]}))],
    dimensions: vec![],
    variables:  vec![
      Variable::new(0, "water_level", []),
      Variable::new(1, "discharge", []),
    ],
    values:     vec![
      Value::new(7, 0, Coordinates::new(), Some(1.5)),
      Value::new(7, 1, Coordinates::new(), Some(30.0)),
    ],
  };
  options.attach_scalar_dimension(0).unwrap();

  s.write(options.clone()).await.unwrap();
  let read = s.read().await.unwrap();

  assert_eq!(read.dimensions, vec![Dimension::scalar(0)]);
  assert_eq!(read, options);
}

#[tokio::test]
async fn null_values_stay_null() {
  let dir = dir();
  let s = store(&dir, "mesh.gwfvisdb");
  s.write(mesh()).await.unwrap();

  let read = s.read().await.unwrap();
  let nulls: Vec<_> = read.values.iter().filter(|v| v.value.is_none()).collect();
  assert_eq!(nulls.len(), 2);
  assert_eq!(nulls[0], &Value::new(2, 0, t(0), None));
}

#[tokio::test]
async fn unused_dimension_columns_are_not_part_of_the_tuple() {
  let dir = dir();
  let s = store(&dir, "mesh.gwfvisdb");
  s.write(mesh()).await.unwrap();

  let read = s.read().await.unwrap();
  for value in read.values_of(0) {
    assert_eq!(value.coordinates.dimensions().collect::<Vec<_>>(), vec![0]);
  }
  for value in read.values_of(2) {
    assert_eq!(value.coordinates.dimensions().collect::<Vec<_>>(), vec![0, 1]);
  }
}

#[tokio::test]
async fn write_stream_consumes_a_lazy_iterator() {
  let dir = dir();
  let s = store(&dir, "grid.gwfvisdb");
  let (catalog, _) = mesh().into_parts();

  let values = (0..2u32).flat_map(|time| {
    [1, 2]
      .into_iter()
      .map(move |location| Value::new(location, 1, t(time), Some(f64::from(time))))
  });
  let count = s.write_stream(catalog, values).await.unwrap();

  assert_eq!(count, 4);
  assert_eq!(s.read().await.unwrap().values_of(1).count(), 4);
}

// ─── Write validation and atomicity ──────────────────────────────────────────

#[tokio::test]
async fn rewrite_replaces_previous_contents() {
  let dir = dir();
  let s = store(&dir, "mesh.gwfvisdb");
  s.write(mesh()).await.unwrap();

  let mut smaller = mesh();
  smaller.variables.truncate(1);
  smaller.values.retain(|v| v.variable == 0);
  s.write(smaller.clone()).await.unwrap();

  assert_eq!(s.read().await.unwrap(), smaller);
}

#[tokio::test]
async fn duplicate_key_is_rejected() {
  let dir = dir();
  let s = store(&dir, "mesh.gwfvisdb");
  let mut options = mesh();
  options.values.push(Value::new(1, 2, tl(0, 2), Some(9.9)));

  let err = s.write(options).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(gwfvis_core::Error::DuplicateValue { location: 1, variable: 2, .. })
  ));
  assert!(files_in(&dir).is_empty());
}

#[tokio::test]
async fn duplicate_key_with_unused_dimension_columns_is_rejected() {
  let dir = dir();
  let s = store(&dir, "mesh.gwfvisdb");
  let mut options = mesh();
  // STGW leaves the layer column empty; the key must still be unique.
  options.values.push(Value::new(1, 0, t(1), Some(1.0)));

  let err = s.write(options).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(gwfvis_core::Error::DuplicateValue { location: 1, variable: 0, .. })
  ));
}

#[tokio::test]
async fn failed_write_keeps_previous_store() {
  let dir = dir();
  let s = store(&dir, "mesh.gwfvisdb");
  s.write(mesh()).await.unwrap();

  let mut broken = mesh();
  broken.values.push(Value::new(1, 0, tl(0, 0), Some(1.0)));
  let err = s.write(broken).await.unwrap_err();

  assert!(matches!(
    err.as_core(),
    Some(gwfvis_core::Error::CoordinateMismatch { variable: 0, .. })
  ));
  assert!(err.as_core().unwrap().is_schema_violation());
  assert_eq!(s.read().await.unwrap(), mesh());
  assert_eq!(files_in(&dir), vec!["mesh.gwfvisdb"]);
}

#[tokio::test]
async fn value_for_unknown_location_is_rejected() {
  let dir = dir();
  let s = store(&dir, "mesh.gwfvisdb");
  let mut options = mesh();
  options.values.push(Value::new(42, 0, t(0), Some(1.0)));

  let err = s.write(options).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(gwfvis_core::Error::ReferentialIntegrity { entity: "location", id: 42, .. })
  ));
}

#[tokio::test]
async fn non_finite_value_is_rejected() {
  let dir = dir();
  let s = store(&dir, "mesh.gwfvisdb");
  s.write(mesh()).await.unwrap();

  let mut options = mesh();
  options.values[0].value = Some(f64::NAN);
  let err = s.write(options).await.unwrap_err();

  assert!(matches!(
    err,
    Error::Core(gwfvis_core::Error::NonFiniteValue { location: 1, variable: 0, .. })
  ));
  assert_eq!(s.read().await.unwrap().values[0].value, Some(10.0));
}

#[tokio::test]
async fn colliding_dimension_ids_are_rejected() {
  let dir = dir();
  let s = store(&dir, "mesh.gwfvisdb");
  let mut options = mesh();
  options.dimensions.push(Dimension::new(1, "level", 4));

  let err = s.write(options).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(gwfvis_core::Error::DuplicateId { entity: "dimension", id: 1 })
  ));
}

// ─── Read failures ───────────────────────────────────────────────────────────

#[tokio::test]
async fn reading_missing_store() {
  let dir = dir();
  let err = store(&dir, "absent.gwfvisdb").read().await.unwrap_err();
  assert!(matches!(err, Error::StoreNotFound(_)));
  assert!(files_in(&dir).is_empty());
}

#[tokio::test]
async fn reading_a_file_that_is_not_a_store() {
  let dir = dir();
  let s = store(&dir, "notes.txt");
  std::fs::write(s.path(), "definitely not sqlite, just some text padding it out").unwrap();

  let err = s.read().await.unwrap_err();
  assert!(matches!(err, Error::InvalidStore { .. }));
}

#[tokio::test]
async fn reading_a_database_without_store_tables() {
  let dir = dir();
  let s = store(&dir, "other.sqlite");
  rusqlite::Connection::open(s.path())
    .unwrap()
    .execute_batch("CREATE TABLE something (id INTEGER);")
    .unwrap();

  let err = s.read().await.unwrap_err();
  assert!(matches!(err, Error::InvalidStore { reason, .. } if reason.contains("info")));
}

/// Write rows straight into a finished store, bypassing its foreign keys.
fn tamper(s: &SqliteStore, sql: &str) {
  let conn = rusqlite::Connection::open(s.path()).unwrap();
  conn.execute_batch("PRAGMA foreign_keys = OFF;").unwrap();
  conn.execute_batch(sql).unwrap();
}

#[tokio::test]
async fn dangling_link_is_reported() {
  let dir = dir();
  let s = store(&dir, "mesh.gwfvisdb");
  s.write(mesh()).await.unwrap();
  tamper(&s, "INSERT INTO variable_dimension (variable, dimension) VALUES (1, 9);");

  let err = s.read().await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(gwfvis_core::Error::ReferentialIntegrity { entity: "dimension", id: 9, .. })
  ));
}

#[tokio::test]
async fn fact_row_for_unknown_variable_is_reported() {
  let dir = dir();
  let s = store(&dir, "mesh.gwfvisdb");
  s.write(mesh()).await.unwrap();
  tamper(
    &s,
    "INSERT INTO value (location, variable, dimension_0, value) VALUES (1, 99, 0, 1.0);",
  );

  let err = s.read().await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(gwfvis_core::Error::ReferentialIntegrity { entity: "variable", id: 99, .. })
  ));
}

#[tokio::test]
async fn fact_row_for_unknown_location_is_reported() {
  let dir = dir();
  let s = store(&dir, "mesh.gwfvisdb");
  s.write(mesh()).await.unwrap();
  tamper(
    &s,
    "INSERT INTO value (location, variable, dimension_0, value) VALUES (77, 0, 0, 1.0);",
  );

  let err = s.read().await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(gwfvis_core::Error::ReferentialIntegrity { entity: "location", id: 77, .. })
  ));
}

#[tokio::test]
async fn fact_row_with_foreign_coordinates_is_reported() {
  let dir = dir();
  let s = store(&dir, "mesh.gwfvisdb");
  s.write(mesh()).await.unwrap();
  // STGW is indexed by time only; this row also sets a layer.
  tamper(
    &s,
    "INSERT INTO value (location, variable, dimension_0, dimension_1, value)
     VALUES (1, 0, 0, 2, 1.0);",
  );

  let err = s.read().await.unwrap_err();
  match err.as_core() {
    Some(gwfvis_core::Error::CoordinateMismatch { location, variable, coordinates, expected }) => {
      assert_eq!((*location, *variable), (1, 0));
      assert_eq!(coordinates, &tl(0, 2));
      assert_eq!(expected, &vec![0]);
    }
    other => panic!("unexpected error {other:?}"),
  }
}

// ─── Clone ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn clone_reads_back_identically() {
  let dir = dir();
  let src = store(&dir, "mesh.gwfvisdb");
  let dst = store(&dir, "mesh.copy.gwfvisdb");
  src.write(mesh()).await.unwrap();

  src.copy_to(&dst).await.unwrap();

  assert_eq!(dst.read().await.unwrap(), src.read().await.unwrap());
  assert_eq!(
    std::fs::read(dst.path()).unwrap(),
    std::fs::read(src.path()).unwrap()
  );
}

#[tokio::test]
async fn clone_overwrites_destination() {
  let dir = dir();
  let src = store(&dir, "mesh.gwfvisdb");
  let dst = store(&dir, "old.gwfvisdb");
  src.write(mesh()).await.unwrap();

  let mut other = mesh();
  other.values.clear();
  dst.write(other).await.unwrap();

  src.copy_to(&dst).await.unwrap();
  assert_eq!(dst.read().await.unwrap(), mesh());
}

#[tokio::test]
async fn clone_of_missing_store() {
  let dir = dir();
  let err = store(&dir, "absent.gwfvisdb")
    .copy_to(&store(&dir, "copy.gwfvisdb"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::StoreNotFound(_)));
  assert!(files_in(&dir).is_empty());
}

#[tokio::test]
async fn clone_of_invalid_store() {
  let dir = dir();
  let src = store(&dir, "notes.txt");
  std::fs::write(src.path(), "plain text").unwrap();

  let err = src.copy_to(&store(&dir, "copy.gwfvisdb")).await.unwrap_err();
  assert!(matches!(err, Error::InvalidStore { .. }));
  assert_eq!(files_in(&dir), vec!["notes.txt"]);
}

#[tokio::test]
async fn clone_onto_itself() {
  let dir = dir();
  let src = store(&dir, "mesh.gwfvisdb");
  src.write(mesh()).await.unwrap();

  let err = src.copy_to(&src.clone()).await.unwrap_err();
  assert!(matches!(err, Error::Core(gwfvis_core::Error::SameStore)));
}

// ─── Derivation ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn derive_into_new_store() {
  let dir = dir();
  let src = store(&dir, "mesh.gwfvisdb");
  let dst = store(&dir, "mesh.new.gwfvisdb");
  src.write(mesh()).await.unwrap();
  let before = std::fs::read(src.path()).unwrap();

  let request = DerivationRequest::difference("STGW", "SNO", "new");
  let variable = derive_into(&src, &dst, &request).await.unwrap();

  assert_eq!(variable.id, 3);
  assert_eq!(variable.unit.as_deref(), Some("mm"));
  assert_eq!(std::fs::read(src.path()).unwrap(), before);

  let derived = dst.read().await.unwrap();
  assert_eq!(derived.variables.len(), 4);
  assert_eq!(derived.variables[3], variable);
  let values: Vec<_> = derived.values_of(3).cloned().collect();
  assert_eq!(values, vec![
    Value::new(1, 3, t(0), Some(7.0)),
    Value::new(1, 3, t(1), Some(15.0)),
    Value::new(2, 3, t(0), None),
    Value::new(2, 3, t(1), Some(-2.125)),
  ]);
  assert_eq!(derived.values.len(), mesh().values.len() + 4);
}

#[tokio::test]
async fn derive_with_unmatched_tuple_writes_nothing() {
  let dir = dir();
  let src = store(&dir, "mesh.gwfvisdb");
  let dst = store(&dir, "mesh.new.gwfvisdb");
  let mut options = mesh();
  options
    .values
    .retain(|v| !(v.variable == 1 && v.location == 1 && v.coordinates == t(1)));
  src.write(options).await.unwrap();

  let request = DerivationRequest::difference(0, 1, "new");
  let err = derive_into(&src, &dst, &request).await.unwrap_err();

  assert!(matches!(
    err,
    Error::Core(gwfvis_core::Error::UnmatchedTuple { variable: 1, location: 1, .. })
  ));
  assert_eq!(files_in(&dir), vec!["mesh.gwfvisdb"]);
}

#[tokio::test]
async fn derive_refuses_to_overwrite_source() {
  let dir = dir();
  let src = store(&dir, "mesh.gwfvisdb");
  src.write(mesh()).await.unwrap();

  let request = DerivationRequest::difference("STGW", "SNO", "new");
  let err = derive_into(&src, &src.clone(), &request).await.unwrap_err();
  assert!(matches!(err, Error::Core(gwfvis_core::Error::SameStore)));
  assert_eq!(src.read().await.unwrap(), mesh());
}

#[tokio::test]
async fn catalog_only_store() {
  let dir = dir();
  let s = store(&dir, "empty.gwfvisdb");
  let (catalog, _) = mesh().into_parts();

  let count = s.write_stream(catalog.clone(), Vec::new()).await.unwrap();
  assert_eq!(count, 0);
  assert_eq!(s.read().await.unwrap(), Options::from_parts(catalog, vec![]));
}
