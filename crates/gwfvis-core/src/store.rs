//! The `VisStore` trait and the store-level derivation workflow.
//!
//! Backends (e.g. `gwfvis-store-sqlite`) implement the trait; front-ends
//! depend on the abstraction.

use std::future::Future;

use crate::{
  derive::{DerivationRequest, derive_difference},
  entity::{Value, Variable},
  options::{Catalog, Options},
};

/// A visualization database addressed by a handle, such as a file path.
///
/// Every write destroys and recreates the store; there are no partial
/// updates. A write that fails leaves no readable store behind.
pub trait VisStore: Send + Sync {
  type Error: std::error::Error + From<crate::Error> + Send + Sync + 'static;

  /// Replace the store's contents with `options`.
  fn write(&self, options: Options) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Replace the store's contents with `catalog` and the values produced by
  /// `values`, which is consumed once and never collected.
  fn write_stream<I>(
    &self,
    catalog: Catalog,
    values: I,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_
  where
    I: IntoIterator<Item = Value> + Send + 'static;

  /// Load the whole store back into memory.
  fn read(&self) -> impl Future<Output = Result<Options, Self::Error>> + Send + '_;

  /// Copy the store verbatim to `destination`, replacing whatever is there.
  fn copy_to<'a>(
    &'a self,
    destination: &'a Self,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// True if both handles address the same underlying store.
  fn is_same_store(&self, other: &Self) -> bool;
}

/// Read `source`, derive `base - subtrahend` as a new variable, and write the
/// enlarged bundle to `destination`. `source` is never modified.
pub async fn derive_into<S: VisStore>(
  source: &S,
  destination: &S,
  request: &DerivationRequest,
) -> Result<Variable, S::Error> {
  if source.is_same_store(destination) {
    return Err(crate::Error::SameStore.into());
  }

  let options = source.read().await?;
  let derived = derive_difference(&options, request)?;
  let variable = derived.variable.clone();

  destination.write(options.with_derived(derived)).await?;
  Ok(variable)
}
