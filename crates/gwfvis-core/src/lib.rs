//! Core types for the GWFVis visualization database.
//!
//! A store holds locations, dimensions, variables and one fact row per
//! `(location, variable, coordinates)` triple. This crate defines the
//! in-memory model, the derivation of new variables from existing ones, and
//! the [`store::VisStore`] trait implemented by storage backends. It has no
//! database dependency.

pub mod derive;
pub mod entity;
pub mod error;
pub mod options;
pub mod store;

pub use error::{Error, Result};
