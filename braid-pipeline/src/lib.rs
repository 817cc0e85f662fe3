#![deny(missing_docs)]
//! Module combinators and the stage DAG for braid.
//!
//! [`FnModule`] wraps a plain mapping, [`Sequential`] and [`Fanout`]
//! compose modules, and [`Pipeline`] compiles a set of dependent stages
//! into a batched execution plan and runs it — independent stages
//! concurrently, batches in order. A compiled pipeline is itself a
//! [`braid_core::Module`], so pipelines nest and the optimizer treats
//! them like any other program.

pub mod combinators;
pub mod dag;

pub use combinators::{Fanout, FnModule, Sequential};
pub use dag::{Pipeline, Stage};
