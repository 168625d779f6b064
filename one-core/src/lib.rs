//! Core types and engines for One.
//!
//! This crate is provider-agnostic. It provides:
//! - the data model mirrored from the remote calendar (`event`, `calendar`, `credential`)
//! - the `remote` seam a calendar provider implements
//! - SQLite-backed stores for credentials and the event mirror (`store`)
//! - the calendar client adapter with credential rotation (`client`)
//! - the sync engine, mutation gateway and assistant tool layer

pub mod assistant;
pub mod calendar;
pub mod client;
pub mod color;
pub mod credential;
pub mod date_range;
pub mod error;
pub mod event;
pub mod holiday;
pub mod ingest;
pub mod mutation;
pub mod remote;
pub mod store;
pub mod sync;

pub use error::{OneError, OneResult};
