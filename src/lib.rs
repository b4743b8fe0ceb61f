//! Runs a fixed sequence of bookstore queries (filters, updates, deletes, projections,
//! sorts, aggregations, index creation and an explain) against a `books` collection.
//!
//! The queries run through a [`store::BookStore`], either MongoDB via the official driver
//! or an in-process collection that evaluates the same Mongo-shaped documents.

pub mod catalog;
pub mod cli;
pub mod collection;
pub mod config;
pub mod errors;
pub mod import;
pub mod index;
pub mod query;
pub mod runner;
pub mod seed;
pub mod store;
pub mod types;
pub mod utils;

pub use errors::RunnerError;
pub use runner::{Console, OutputMode, QueryRunner, RunReport, Step, StepStatus};
pub use store::{BookStore, FindSpec, MemoryStore, MongoStore};
