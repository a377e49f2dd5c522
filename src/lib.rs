//! rowmill: an embeddable MySQL-compatible SQL engine core.
//!
//! The engine turns a parsed SQL statement into an analyzed plan and runs it
//! against pluggable storage. Parsing is delegated to the `sqlparser` crate
//! (MySQL dialect); storage is consumed through the traits in [`storage`];
//! the wire protocol, authentication and persistence are the host's problem.
//!
//! The pipeline, bottom up:
//! - [`types`]: SQL data types, dynamic values, schemas, coercion.
//! - [`types::expression`]: the typed expression tree.
//! - [`plan`]: relational plan nodes.
//! - [`planning`]: AST lowering into an unresolved plan.
//! - [`analyzer`]: the rule-batch fixed-point rewriter.
//! - [`execution`]: pull-based row iterators.
//! - [`engine`]: the `Engine`/`Session` front door.

pub mod analyzer;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod execution;
pub mod functions;
pub mod operators;
pub mod plan;
pub mod planning;
pub mod session;
pub mod storage;
pub mod types;
pub mod variables;

pub use engine::{Engine, ExecResult, QueryResult, Session};
pub use error::{Error, Result};
pub use types::schema::{Column, Schema};
pub use types::value::{Row, Value};
pub use types::DataType;
