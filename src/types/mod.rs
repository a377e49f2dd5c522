//! SQL types: the closed data-type family, dynamic values, schemas,
//! coercion rules, JSON documents and spatial values.

pub mod coercion;
pub mod data_type;
pub mod expression;
pub mod json;
pub mod schema;
pub mod spatial;
pub mod value;

pub use data_type::{Collation, DataType, Interval, IntervalUnit, SpatialClass};
pub use expression::Expression;
pub use schema::{Column, Schema};
pub use value::{Row, Value};
