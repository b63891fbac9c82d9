//! CRUD translation for the key-addressed engine.
//!
//! # Architecture
//!
//! - **Operation**: builder-produced descriptor (`Operation`, `QueryKind`, `CrudOutcome`)
//! - **Crud**: key lookup, value merging and the transactional/direct paths
//!   (`CrudTranslator`, `Target`)
//! - **Key Shape**: single vs. composite key-batch arguments
//! - **Value Conversion**: SeaQuery `Value` to JSON parameters and `@pN` placeholders
//!
//! # Examples
//!
//! ```no_run
//! use sea_query::{Condition, Expr, ExprTrait};
//! use spanguard::query::Operation;
//!
//! let op = Operation::delete("orders")
//!     .filter(Condition::all().add(Expr::col("total").gt(100)));
//! # let _ = op;
//! ```

pub mod crud;
pub mod key_shape;
pub mod operation;
pub mod value_conversion;

pub use crud::{build_key_lookup, build_select, CrudTranslator, Target};
pub use key_shape::shape_keys;
pub use operation::{CrudOutcome, Operation, QueryKind};
pub use value_conversion::{positional_params, render_select, rewrite_placeholders, value_to_json};
