//! Administrative statements: classification and dispatch.

pub mod classifier;
pub mod dispatcher;

pub use classifier::{classify, split_statements, AdminStatement, Statement};
pub use dispatcher::AdminDispatcher;
