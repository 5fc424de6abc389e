//! Order and menu composition rules, independent of the HTTP layer.
//!
//! Every function here takes a `ConnectionTrait` so callers decide the
//! transaction boundary; the API layer always passes a request transaction.

pub mod lifecycle;
pub mod menu;
pub mod order_lines;
pub mod pricing;
