//! Schema reconciliation: year-specific raw field names -> canonical metrics.

pub mod aliases;
pub mod name_map;
pub mod reconciler;

pub use aliases::AliasTable;
pub use name_map::{VariableNameEntry, VariableNameMap};
pub use reconciler::{numeric, NormalizedRecord, ResolvedValue, SchemaReconciler};
