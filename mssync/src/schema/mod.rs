pub mod probe;
pub mod reconcile;

pub use reconcile::{ColumnPair, Projection, ProjectionEntry, Reconciled, reconcile};
