pub mod reconcile;
pub mod scan;
