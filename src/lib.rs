pub mod args;
pub mod catalog;
pub mod reconcile;
pub mod runner;
