//! Adapters between the views and the outside world: terminal and CSV files.

pub mod console;
pub mod csv;
