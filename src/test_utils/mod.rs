/// Test utilities for `PostgreSQL`
pub mod postgres;

pub use postgres::*;
