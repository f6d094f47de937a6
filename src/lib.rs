pub mod config;
pub mod error;
pub mod fill;
pub mod pool;
pub mod seed;

pub mod utils;

pub use error::{FillError, Result};
