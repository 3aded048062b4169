pub mod config;
pub mod dates;
pub mod error;
pub mod identity;
pub mod io;
pub mod merge;
pub mod model;
pub mod report;
pub mod schema;
pub mod sync;
pub mod tags;
pub mod warning;

pub use error::{Result, ToolError};
