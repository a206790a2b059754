pub mod config;
pub mod error;
pub mod extract;
pub mod io;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod tokens;

pub use error::{Result, ToolError};
