// Common utilities and abstractions module
// Logger must be first for macro availability
#[macro_use]
pub mod logger;

pub mod constants;
pub mod subscription;
pub mod utils;
