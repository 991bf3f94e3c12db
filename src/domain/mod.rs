//! Domain types and DTOs
//!
//! Entities of the tender drafting workflow and the request/response shapes
//! that carry them across the HTTP boundary.

pub mod documents;
pub mod organizations;
pub mod projects;
pub mod work_packages;

// Re-export commonly used types
pub use documents::*;
pub use organizations::*;
pub use projects::*;
pub use work_packages::*;
