//! Response types shared by the route handlers

pub mod response;

pub use response::{Attachment, Created, DataResponse, NoContent};
