pub mod request_id;

pub use request_id::{request_id, request_id_layer};
