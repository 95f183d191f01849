pub mod method;
pub mod request;
pub mod response;

pub use method::{Method, UnknownMethod};
pub use request::{Body, Request};
pub use response::Response;
