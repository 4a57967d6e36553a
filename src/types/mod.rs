//! Core batch types shared by the parser, the dispatcher and the serializer.

mod headers;
mod part;
mod request;
mod response;

pub use headers::{HeaderField, Headers};
pub use part::{RequestPart, ResponsePart};
pub use request::BatchRequest;
pub use response::BatchResponse;
