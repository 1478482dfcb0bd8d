//! REST collaborator
//!
//! Plain request/response calls to the HTTP API: `(method, path, body)` in,
//! response bytes or an error out.

mod client;
mod error;

pub use client::{HttpRestClient, Method, RestTransport, MAX_PATH_LEN};
pub use error::RestError;
