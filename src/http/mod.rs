//! HTTP surface for the contact form endpoint.

mod dispatch;
mod handlers;
mod identity;
mod server;

pub use dispatch::{ContactMessage, Dispatcher, LogDispatcher};
pub use handlers::{AppState, ContactRequest, ErrorResponse, HealthResponse, OkResponse};
pub use identity::{resolve_identity, UNKNOWN_IDENTITY};
pub use server::{router, HttpServer};
