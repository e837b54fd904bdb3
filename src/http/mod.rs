//! HTTP adapter exposing the rate limiter in front of a protected resource.

mod response;
mod routes;
mod server;

pub use response::{DebugStateResponse, ErrorResponse, HealthResponse, ResourceResponse};
pub use routes::{router, API_KEY_HEADER};
pub use server::HttpServer;
