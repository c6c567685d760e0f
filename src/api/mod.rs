//! HTTP API.
//!
//! Exposes the CRM over JSON routes nested under `/api/`. Everything but
//! health and the sign-up/sign-in/sign-out routes requires a bearer
//! session token.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::{api_router, build_router};
pub use server::{serve, start_server_on, ApiServer};
pub use types::ApiContext;
