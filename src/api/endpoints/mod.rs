//! API endpoint handlers, one module per resource.
//!
//! Handlers open their own connection, validate input before any write
//! and reuse the library modules for the actual work.

pub mod auth;
pub mod funnels;
pub mod health;
pub mod hospitals;
pub mod patients;
pub mod reference;
pub mod users;
pub mod whatsapp;
pub mod workspace;

/// Serde default for `active` flags on create/update bodies.
pub(crate) fn active_by_default() -> bool {
    true
}
