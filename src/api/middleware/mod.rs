//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Auth validator: resolves the session, injects `AuthenticatedUser`
//! 2. Admin gate, on user management routes only
//! 3. Audit logger: runs after auth, has the user id

pub mod audit;
pub mod auth;
