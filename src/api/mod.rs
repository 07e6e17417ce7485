//! Thin REST boundary: token issuing, game creation, listing and seating.

pub mod errors;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
