//! API layer - HTTP endpoints and middleware

pub mod client_addr;
pub mod health;
pub mod middleware;
pub mod refresh;
pub mod router;
pub mod state;
pub mod types;
pub mod verify;

pub use router::create_router;
pub use state::AppState;
