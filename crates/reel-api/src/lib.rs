pub mod auth;
pub mod cookies;
pub mod dto;
pub mod error;
pub mod extract;
pub mod handshake;
pub mod health;
pub mod middleware;
pub mod routes;
pub mod session;
pub mod state;
pub mod sweep;
pub mod videos;
pub mod worker;
pub mod youtube;

pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, AppStateInner, Settings};
