pub mod api;
pub mod models;
pub mod patch;

pub use patch::Patch;
