mod catalog;
pub mod dto;
pub mod response;
mod router;
mod sync;

pub use router::{AppState, create_router};
