//! Steward Core - Domain types and traits for content permission governance

pub mod capability;
pub mod error;
pub mod ids;
pub mod models;
pub mod traits;


pub use capability::*;
pub use error::*;
pub use ids::*;
pub use models::*;
pub use traits::*;
