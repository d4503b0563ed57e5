//! Data models for Pairup

mod filter;
mod identity;
mod message;
mod profile;

pub use filter::*;
pub use identity::*;
pub use message::*;
pub use profile::*;
