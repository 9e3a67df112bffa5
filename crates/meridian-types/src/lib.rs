//! Core on-chain state types for the meridian service network.

pub mod application;
pub mod primitives;
pub mod signing;
pub mod validator;

pub use application::*;
pub use primitives::*;
pub use signing::*;
pub use validator::*;
