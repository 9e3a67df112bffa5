//! State encoding for persisted meridian staking records.
//!
//! Values are encoded with the fixed-layout, little-endian codec in [`io`];
//! integers embedded in *keys* use the big-endian helpers so that byte-lex
//! iteration order equals numeric order.

pub mod application;
pub mod error;
pub mod io;
pub mod signing;
pub mod validator;

pub use error::StateError;
pub use io::{StateDecode, StateEncode};
