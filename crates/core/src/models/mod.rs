//! Data models for Lounge Hub

mod lounge;
mod user;

pub use lounge::*;
pub use user::*;
