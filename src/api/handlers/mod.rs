//! API request handlers

pub mod health;
pub mod rpc;
