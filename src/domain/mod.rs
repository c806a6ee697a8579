//! Domain types and rules, free of any I/O.

pub mod account;
pub mod auth;
pub mod credential;
pub mod keypad;
pub mod ports;
pub mod schema;
pub mod transaction;
