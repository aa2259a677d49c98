#![forbid(unsafe_code)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod global;
pub mod registry;
pub mod store;

#[cfg(test)]
mod tests;
