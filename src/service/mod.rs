pub mod auth;
pub mod config;
pub mod linking;
pub mod profile;
pub mod query;
pub mod token;
pub mod unlink;
