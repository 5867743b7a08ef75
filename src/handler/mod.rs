pub mod accounts;
pub mod auth;
pub mod extract;
pub mod health;
pub mod plaid;
pub mod profile;
pub mod transactions;
