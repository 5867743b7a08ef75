pub mod accounts;
pub mod credentials;
pub mod transactions;
pub mod user_tokens;
pub mod users;
