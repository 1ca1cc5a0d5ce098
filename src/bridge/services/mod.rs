pub mod auth;
pub mod health;
pub mod reading;
pub mod session;
