pub mod actions;
pub mod findings;
pub mod health;
pub mod reports;
