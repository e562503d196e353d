pub mod health;
pub mod sources;
