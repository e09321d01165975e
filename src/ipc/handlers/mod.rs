pub mod attendance;
pub mod auth;
pub mod backup_exchange;
pub mod core;
pub mod notifications;
pub mod roster;
pub mod settings;
