pub mod classify;
pub mod config;
pub mod confirm;
pub mod doctor;
pub mod job;
pub mod models;
pub mod names;
pub mod progress;
pub mod session;
pub mod time;
