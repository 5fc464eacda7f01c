// Library root: league draft engine, persistence and live sync.

pub mod auth;
pub mod config;
pub mod db;
pub mod draft;
pub mod error;
pub mod league;
pub mod notify;
pub mod pool;
pub mod ratings;
pub mod service;
pub mod sync;
