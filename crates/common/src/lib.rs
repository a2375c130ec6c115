pub mod config;
pub mod db;
pub mod error;
pub mod queue;
pub mod redis_pool;
pub mod types;
