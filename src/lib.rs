pub mod api;
pub mod catalog;
pub mod config;
pub mod entities;
pub mod error;
pub mod metrics;
pub mod migrator;
pub mod pipeline;
pub mod projection;
pub mod queue;
pub mod telemetry;
pub mod worker;

pub use sea_orm;
pub use redis;
