pub mod automation;
pub mod config;
pub mod errors;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod platform;
pub mod server;
pub mod store;
pub mod vendors;
