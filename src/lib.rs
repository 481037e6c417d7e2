pub mod clock;
pub mod config;
pub mod constants;
pub mod engine;
pub mod hub;
pub mod maze;
pub mod rng;
pub mod routing;
pub mod server_protocol;
pub mod server_utils;
pub mod types;
