pub mod arena;
pub mod catalog;
pub mod constants;
pub mod driver;
pub mod engine;
pub mod pathfinding;
pub mod player_chain;
pub mod result_store;
pub mod server_protocol;
pub mod server_utils;
pub mod types;
pub mod units;
