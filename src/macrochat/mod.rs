// src/macrochat/mod.rs

pub mod config;
pub mod conversation;
pub mod conversation_store;
pub mod engine;
pub mod provider;
pub mod providers;
pub mod resource_cache;
pub mod tool_gateway;
pub mod tool_protocol;
pub mod tool_transports;

// Explicitly export the engine so callers can reach it as macrochat::ChatEngine
// instead of macrochat::engine::ChatEngine.
pub use engine::ChatEngine;
