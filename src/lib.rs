//! Library crate for puzzle-sync-back, exposing modules for binaries and integration tests.

/// Player-side sync agent and reconnection resolver.
pub mod client;
/// Application configuration.
pub mod config;
/// Persistence of the two game documents.
pub mod dao;
/// Wire payloads.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// HTTP routes.
pub mod routes;
/// Operations behind the routes.
pub mod services;
/// Shared state, game engine and mutation gate.
pub mod state;
