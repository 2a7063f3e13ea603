//! Majority-vote price feeds: polls Chainlink-style feed contracts through
//! several JSON-RPC providers per network and keeps the agreed latest answer
//! for each symbol.

pub mod api;
pub mod config;
pub mod consensus;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod rpc;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod telemetry;
