//! Core application modules
//!
//! This module contains configuration, constants, logging, the chat client,
//! upstream forwarding and the proxy's cache, audit log and counters.

pub mod audit;
pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod constants;
pub mod logging;
pub mod pricing;
pub mod stats;
pub mod upstream;
