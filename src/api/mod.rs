//! HTTP surface of the proxy

pub mod endpoints;
pub mod help;
pub mod proxy;
