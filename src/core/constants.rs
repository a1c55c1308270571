//! Shared constants
//!
//! Message roles, model names, headers and fixed error messages used across
//! the proxy and the chat client.

/// Message role constants
pub mod role {
    /// User role identifier
    pub const USER: &str = "user";
}

/// Model name constants
pub mod model {
    /// Model recorded for requests that do not name one
    pub const FALLBACK: &str = "utility";

    /// Model used by the chat client when none is configured
    pub const DEFAULT_CHAT: &str = "gpt-3.5-turbo";
}

/// Header constants
pub mod header {
    /// Reports whether a response came from the disk cache
    pub const CACHE_STATUS: &str = "x-proxai-cache";

    pub const CACHE_HIT: &str = "hit";
    pub const CACHE_MISS: &str = "miss";

    /// Prefix required on the Authorization header
    pub const BEARER_PREFIX: &str = "Bearer ";
}

/// Client-facing error messages
pub mod message {
    pub const INTERNAL_ERROR: &str = "Internal Server Error";
}

/// Default prompt sent by `proxai chat`
pub const DEFAULT_PROMPT: &str = "Say this is a test";
