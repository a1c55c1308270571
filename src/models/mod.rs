//! API data models
//!
//! This module contains data structures for the OpenAI chat completion API.

pub mod openai;
