//! Backend implementations.

pub mod openai;
