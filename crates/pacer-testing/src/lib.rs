//! Testing utilities for Pacer
//!
//! This crate provides:
//! - A scripted LLM backend that replays canned streams and completions
//! - A delegate that records every mutation and notification

pub mod backend;
pub mod delegate;

pub use backend::{CallKind, RecordedCall, ScriptedBackend, StreamScript};
pub use delegate::{DelegateEvent, RecordingDelegate};
