//! Inbox Responder: answers a Gmail inbox with LLM-written replies.

pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod store;
