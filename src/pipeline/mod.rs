//! Message processing pipeline.
//!
//! Each poll cycle runs fetched messages through:
//! 1. `SpamFilter::evaluate()`: weighted heuristics, no LLM
//! 2. `Categorizer::analyze()`: category and sentiment
//! 3. `ResponseGenerator::generate()`: LLM reply, fallback template on failure
//! 4. `MailboxProcessor`: threading, send, record, acknowledge

pub mod categorizer;
pub mod filter;
pub mod poller;
pub mod processor;
pub mod responder;
pub mod types;
