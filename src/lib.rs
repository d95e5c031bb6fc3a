//! WA-Checker - Batch WhatsApp Number Verification
//!
//! Each authenticated user owns one automation session against the messaging
//! network and can submit batches of phone numbers, watching live progress
//! over a WebSocket stream shared by all of their open browser tabs.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
