//! Command-line client for the panel application and client APIs.
//!
//! The [`http`] engine issues authenticated requests and classifies
//! responses, [`http::response`] strips JSON:API envelopes, and [`input`]
//! turns `key=value` shorthand into request bodies. Everything under
//! [`commands`] is a thin call site over those pieces.

pub mod cli;
pub mod commands;
pub mod config;
pub mod http;
pub mod input;
pub mod logger;
