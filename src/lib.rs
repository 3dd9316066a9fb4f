//! Tableside Client Library
//!
//! This crate provides the customer-facing ordering flow for a restaurant
//! backend: menu browsing, cart management with addon pricing, checkout
//! orchestration (delivery / takeout / dine-in), and reconciliation of the
//! payment-gateway redirect against the authoritative order record.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod client;
pub mod config;
pub mod errors;
pub mod models;
pub mod services;
pub mod storage;

pub use client::ApiClient;
pub use config::{init_tracing, load_config, ClientConfig};
pub use errors::ClientError;
pub use services::cart::CartStore;
pub use services::checkout::CheckoutService;
pub use services::confirmation::ConfirmationService;
