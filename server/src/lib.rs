//! FlightSurety backend library
//!
//! Shared modules for the API server binary and its tests.

pub mod app_state;
pub mod config;
pub mod event_listener;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
