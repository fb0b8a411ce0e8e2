//! Tidings: a demo chat assistant that answers weather, Formula 1 and stock
//! questions with streamed text and structured tool results.

pub mod api;
pub mod assistant;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod i18n;
pub mod models;
pub mod service;
pub mod store;
pub mod tools;
pub mod transport;
