//! Movie recommendation engine: latent-factor collaborative filtering,
//! TF-IDF content similarity, weighted rank fusion and an offline
//! evaluation harness, served over HTTP.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
