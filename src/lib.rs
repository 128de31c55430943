//! Item-to-item movie recommendations from a static ratings dataset.
//!
//! The [`engine`] turns ratings into a cosine similarity matrix, the
//! [`services::Recommender`] answers queries against it, and [`api`] exposes
//! those queries over HTTP.

pub mod api;
pub mod config;
pub mod data;
pub mod db;
pub mod engine;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
