// src/edgar/mod.rs
pub mod client;
pub mod dataset;
pub mod models;
pub mod retry;
