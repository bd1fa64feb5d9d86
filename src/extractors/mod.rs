// src/extractors/mod.rs
pub mod batch;
pub mod lookups;
pub mod period;
pub mod statement;
