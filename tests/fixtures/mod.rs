// Shared helpers for integration tests
#![allow(dead_code)]

pub mod sample_notebooks;
pub mod stub_fetcher;
