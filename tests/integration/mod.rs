//! Integration tests for sqlguard.

pub mod pipeline_test;
pub mod postgres_test;
pub mod service_test;
