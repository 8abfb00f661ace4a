//! sqlguard - verified SQL rewrites.
//!
//! Generates candidate rewrites of a SELECT statement under a catalog of
//! instructions, executes each candidate next to the original and keeps the
//! one whose results match. Callers go through [`service::RewriteService`],
//! which adds admission control and a safety filter in front of the engine.

pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod logging;
pub mod rate_limit;
pub mod rewrite;
pub mod safety;
pub mod service;
