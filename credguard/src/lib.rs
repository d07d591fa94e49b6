//! Input-sanitization and persistence-guard helpers for a backend service:
//! credential registration over a pluggable store, range-safe numeric
//! narrowing, and structured logger construction.

pub mod config;
pub mod context;
pub mod crypto;
pub mod logging;
pub mod numeric;
pub mod registrar;
pub mod repository;
