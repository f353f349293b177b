//! Micro-loan billing engine.
//!
//! Fixed-payment weekly amortization, waterfall payment allocation,
//! outstanding and delinquency reporting, and the loan lifecycle.
//! Persistence is reached only through [`repository::LoanRepository`].

pub mod allocation;
pub mod clock;
pub mod codes;
pub mod config;
pub mod delinquency;
pub mod engine;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod model;
pub mod money;
pub mod outstanding;
pub mod pricing;
pub mod repository;
pub mod schedule;
pub mod store;
pub mod types;
