//! Display codes for loans and payments (`LOA-20260101-417`).
//!
//! Codes are for humans only; records are keyed by entity id.
//! The generator is not the only issuer of codes (other processes write
//! to the same store), so callers check each draw against the repository
//! and draw again on a collision. A fixed seed reproduces a run's codes;
//! without one the stream is seeded from OS entropy.

use crate::types::Timestamp;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

pub const LOAN_CODE_PREFIX: &str = "LOA";
pub const PAYMENT_CODE_PREFIX: &str = "PAY";

pub trait CodeGenerator: Send {
    /// `PREFIX-YYYYMMDD-NNN`, NNN in 100..=999.
    fn next_code(&mut self, prefix: &str, at: Timestamp) -> String;
}

pub struct SeededCodeGenerator {
    inner: Pcg64Mcg,
}

impl SeededCodeGenerator {
    pub fn new(seed: u64) -> Self {
        Self { inner: Pcg64Mcg::seed_from_u64(seed) }
    }

    pub fn from_entropy() -> Self {
        Self { inner: Pcg64Mcg::from_entropy() }
    }
}

impl CodeGenerator for SeededCodeGenerator {
    fn next_code(&mut self, prefix: &str, at: Timestamp) -> String {
        let suffix: u32 = self.inner.gen_range(100..1000);
        format!("{prefix}-{}-{suffix}", at.format("%Y%m%d"))
    }
}
