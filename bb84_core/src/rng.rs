//! Bit sources for the key agreement.
//!
//! Every random draw in a session goes through [`RandomSource`]. Live
//! sessions use [`secure_source`], backed by the OS entropy source. For
//! reproducible tests and benches, [`derive_session_rng`] expands a seed
//! and label with BLAKE3 into a `ChaCha20Rng`, which keeps the fixed seed
//! material clearly apart from the true entropy used everywhere else.

use blake3::Hasher;
use log::warn;
use rand::rngs::OsRng;
use rand_chacha::ChaCha20Rng;
use rand_core::{CryptoRng, RngCore, SeedableRng};

use crate::bits::{Basis, Bit};
use crate::error::QkdError;

/// Uniform bit generator. Failures must be propagated by callers, never
/// replaced with a default bit.
pub trait RandomSource {
    fn next_bit(&mut self) -> Result<Bit, QkdError>;

    fn next_basis(&mut self) -> Result<Basis, QkdError> {
        self.next_bit().map(Basis::from_bit)
    }
}

impl<S: RandomSource + ?Sized> RandomSource for &mut S {
    fn next_bit(&mut self) -> Result<Bit, QkdError> {
        (**self).next_bit()
    }
}

/// Adapts a cryptographic RNG into a [`RandomSource`], pulling 64 bits at a
/// time through the fallible `try_fill_bytes` path.
pub struct EntropySource<R> {
    rng: R,
    pool: u64,
    remaining: u32,
}

impl<R: RngCore + CryptoRng> EntropySource<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            pool: 0,
            remaining: 0,
        }
    }

    fn refill(&mut self) -> Result<(), QkdError> {
        let mut buf = [0u8; 8];
        self.rng.try_fill_bytes(&mut buf).map_err(|err| {
            warn!("entropy source failed: {err}");
            QkdError::EntropyUnavailable(err.to_string())
        })?;
        self.pool = u64::from_le_bytes(buf);
        self.remaining = u64::BITS;
        Ok(())
    }
}

impl<R: RngCore + CryptoRng> RandomSource for EntropySource<R> {
    fn next_bit(&mut self) -> Result<Bit, QkdError> {
        if self.remaining == 0 {
            self.refill()?;
        }
        let bit = self.pool & 1 == 1;
        self.pool >>= 1;
        self.remaining -= 1;
        Ok(Bit::from(bit))
    }
}

/// Convenience alias for the OS-backed source used by live sessions.
pub type SecureSource = EntropySource<OsRng>;

pub fn secure_source() -> SecureSource {
    EntropySource::new(OsRng)
}

/// Deterministic RNG derived from a seed, session index, and label.
pub fn derive_session_rng(seed: &[u8], session_index: u64, label: &[u8]) -> ChaCha20Rng {
    let mut hasher = Hasher::new();
    hasher.update(b"bb84::session-rng");
    hasher.update(seed);
    hasher.update(&session_index.to_le_bytes());
    hasher.update(label);
    ChaCha20Rng::from_seed(*hasher.finalize().as_bytes())
}

/// Reproducible source for tests and benches. Never used by live sessions.
pub fn seeded_source(seed: &[u8], session_index: u64, label: &[u8]) -> EntropySource<ChaCha20Rng> {
    EntropySource::new(derive_session_rng(seed, session_index, label))
}
