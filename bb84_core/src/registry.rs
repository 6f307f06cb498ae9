//! Holder of the active session/channel pair for request handlers.
//!
//! The host builds one [`SessionRegistry`] at start-up and shares it (for
//! example behind an `Arc`) with every handler. A single mutex guards both
//! the active pair and the channel history; each method holds it for one
//! logical operation. Key agreement runs outside the lock and only the swap
//! happens under it. Re-initializing drops the previous pair and its
//! history.
//!
//! Operations racing with a re-initialize belong to whichever pair their
//! lock acquisition observed; no generation tracking is done here.

use std::sync::{Mutex, MutexGuard, PoisonError};

use log::info;

use crate::bits::SharedKey;
use crate::channel::{KeyedChannel, Message, decrypt_with_key};
use crate::config::SessionConfig;
use crate::error::QkdError;
use crate::rng::{RandomSource, secure_source};
use crate::session::{KeyAgreementSession, SessionSummary};

struct ActivePair {
    session: KeyAgreementSession,
    channel: KeyedChannel,
}

#[derive(Default)]
pub struct SessionRegistry {
    active: Mutex<Option<ActivePair>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs a fresh key agreement on OS entropy and makes it active.
    pub fn initialize(&self, requested_bits: usize) -> Result<SharedKey, QkdError> {
        self.initialize_with(&SessionConfig::new(requested_bits), &mut secure_source())
    }

    /// On failure the previously active pair, if any, stays in place.
    pub fn initialize_with<S: RandomSource>(
        &self,
        config: &SessionConfig,
        source: &mut S,
    ) -> Result<SharedKey, QkdError> {
        let session = KeyAgreementSession::run_with_config(config, source)?;
        let key = session.shared_key().clone();
        let channel = KeyedChannel::new(key.clone());
        let previous = self.lock().replace(ActivePair { session, channel });
        info!(
            "key agreement complete: {} of {} bits kept{}",
            key.len(),
            config.requested_bits,
            if previous.is_some() {
                ", previous session discarded"
            } else {
                ""
            }
        );
        Ok(key)
    }

    /// Detached copy of the active channel, history included. Encrypting on
    /// the returned value does not add to the registry's history.
    pub fn current_channel(&self) -> Result<KeyedChannel, QkdError> {
        self.with_pair(|pair| pair.channel.clone())
    }

    pub fn current_shared_key(&self) -> Result<SharedKey, QkdError> {
        self.with_pair(|pair| pair.session.shared_key().clone())
    }

    pub fn summary(&self) -> Result<SessionSummary, QkdError> {
        self.with_pair(|pair| pair.session.summary())
    }

    pub fn encrypt(&self, plaintext: &str, sender: &str) -> Result<Message, QkdError> {
        let mut guard = self.lock();
        let pair = guard.as_mut().ok_or(QkdError::NotInitialized)?;
        pair.channel.encrypt(plaintext.as_bytes(), sender)
    }

    /// Decrypts against a key snapshot taken under the lock; the transform
    /// itself runs unlocked. Invalid UTF-8 is replaced, not rejected.
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, QkdError> {
        let key = self.current_shared_key()?;
        let plaintext = decrypt_with_key(&key, ciphertext)?;
        Ok(String::from_utf8_lossy(&plaintext).into_owned())
    }

    /// Messages in append order. Fails with [`QkdError::NotInitialized`]
    /// before the first successful initialize rather than returning an
    /// empty list.
    pub fn list_messages(&self) -> Result<Vec<Message>, QkdError> {
        self.with_pair(|pair| pair.channel.history().to_vec())
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().is_some()
    }

    fn with_pair<T>(&self, f: impl FnOnce(&ActivePair) -> T) -> Result<T, QkdError> {
        self.lock().as_ref().map(f).ok_or(QkdError::NotInitialized)
    }

    // Every critical section leaves the pair consistent, so a panic in a
    // holder does not invalidate it.
    fn lock(&self) -> MutexGuard<'_, Option<ActivePair>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
