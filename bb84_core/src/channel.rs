//! Repeating-key XOR channel over a sifted key.
//!
//! The packed key is cycled across the message. This is a demonstration
//! transform and is **not** secure once a message is longer than the key.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::bits::SharedKey;
use crate::error::QkdError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub ciphertext: String,
    pub sender: String,
}

#[derive(Clone, Debug)]
pub struct KeyedChannel {
    key: SharedKey,
    history: Vec<Message>,
}

impl KeyedChannel {
    /// An empty key is accepted here; transforms on it fail with
    /// [`QkdError::EmptyKey`].
    pub fn new(key: SharedKey) -> Self {
        Self {
            key,
            history: Vec::new(),
        }
    }

    pub fn key(&self) -> &SharedKey {
        &self.key
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Scrambles `plaintext`, records the message and returns it.
    pub fn encrypt(&mut self, plaintext: &[u8], sender: &str) -> Result<Message, QkdError> {
        let message = encrypt_with_key(&self.key, plaintext, sender)?;
        self.history.push(message.clone());
        debug!(
            "channel: {} sent {} bytes (history={})",
            sender,
            plaintext.len(),
            self.history.len()
        );
        Ok(message)
    }

    /// Reverses [`KeyedChannel::encrypt`]. Leaves the history untouched.
    pub fn decrypt(&self, ciphertext: &str) -> Result<Vec<u8>, QkdError> {
        decrypt_with_key(&self.key, ciphertext)
    }

    pub fn decrypt_message(&self, message: &Message) -> Result<Vec<u8>, QkdError> {
        self.decrypt(&message.ciphertext)
    }
}

/// Encrypts without touching any history.
pub fn encrypt_with_key(
    key: &SharedKey,
    plaintext: &[u8],
    sender: &str,
) -> Result<Message, QkdError> {
    let key_bytes = key_schedule(key)?;
    let mut buf = plaintext.to_vec();
    apply_keystream(&mut buf, &key_bytes);
    Ok(Message {
        ciphertext: STANDARD.encode(&buf),
        sender: sender.to_string(),
    })
}

pub fn decrypt_with_key(key: &SharedKey, ciphertext: &str) -> Result<Vec<u8>, QkdError> {
    let key_bytes = key_schedule(key)?;
    let mut buf = STANDARD.decode(ciphertext)?;
    apply_keystream(&mut buf, &key_bytes);
    Ok(buf)
}

/// XORs byte `i` of `data` with `key[i % key.len()]`. Self-inverse; an
/// empty key leaves `data` unchanged.
pub fn apply_keystream(data: &mut [u8], key: &[u8]) {
    for (byte, k) in data.iter_mut().zip(key.iter().cycle()) {
        *byte ^= k;
    }
}

fn key_schedule(key: &SharedKey) -> Result<Vec<u8>, QkdError> {
    if key.is_empty() {
        return Err(QkdError::EmptyKey);
    }
    Ok(key.to_bytes())
}
