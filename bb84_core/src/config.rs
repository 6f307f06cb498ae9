pub const DEFAULT_REQUESTED_BITS: usize = 256;
pub const DEFAULT_SENDER: &str = "Alice";
pub const DEFAULT_RECEIVER: &str = "Bob";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeySize {
    Toy,
    Standard,
    Extended,
}

impl KeySize {
    /// Positions exchanged before sifting; roughly half survive.
    pub fn requested_bits(self) -> usize {
        match self {
            KeySize::Toy => 32,
            KeySize::Standard => DEFAULT_REQUESTED_BITS,
            KeySize::Extended => 2048,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub requested_bits: usize,
    pub sender_name: String,
    pub receiver_name: String,
}

impl SessionConfig {
    pub fn new(requested_bits: usize) -> Self {
        Self {
            requested_bits,
            ..Self::default()
        }
    }

    pub fn with_names(mut self, sender: impl Into<String>, receiver: impl Into<String>) -> Self {
        self.sender_name = sender.into();
        self.receiver_name = receiver.into();
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            requested_bits: DEFAULT_REQUESTED_BITS,
            sender_name: DEFAULT_SENDER.to_string(),
            receiver_name: DEFAULT_RECEIVER.to_string(),
        }
    }
}

pub fn session_preset(size: KeySize) -> SessionConfig {
    SessionConfig::new(size.requested_bits())
}
