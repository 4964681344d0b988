use rand::RngCore;
use std::fmt::Write;

use crate::error::HandoffResult;
use crate::source::ItemSource;
use crate::types::WorkerId;

/// Source producing random bytes rendered as lowercase hex.
#[derive(Debug, Clone, Copy)]
pub struct RandomHexSource {
    payload_size: usize,
}

impl RandomHexSource {
    /// Creates a source producing `payload_size` random bytes per item.
    pub fn new(payload_size: usize) -> Self {
        Self { payload_size }
    }

    fn generate(&self) -> String {
        let mut bytes = vec![0u8; self.payload_size];
        rand::thread_rng().fill_bytes(&mut bytes);

        let mut payload = String::with_capacity(self.payload_size * 2);
        for byte in bytes {
            let _ = write!(payload, "{byte:02x}");
        }

        payload
    }
}

impl ItemSource for RandomHexSource {
    type Payload = String;

    fn name() -> &'static str {
        "random_hex"
    }

    async fn next_item(&self, _producer: WorkerId, _sequence: u64) -> HandoffResult<Option<String>> {
        Ok(Some(self.generate()))
    }
}
