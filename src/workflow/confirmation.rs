use std::sync::atomic::{AtomicU32, Ordering};

use chrono::Utc;
use uuid::Uuid;

const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Scrambles the timestamp so consecutive numbers don't read as a sequence.
const TIME_MASK: u64 = 0x5A3C_96E1_F0;

/// Issues customer-facing confirmation numbers such as `BK-1Q2W3E4R-7FZ0K`.
///
/// The first group encodes the masked wall-clock milliseconds, the second
/// mixes a process-local counter with random bits so two approvals in the
/// same millisecond still differ. Storage keeps a unique constraint on top.
#[derive(Debug)]
pub struct ConfirmationGenerator {
    prefix: String,
    counter: AtomicU32,
}

impl Default for ConfirmationGenerator {
    fn default() -> Self {
        Self::new("BK")
    }
}

impl ConfirmationGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU32::new(0),
        }
    }

    pub fn next(&self) -> String {
        let millis = Utc::now().timestamp_millis().max(0) as u64;
        let seq = u64::from(self.counter.fetch_add(1, Ordering::Relaxed) & 0x3FF);
        let noise = (Uuid::new_v4().as_u128() as u64) & 0xF_FFFF;

        format!(
            "{}-{}-{}",
            self.prefix,
            base36(millis ^ TIME_MASK, 8),
            base36((seq << 20) | noise, 6)
        )
    }
}

/// Upper-case base36, left-padded with zeros to at least `width` digits.
fn base36(mut value: u64, width: usize) -> String {
    let mut digits = Vec::with_capacity(width.max(13));
    while value > 0 {
        digits.push(ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    while digits.len() < width {
        digits.push(b'0');
    }
    digits.reverse();
    // ALPHABET is ASCII
    String::from_utf8(digits).unwrap_or_default()
}
