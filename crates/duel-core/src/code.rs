//! Short human-typable room codes.

use rand::distributions::Uniform;
use rand::Rng;

use crate::ids::RoomCode;

const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

pub const DEFAULT_CODE_LEN: usize = 6;

/// Source of candidate room codes. Candidates may collide; the registry
/// retries on collision.
pub trait CodeSource: Send + Sync {
    fn generate(&self) -> RoomCode;
}

/// Uniform base-36 uppercase codes.
#[derive(Clone, Debug)]
pub struct RandomCodes {
    len: usize,
}

impl RandomCodes {
    pub fn new(len: usize) -> Self {
        Self { len: len.max(1) }
    }
}

impl Default for RandomCodes {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_LEN)
    }
}

impl CodeSource for RandomCodes {
    fn generate(&self) -> RoomCode {
        let dist = Uniform::from(0..ALPHABET.len());
        let code: String = rand::thread_rng()
            .sample_iter(dist)
            .take(self.len)
            .map(|i| ALPHABET[i] as char)
            .collect();
        RoomCode::new(code)
    }
}
