use hmac::{Hmac, Mac};
use rand::{rngs::StdRng, Rng, SeedableRng};
use sha2::{Digest, Sha256};

// Seeded draws use a provably-fair HMAC construction:
// server_seed (secret) + client_seed + nonce -> HMAC-SHA256 -> bytes -> floats in [0,1)

pub type HmacSha256 = Hmac<Sha256>;

/// Picks a stop offset in `[0, n)` for the reel.
pub trait SlotSource: Send {
    /// Callers guarantee `n > 0`.
    fn draw(&mut self, n: usize) -> usize;
}

impl<S: SlotSource + ?Sized> SlotSource for Box<S> {
    fn draw(&mut self, n: usize) -> usize {
        (**self).draw(n)
    }
}

pub fn derive_hash_hex(input: &[u8]) -> String {
    hex::encode(Sha256::digest(input))
}

pub fn derive_floats(hmac_bytes: &[u8], count: usize) -> Vec<f64> {
    // successive 4-byte chunks -> u32 -> [0,1)
    let mut out = Vec::with_capacity(count);
    let mut buffer = hmac_bytes.to_vec();
    let mut i = 0usize;
    while out.len() < count {
        if i + 4 > buffer.len() {
            // extend deterministically by hashing the previous buffer
            buffer = Sha256::digest(&buffer).to_vec();
            i = 0;
            continue;
        }
        let chunk = &buffer[i..i + 4];
        let v = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        out.push((v as f64) / (u32::MAX as f64 + 1.0));
        i += 4;
    }
    out
}

/// Maps a float in `[0,1)` onto a slot index in `[0, n)`.
pub fn float_to_slot(f: f64, n: usize) -> usize {
    ((f * n as f64).floor() as usize).min(n - 1)
}

/// Reproducible draw source. Each draw consumes one nonce, so a spin can be
/// re-derived later from `(server_seed, client_seed, nonce)`.
#[derive(Debug, Clone)]
pub struct ProvablyFairRng {
    pub server_seed: String, // secret
    pub client_seed: String,
    pub nonce: u64,
}

impl ProvablyFairRng {
    pub fn new(server_seed: impl Into<String>, client_seed: impl Into<String>, nonce: u64) -> Self {
        Self {
            server_seed: server_seed.into(),
            client_seed: client_seed.into(),
            nonce,
        }
    }

    /// Parses `SERVER:CLIENT:NONCE`.
    pub fn parse(spec: &str) -> Option<Self> {
        let mut parts = spec.rsplitn(3, ':');
        let nonce = parts.next()?.parse().ok()?;
        let client = parts.next()?;
        let server = parts.next()?;
        Some(Self::new(server, client, nonce))
    }

    pub fn server_seed_hash_hex(&self) -> String {
        derive_hash_hex(self.server_seed.as_bytes())
    }

    pub fn hmac_bytes(&self) -> [u8; 32] {
        let mut mac = HmacSha256::new_from_slice(self.server_seed.as_bytes())
            .expect("HMAC accepts keys of any length");
        let msg = format!("{}:{}", self.client_seed, self.nonce);
        mac.update(msg.as_bytes());
        let res = mac.finalize().into_bytes();
        let mut out = [0u8; 32];
        out.copy_from_slice(&res);
        out
    }

    pub fn next_floats(&self, count: usize) -> Vec<f64> {
        derive_floats(&self.hmac_bytes(), count)
    }

    /// The slot the current nonce selects, without advancing.
    pub fn peek_slot(&self, n: usize) -> usize {
        float_to_slot(self.next_floats(1)[0], n)
    }
}

impl SlotSource for ProvablyFairRng {
    fn draw(&mut self, n: usize) -> usize {
        let slot = self.peek_slot(n);
        self.nonce += 1;
        slot
    }
}

/// Draws from any `rand` generator.
#[derive(Debug, Clone)]
pub struct RandSource<R> {
    rng: R,
}

impl<R: Rng + Send> RandSource<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandSource<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng + Send> SlotSource for RandSource<R> {
    fn draw(&mut self, n: usize) -> usize {
        self.rng.gen_range(0..n)
    }
}

/// Replays scripted offsets, cycling when exhausted. Offsets are reduced
/// modulo `n` so a script stays valid for any reel size.
#[derive(Debug, Clone)]
pub struct FixedSource {
    offsets: Vec<usize>,
    next: usize,
}

impl FixedSource {
    pub fn new(offsets: impl Into<Vec<usize>>) -> Self {
        Self {
            offsets: offsets.into(),
            next: 0,
        }
    }
}

impl SlotSource for FixedSource {
    fn draw(&mut self, n: usize) -> usize {
        if self.offsets.is_empty() {
            return 0;
        }
        let offset = self.offsets[self.next % self.offsets.len()];
        self.next += 1;
        offset % n
    }
}
