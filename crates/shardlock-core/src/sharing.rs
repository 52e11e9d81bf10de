//! (t, n) Shamir secret sharing over GF(256).
//!
//! Every byte of the secret is the constant term of its own random
//! polynomial of degree `t - 1`; share `i` holds the evaluations at `x = i`.
//! Any `t` shares interpolate back to the secret, fewer carry no information.
//!
//! Combining never checks the threshold. Too few shares, or shares from
//! different splits, interpolate to a wrong value rather than an error.

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

use crate::error::ShardlockError;

/// One point of a split: `value` evaluated at `x = index`.
#[derive(Clone, PartialEq, Eq)]
pub struct Share {
    index: u8,
    value: Zeroizing<Vec<u8>>,
}

impl Share {
    pub fn new(index: u8, value: Vec<u8>) -> Result<Self, ShardlockError> {
        if index == 0 {
            return Err(ShardlockError::Share("share index must be non-zero"));
        }
        Ok(Self {
            index,
            value: Zeroizing::new(value),
        })
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Wire form: `value || index`.
    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        let mut out = Zeroizing::new(Vec::with_capacity(self.value.len() + 1));
        out.extend_from_slice(&self.value);
        out.push(self.index);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ShardlockError> {
        match bytes.split_last() {
            Some((&index, value)) if !value.is_empty() => Self::new(index, value.to_vec()),
            _ => Err(ShardlockError::Share("share encoding too short")),
        }
    }
}

impl std::fmt::Debug for Share {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Share")
            .field("index", &self.index)
            .field("len", &self.value.len())
            .finish()
    }
}

/// Threshold splitter/combiner.
pub trait Splitter: Send + Sync {
    /// Produce shares with indices `1..=shares`.
    fn split(&self, secret: &[u8], shares: u8, threshold: u8) -> Result<Vec<Share>, ShardlockError>;

    fn combine(&self, shares: &[Share]) -> Result<Zeroizing<Vec<u8>>, ShardlockError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Shamir;

impl Splitter for Shamir {
    fn split(&self, secret: &[u8], shares: u8, threshold: u8) -> Result<Vec<Share>, ShardlockError> {
        if secret.is_empty() {
            return Err(ShardlockError::Share("secret must not be empty"));
        }
        if threshold == 0 || threshold > shares {
            return Err(ShardlockError::InvalidThreshold {
                threshold: threshold as usize,
                shares: shares as usize,
            });
        }

        let mut values = vec![vec![0u8; secret.len()]; shares as usize];
        let mut coeffs = vec![0u8; threshold as usize];
        for (pos, &byte) in secret.iter().enumerate() {
            coeffs[0] = byte;
            OsRng.fill_bytes(&mut coeffs[1..]);
            for (i, value) in values.iter_mut().enumerate() {
                value[pos] = eval(&coeffs, i as u8 + 1);
            }
        }
        coeffs.zeroize();

        values
            .into_iter()
            .enumerate()
            .map(|(i, value)| Share::new(i as u8 + 1, value))
            .collect()
    }

    fn combine(&self, shares: &[Share]) -> Result<Zeroizing<Vec<u8>>, ShardlockError> {
        let first = shares
            .first()
            .ok_or(ShardlockError::Share("no shares to combine"))?;
        let len = first.value.len();
        if shares.iter().any(|s| s.value.len() != len) {
            return Err(ShardlockError::Share("share lengths differ"));
        }
        for (i, a) in shares.iter().enumerate() {
            if shares[i + 1..].iter().any(|b| b.index == a.index) {
                return Err(ShardlockError::Share("duplicate share index"));
            }
        }

        // Lagrange basis at x = 0; subtraction is xor in GF(256).
        let basis: Vec<u8> = shares
            .iter()
            .map(|j| {
                shares
                    .iter()
                    .filter(|m| m.index != j.index)
                    .fold(1u8, |acc, m| mul(acc, div(m.index, m.index ^ j.index)))
            })
            .collect();

        let mut secret = Zeroizing::new(vec![0u8; len]);
        for (share, &l) in shares.iter().zip(&basis) {
            for (out, &y) in secret.iter_mut().zip(share.value.iter()) {
                *out ^= mul(y, l);
            }
        }
        Ok(secret)
    }
}

/// Horner evaluation of `coeffs` (constant term first) at `x`.
fn eval(coeffs: &[u8], x: u8) -> u8 {
    coeffs.iter().rev().fold(0u8, |acc, &c| mul(acc, x) ^ c)
}

/// Multiplication modulo x^8 + x^4 + x^3 + x + 1, without data-dependent branches.
fn mul(mut a: u8, mut b: u8) -> u8 {
    let mut product = 0u8;
    for _ in 0..8 {
        product ^= a & 0u8.wrapping_sub(b & 1);
        let carry = 0u8.wrapping_sub(a >> 7);
        a = (a << 1) ^ (0x1b & carry);
        b >>= 1;
    }
    product
}

/// a^254 = a^-1 for non-zero a.
fn inv(a: u8) -> u8 {
    let mut result = 1u8;
    let mut base = a;
    let mut exp = 254u8;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul(result, base);
        }
        base = mul(base, base);
        exp >>= 1;
    }
    result
}

fn div(a: u8, b: u8) -> u8 {
    mul(a, inv(b))
}
