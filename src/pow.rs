//! Proof of work for the `work` step of a farming round.
//!
//! A trial hashes a fixed 76-byte buffer:
//!
//! ```text
//! [0..4)   round index, big endian u32
//! [4..12)  nonce, big endian u64
//! [12..44) entropy
//! [44..76) farmer ed25519 public key
//! ```
//!
//! and scores the digest by its leading zero *nibbles*. The search is a plain
//! linear scan from nonce 0 with an early exit; it is nowhere near a real
//! miner, it only has to agree with what the farm contract checks.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Serialize;
use sha3::{Digest, Keccak256, Sha3_256};
use stellar_strkey::Strkey;

pub const INPUT_LEN: usize = 76;

/// Hash function applied to the work buffer.
///
/// The farm contract only accepts Keccak-256 digests. SHA3-256 remains for
/// offline solving.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum PowHash {
    #[default]
    #[serde(rename = "sha3-256")]
    Sha3_256,
    #[serde(rename = "keccak256")]
    Keccak256,
}

impl fmt::Display for PowHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowHash::Sha3_256 => f.write_str("sha3-256"),
            PowHash::Keccak256 => f.write_str("keccak256"),
        }
    }
}

impl FromStr for PowHash {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha3-256" | "sha3" => Ok(PowHash::Sha3_256),
            "keccak256" | "keccak" => Ok(PowHash::Keccak256),
            other => Err(format!("unknown hash {:?}, expected sha3-256 or keccak256", other)),
        }
    }
}

/// Everything but the nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkInput {
    pub index: u32,
    pub entropy: [u8; 32],
    pub farmer: [u8; 32],
}

impl WorkInput {
    /// `farmer` is a `G...` account id.
    pub fn new(index: u32, entropy: [u8; 32], farmer: &str) -> Result<Self> {
        Ok(Self {
            index,
            entropy,
            farmer: farmer_bytes(farmer)?,
        })
    }

    pub fn buffer(&self, nonce: u64) -> [u8; INPUT_LEN] {
        let mut buf = [0u8; INPUT_LEN];
        buf[0..4].copy_from_slice(&self.index.to_be_bytes());
        buf[4..12].copy_from_slice(&nonce.to_be_bytes());
        buf[12..44].copy_from_slice(&self.entropy);
        buf[44..76].copy_from_slice(&self.farmer);
        buf
    }

    pub fn digest(&self, hash: PowHash, nonce: u64) -> [u8; 32] {
        let buf = self.buffer(nonce);
        let result = match hash {
            PowHash::Sha3_256 => Sha3_256::digest(buf),
            PowHash::Keccak256 => Keccak256::digest(buf),
        };

        let mut digest = [0u8; 32];
        digest.copy_from_slice(&result);
        digest
    }
}

/// Raw 32-byte key behind a `G...` account id.
pub fn farmer_bytes(farmer: &str) -> Result<[u8; 32]> {
    match Strkey::from_string(farmer).context("Failed to parse farmer address")? {
        Strkey::PublicKeyEd25519(pk) => Ok(pk.0),
        _ => anyhow::bail!("Farmer address is not an ed25519 account id"),
    }
}

/// Leading zero nibbles of `digest`.
///
/// Each zero byte counts 2. The first non-zero byte counts 1 if its high
/// nibble is zero, and ends the count either way.
pub fn leading_zero_score(digest: &[u8]) -> u32 {
    let mut score = 0;
    for &byte in digest {
        if byte == 0 {
            score += 2;
        } else {
            if byte < 16 {
                score += 1;
            }
            break;
        }
    }
    score
}

/// Best trial of a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attempt {
    pub hash: PowHash,
    pub nonce: u64,
    pub score: u32,
    #[serde(with = "hex_digest")]
    pub digest: [u8; 32],
}

mod hex_digest {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(digest: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(digest))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Solver {
    pub hash: PowHash,
    pub max_attempts: u64,
    /// Stop as soon as a trial scores at least this much.
    pub target_score: u32,
}

impl Solver {
    pub fn new(hash: PowHash, max_attempts: u64, target_score: u32) -> Self {
        Self {
            hash,
            max_attempts,
            target_score,
        }
    }

    /// Scan nonces `0..max_attempts` and keep the best-scoring one.
    ///
    /// Returns `None` if nothing scored above zero, including when
    /// `max_attempts` is zero.
    #[must_use]
    pub fn solve(&self, input: &WorkInput) -> Option<Attempt> {
        let mut best: Option<Attempt> = None;

        for nonce in 0..self.max_attempts {
            let digest = input.digest(self.hash, nonce);
            let score = leading_zero_score(&digest);

            if score > best.as_ref().map_or(0, |b| b.score) {
                best = Some(Attempt {
                    hash: self.hash,
                    nonce,
                    score,
                    digest,
                });
            }

            if score >= self.target_score {
                break;
            }
        }

        best
    }
}
