use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::ledger::AccountStatus;
use crate::pow::Attempt;
use crate::signer::Signer;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    None,
    Planted,
    Worked,
    Harvested,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionStatus::None => "none",
            SessionStatus::Planted => "planted",
            SessionStatus::Worked => "worked",
            SessionStatus::Harvested => "harvested",
        })
    }
}

/// Where the work step got its entropy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntropySource {
    Ledger,
    /// Random bytes, used when the round has no entropy on the ledger yet.
    Local,
}

/// One round for one farmer.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmingSession {
    pub status: SessionStatus,
    pub index: Option<u32>,
    /// KALE.
    pub stake: f64,
    pub stake_units: i64,
    pub nonce: Option<u64>,
    pub score: Option<u32>,
    pub entropy_source: Option<EntropySource>,
    /// Estimated, set on harvest.
    pub reward: Option<f64>,
    pub planted_at: Option<DateTime<Utc>>,
    pub worked_at: Option<DateTime<Utc>>,
    pub harvested_at: Option<DateTime<Utc>>,
    /// Hashes of the transactions submitted this round, in order.
    pub transactions: Vec<String>,
}

impl FarmingSession {
    pub(super) fn planted(index: u32, stake: f64, stake_units: i64, tx: String) -> Self {
        Self {
            status: SessionStatus::Planted,
            index: Some(index),
            stake,
            stake_units,
            planted_at: Some(Utc::now()),
            transactions: vec![tx],
            ..Self::default()
        }
    }

    pub(super) fn mark_worked(&mut self, attempt: &Attempt, source: EntropySource, tx: String) {
        self.status = SessionStatus::Worked;
        self.nonce = Some(attempt.nonce);
        self.score = Some(attempt.score);
        self.entropy_source = Some(source);
        self.worked_at = Some(Utc::now());
        self.transactions.push(tx);
    }

    pub(super) fn mark_harvested(&mut self, reward: f64, tx: String) {
        self.status = SessionStatus::Harvested;
        self.reward = Some(reward);
        self.harvested_at = Some(Utc::now());
        self.transactions.push(tx);
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestRecord {
    pub index: u32,
    pub stake: f64,
    pub score: u32,
    pub reward: f64,
    pub tx: String,
    pub harvested_at: DateTime<Utc>,
}

/// A connected farmer.
#[derive(Debug, Clone)]
pub struct Account {
    pub signer: Signer,
    pub status: AccountStatus,
    pub connected_at: DateTime<Utc>,
    pub history: Vec<HarvestRecord>,
    pub total_earned: f64,
}

impl Account {
    pub fn new(signer: Signer, status: AccountStatus) -> Self {
        Self {
            signer,
            status,
            connected_at: Utc::now(),
            history: Vec::new(),
            total_earned: 0.0,
        }
    }

    pub fn record_harvest(&mut self, record: HarvestRecord) {
        self.total_earned += record.reward;
        self.history.push(record);
    }

    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            public_key: self.signer.public_key().to_string(),
            status: self.status.clone(),
            connected_at: self.connected_at,
            harvests: self.history.len(),
            total_earned: self.total_earned,
            history: self.history.clone(),
        }
    }
}

/// Serializable view of an [`Account`], without the key.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub public_key: String,
    pub status: AccountStatus,
    pub connected_at: DateTime<Utc>,
    pub harvests: usize,
    pub total_earned: f64,
    pub history: Vec<HarvestRecord>,
}

#[derive(Debug, Default)]
pub struct Slot {
    pub account: Option<Account>,
    pub session: FarmingSession,
}

/// Per-user slots, each behind its own async mutex.
///
/// Holding a slot's guard serializes every farm operation for that user
/// while leaving other users free to proceed.
#[derive(Debug, Default)]
pub struct SessionStore {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<Slot>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the slot for `user`, creating an empty one if needed.
    pub async fn lock(&self, user: &str) -> OwnedMutexGuard<Slot> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.entry(user.to_string()).or_default().clone()
        };
        slot.lock_owned().await
    }

    /// Lock an existing slot.
    pub async fn get(&self, user: &str) -> Option<OwnedMutexGuard<Slot>> {
        let slot = {
            let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.get(user).cloned()
        }?;
        Some(slot.lock_owned().await)
    }
}
