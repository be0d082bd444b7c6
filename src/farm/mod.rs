//! The plant → work → harvest cycle.
//!
//! Each user has one slot holding the connected account and the current
//! round. Operations lock the slot for their whole duration, ledger calls
//! included, so concurrent requests for the same user run one after another.
//! [`Farm::run_cycle`] holds the lock across its pauses as well; other calls
//! for that user, `status` included, wait until the cycle ends.
//! An operation called in the wrong state fails with
//! [`FarmError::OutOfOrder`] and leaves the slot untouched; so does any
//! ledger failure.

mod ledger;
mod session;

use std::time::Duration;

use chrono::Utc;
use rand::RngCore;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinError;
use tokio::time::sleep;

use crate::config::FarmConfig;
use crate::fetcher::BASE_UNITS_PER_KALE;
use crate::pow::{Solver, WorkInput};
use crate::signer::Signer;
use crate::tracing::prelude::*;

pub use ledger::{AccountStatus, Ledger, LedgerHealth};
pub use session::{
    Account, AccountSummary, EntropySource, FarmingSession, HarvestRecord, SessionStatus,
    SessionStore, Slot,
};

/// Base reward per harvest, in base units.
const BASE_REWARD: f64 = 500.0;

#[derive(Debug, Error)]
pub enum FarmError {
    #[error("no account connected for this user")]
    NotConnected,

    #[error("not a valid Stellar secret seed")]
    InvalidSecret,

    #[error("account {0} does not exist on the ledger")]
    UnknownAccount(String),

    #[error("stake must be a finite, non-negative KALE amount, got {0}")]
    InvalidStake(f64),

    #[error("{op} requires session state {required}, found {found}")]
    OutOfOrder {
        op: &'static str,
        required: &'static str,
        found: SessionStatus,
    },

    #[error("no nonce scored above zero within {attempts} attempts")]
    NoSolution { attempts: u64 },

    #[error("ledger call {op} failed: {cause:#}")]
    Ledger {
        op: &'static str,
        cause: anyhow::Error,
    },

    #[error("proof of work task failed: {0}")]
    Solver(#[from] JoinError),

    #[error("farming cycle failed at {step}: {source}")]
    Cycle {
        step: &'static str,
        source: Box<FarmError>,
    },
}

impl FarmError {
    fn ledger(op: &'static str) -> impl FnOnce(anyhow::Error) -> FarmError {
        move |cause| FarmError::Ledger { op, cause }
    }

    fn in_step(step: &'static str) -> impl FnOnce(FarmError) -> FarmError {
        move |source| FarmError::Cycle {
            step,
            source: Box::new(source),
        }
    }
}

fn require(
    session: &FarmingSession,
    op: &'static str,
    allowed: &[SessionStatus],
    required: &'static str,
) -> Result<(), FarmError> {
    if allowed.contains(&session.status) {
        Ok(())
    } else {
        Err(FarmError::OutOfOrder {
            op,
            required,
            found: session.status,
        })
    }
}

/// Estimated harvest in KALE.
///
/// The contract pays out from its own accounting; this is only what the bot
/// reports: base reward scaled up by stake, by score (10% per nibble) and by
/// the time between plant and harvest (100% per five minutes).
pub fn estimate_reward(stake: f64, score: u32, elapsed: Duration) -> f64 {
    let stake_multiplier = if stake > 0.0 { 1.0 + stake / 1000.0 } else { 1.0 };
    let score_multiplier = 1.0 + f64::from(score) * 0.1;
    let time_multiplier = 1.0 + elapsed.as_millis() as f64 / 300_000.0;

    BASE_REWARD * stake_multiplier * score_multiplier * time_multiplier
        / BASE_UNITS_PER_KALE as f64
}

/// Everything `status` reports for one user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmStatus {
    pub user_id: String,
    pub connected: bool,
    pub account: Option<AccountSummary>,
    pub session: FarmingSession,
}

/// The open round as seen on the ledger.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInfo {
    pub index: u32,
    /// Hex; absent until someone plants in the round.
    pub entropy: Option<String>,
}

pub struct Farm<L> {
    ledger: L,
    sessions: SessionStore,
    config: FarmConfig,
}

impl<L: Ledger> Farm<L> {
    pub fn new(ledger: L, config: FarmConfig) -> Self {
        Self {
            ledger,
            sessions: SessionStore::new(),
            config,
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Connect `user` with an `S...` secret key.
    pub async fn connect(&self, user: &str, secret: &str) -> Result<AccountSummary, FarmError> {
        let signer = Signer::from_secret(secret).map_err(|_| FarmError::InvalidSecret)?;
        self.connect_signer(user, signer).await
    }

    /// Connect `user` with an already loaded key.
    ///
    /// Reconnecting with the same key keeps the harvest history.
    pub async fn connect_signer(
        &self,
        user: &str,
        signer: Signer,
    ) -> Result<AccountSummary, FarmError> {
        let status = self
            .ledger
            .account_status(signer.public_key())
            .await
            .map_err(FarmError::ledger("account_status"))?;
        if !status.exists {
            return Err(FarmError::UnknownAccount(signer.public_key().to_string()));
        }
        if !status.has_trustline {
            warn!(account = signer.public_key(), "Account has no KALE trustline");
        }

        let mut slot = self.sessions.lock(user).await;
        let account = match slot.account.take() {
            Some(mut previous) if previous.signer.public_key() == signer.public_key() => {
                previous.status = status;
                previous
            }
            _ => Account::new(signer, status),
        };

        info!(
            user,
            account = account.signer.public_key(),
            xlm = account.status.xlm_balance,
            kale = account.status.kale_balance,
            "Connected account"
        );
        let summary = account.summary();
        slot.account = Some(account);
        Ok(summary)
    }

    /// Stake `stake` KALE into the open round.
    pub async fn plant(&self, user: &str, stake: f64) -> Result<FarmingSession, FarmError> {
        let stake_units = stake_to_units(stake)?;
        let mut slot = self.sessions.lock(user).await;
        self.plant_slot(user, &mut slot, stake, stake_units).await
    }

    async fn plant_slot(
        &self,
        user: &str,
        slot: &mut Slot,
        stake: f64,
        stake_units: i64,
    ) -> Result<FarmingSession, FarmError> {
        let Slot { account, session } = slot;
        let account = account.as_ref().ok_or(FarmError::NotConnected)?;
        require(
            session,
            "plant",
            &[SessionStatus::None, SessionStatus::Harvested],
            "none or harvested",
        )?;

        let index = self
            .ledger
            .farm_index()
            .await
            .map_err(FarmError::ledger("farm_index"))?;
        let tx = self
            .ledger
            .plant(&account.signer, i128::from(stake_units))
            .await
            .map_err(FarmError::ledger("plant"))?;

        info!(user, index, stake, tx = %tx, "Planted");
        *session = FarmingSession::planted(index, stake, stake_units, tx);
        Ok(session.clone())
    }

    /// Mine a nonce for the planted round and submit it.
    ///
    /// `max_attempts` overrides the configured budget.
    pub async fn work(
        &self,
        user: &str,
        max_attempts: Option<u64>,
    ) -> Result<FarmingSession, FarmError> {
        let mut slot = self.sessions.lock(user).await;
        self.work_slot(user, &mut slot, max_attempts).await
    }

    async fn work_slot(
        &self,
        user: &str,
        slot: &mut Slot,
        max_attempts: Option<u64>,
    ) -> Result<FarmingSession, FarmError> {
        let Slot { account, session } = slot;
        let account = account.as_ref().ok_or(FarmError::NotConnected)?;
        require(session, "work", &[SessionStatus::Planted], "planted")?;

        let index = match session.index {
            Some(index) => index,
            None => self
                .ledger
                .farm_index()
                .await
                .map_err(FarmError::ledger("farm_index"))?,
        };
        let (entropy, source) = self.round_entropy(index).await;

        let input = WorkInput {
            index,
            entropy,
            farmer: account.signer.public_key_bytes(),
        };
        let attempts = max_attempts.unwrap_or(self.config.max_attempts);
        let solver = Solver::new(self.config.pow_hash, attempts, self.config.target_score);

        let attempt = tokio::task::spawn_blocking(move || solver.solve(&input))
            .await?
            .ok_or(FarmError::NoSolution { attempts })?;
        info!(
            user,
            index,
            nonce = attempt.nonce,
            score = attempt.score,
            digest = %hex::encode(attempt.digest),
            "Found proof of work"
        );

        let tx = self
            .ledger
            .work(&account.signer, &attempt)
            .await
            .map_err(FarmError::ledger("work"))?;

        info!(user, index, tx = %tx, "Worked");
        session.mark_worked(&attempt, source, tx);
        Ok(session.clone())
    }

    /// Claim the worked round and record the estimated reward.
    pub async fn harvest(&self, user: &str) -> Result<FarmingSession, FarmError> {
        let mut slot = self.sessions.lock(user).await;
        self.harvest_slot(user, &mut slot).await
    }

    async fn harvest_slot(&self, user: &str, slot: &mut Slot) -> Result<FarmingSession, FarmError> {
        let Slot { account, session } = slot;
        let account = account.as_mut().ok_or(FarmError::NotConnected)?;
        require(session, "harvest", &[SessionStatus::Worked], "worked")?;

        let index = match session.index {
            Some(index) => index,
            None => self
                .ledger
                .farm_index()
                .await
                .map_err(FarmError::ledger("farm_index"))?,
        };
        let tx = self
            .ledger
            .harvest(&account.signer, index)
            .await
            .map_err(FarmError::ledger("harvest"))?;

        let now = Utc::now();
        let elapsed = session
            .planted_at
            .and_then(|planted| (now - planted).to_std().ok())
            .unwrap_or_default();
        let score = session.score.unwrap_or(0);
        let reward = estimate_reward(session.stake, score, elapsed);

        account.record_harvest(HarvestRecord {
            index,
            stake: session.stake,
            score,
            reward,
            tx: tx.clone(),
            harvested_at: now,
        });
        info!(user, index, reward, tx = %tx, "Harvested");

        session.mark_harvested(reward, tx);
        Ok(session.clone())
    }

    /// Plant, work and harvest with the configured pauses in between.
    ///
    /// The user's slot stays locked for the whole cycle.
    pub async fn run_cycle(&self, user: &str, stake: f64) -> Result<FarmingSession, FarmError> {
        let stake_units = stake_to_units(stake).map_err(FarmError::in_step("plant"))?;
        let mut slot = self.sessions.lock(user).await;

        self.plant_slot(user, &mut slot, stake, stake_units)
            .await
            .map_err(FarmError::in_step("plant"))?;
        sleep(self.config.plant_work_delay).await;

        self.work_slot(user, &mut slot, None)
            .await
            .map_err(FarmError::in_step("work"))?;
        sleep(self.config.work_harvest_delay).await;

        self.harvest_slot(user, &mut slot)
            .await
            .map_err(FarmError::in_step("harvest"))
    }

    pub async fn status(&self, user: &str) -> FarmStatus {
        match self.sessions.get(user).await {
            Some(slot) => FarmStatus {
                user_id: user.to_string(),
                connected: slot.account.is_some(),
                account: slot.account.as_ref().map(Account::summary),
                session: slot.session.clone(),
            },
            None => FarmStatus {
                user_id: user.to_string(),
                connected: false,
                account: None,
                session: FarmingSession::default(),
            },
        }
    }

    pub async fn block_info(&self) -> Result<BlockInfo, FarmError> {
        let index = self
            .ledger
            .farm_index()
            .await
            .map_err(FarmError::ledger("farm_index"))?;
        let entropy = self
            .ledger
            .entropy(index)
            .await
            .map_err(FarmError::ledger("entropy"))?;

        Ok(BlockInfo {
            index,
            entropy: entropy.map(hex::encode),
        })
    }

    pub async fn health(&self) -> Result<LedgerHealth, FarmError> {
        self.ledger
            .health()
            .await
            .map_err(FarmError::ledger("health"))
    }

    async fn round_entropy(&self, index: u32) -> ([u8; 32], EntropySource) {
        match self.ledger.entropy(index).await {
            Ok(Some(entropy)) => return (entropy, EntropySource::Ledger),
            Ok(None) => debug!(index, "Round has no entropy yet, using local bytes"),
            Err(e) => warn!(index, error = %e, "Entropy lookup failed, using local bytes"),
        }

        let mut entropy = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut entropy);
        (entropy, EntropySource::Local)
    }
}

/// KALE to base units.
fn stake_to_units(stake: f64) -> Result<i64, FarmError> {
    if !stake.is_finite() || stake < 0.0 {
        return Err(FarmError::InvalidStake(stake));
    }
    let units = (stake * BASE_UNITS_PER_KALE as f64).round();
    if units > i64::MAX as f64 {
        return Err(FarmError::InvalidStake(stake));
    }
    Ok(units as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::pow::{Attempt, PowHash};

    #[derive(Default)]
    struct MockLedger {
        index: u32,
        entropy: Option<[u8; 32]>,
        missing_account: bool,
        fail: Option<&'static str>,
        calls: Mutex<Vec<String>>,
        staked: Mutex<Vec<i128>>,
        worked: Mutex<Vec<Attempt>>,
    }

    impl MockLedger {
        fn record(&self, call: &str) -> anyhow::Result<String> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call.to_string());
            if self.fail == Some(call) {
                anyhow::bail!("{} rejected by contract", call);
            }
            Ok(format!("{:064x}", calls.len()))
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Ledger for MockLedger {
        async fn farm_index(&self) -> anyhow::Result<u32> {
            Ok(self.index)
        }

        async fn entropy(&self, _index: u32) -> anyhow::Result<Option<[u8; 32]>> {
            if self.fail == Some("entropy") {
                anyhow::bail!("rpc unavailable");
            }
            Ok(self.entropy)
        }

        async fn account_status(&self, _account: &str) -> anyhow::Result<AccountStatus> {
            Ok(AccountStatus {
                exists: !self.missing_account,
                xlm_balance: 100_000_000,
                has_trustline: true,
                kale_balance: 0,
            })
        }

        async fn plant(&self, _signer: &Signer, amount: i128) -> anyhow::Result<String> {
            self.staked.lock().unwrap().push(amount);
            self.record("plant")
        }

        async fn work(&self, _signer: &Signer, attempt: &Attempt) -> anyhow::Result<String> {
            self.worked.lock().unwrap().push(attempt.clone());
            self.record("work")
        }

        async fn harvest(&self, _signer: &Signer, _index: u32) -> anyhow::Result<String> {
            self.record("harvest")
        }

        async fn health(&self) -> anyhow::Result<LedgerHealth> {
            Ok(LedgerHealth {
                network_passphrase: "Test SDF Network ; September 2015".into(),
                protocol_version: 22,
                latest_ledger: 1000,
                contract_reachable: true,
                farm_index: Some(self.index),
            })
        }
    }

    fn config() -> FarmConfig {
        FarmConfig {
            pow_hash: PowHash::Sha3_256,
            max_attempts: 1000,
            target_score: 3,
            plant_work_delay: Duration::ZERO,
            work_harvest_delay: Duration::ZERO,
        }
    }

    fn ledger() -> MockLedger {
        MockLedger {
            index: 42,
            entropy: Some([7u8; 32]),
            ..Default::default()
        }
    }

    async fn connected(ledger: MockLedger) -> Farm<MockLedger> {
        let farm = Farm::new(ledger, config());
        farm.connect_signer("alice", Signer::from_bytes([1u8; 32]))
            .await
            .unwrap();
        farm
    }

    #[tokio::test]
    async fn test_harvest_before_work_is_rejected() {
        let farm = connected(ledger()).await;
        farm.plant("alice", 10.0).await.unwrap();

        let err = farm.harvest("alice").await.unwrap_err();
        assert!(matches!(
            err,
            FarmError::OutOfOrder {
                op: "harvest",
                found: SessionStatus::Planted,
                ..
            }
        ));

        let status = farm.status("alice").await;
        assert_eq!(status.session.status, SessionStatus::Planted);
        assert_eq!(farm.ledger().calls(), vec!["plant"]);
    }

    #[tokio::test]
    async fn test_work_before_plant_is_rejected() {
        let farm = connected(ledger()).await;

        let err = farm.work("alice", None).await.unwrap_err();
        assert!(matches!(
            err,
            FarmError::OutOfOrder {
                op: "work",
                found: SessionStatus::None,
                ..
            }
        ));
        assert!(farm.ledger().calls().is_empty());
    }

    #[tokio::test]
    async fn test_requires_connected_account() {
        let farm = Farm::new(ledger(), config());
        assert!(matches!(
            farm.plant("bob", 1.0).await,
            Err(FarmError::NotConnected)
        ));
        assert!(matches!(
            farm.connect("bob", "not-a-secret").await,
            Err(FarmError::InvalidSecret)
        ));
        assert!(!farm.status("bob").await.connected);
    }

    #[tokio::test]
    async fn test_unknown_account_is_not_connected() {
        let farm = Farm::new(
            MockLedger {
                missing_account: true,
                ..ledger()
            },
            config(),
        );
        let err = farm
            .connect_signer("bob", Signer::from_bytes([2u8; 32]))
            .await
            .unwrap_err();
        assert!(matches!(err, FarmError::UnknownAccount(_)));
        assert!(!farm.status("bob").await.connected);
    }

    #[tokio::test]
    async fn test_full_cycle() {
        let farm = connected(ledger()).await;

        let session = farm.run_cycle("alice", 2.5).await.unwrap();
        assert_eq!(session.status, SessionStatus::Harvested);
        assert_eq!(session.index, Some(42));
        assert_eq!(session.stake_units, 25_000_000);
        assert_eq!(session.entropy_source, Some(EntropySource::Ledger));
        assert_eq!(session.transactions.len(), 3);
        assert!(session.reward.unwrap() > 0.0);

        assert_eq!(farm.ledger().calls(), vec!["plant", "work", "harvest"]);
        assert_eq!(*farm.ledger().staked.lock().unwrap(), vec![25_000_000i128]);

        // the submitted nonce is the one the solver found for this round
        let worked = farm.ledger().worked.lock().unwrap().clone();
        assert_eq!(worked.len(), 1);
        assert_eq!(Some(worked[0].nonce), session.nonce);
        let input = WorkInput {
            index: 42,
            entropy: [7u8; 32],
            farmer: Signer::from_bytes([1u8; 32]).public_key_bytes(),
        };
        assert_eq!(worked[0].digest, input.digest(PowHash::Sha3_256, worked[0].nonce));

        let status = farm.status("alice").await;
        let account = status.account.unwrap();
        assert_eq!(account.harvests, 1);
        assert_eq!(account.total_earned, session.reward.unwrap());
    }

    #[tokio::test]
    async fn test_work_falls_back_to_local_entropy() {
        let farm = connected(MockLedger {
            entropy: None,
            ..ledger()
        })
        .await;
        farm.plant("alice", 0.0).await.unwrap();

        let session = farm.work("alice", None).await.unwrap();
        assert_eq!(session.status, SessionStatus::Worked);
        assert_eq!(session.entropy_source, Some(EntropySource::Local));

        let farm = connected(MockLedger {
            fail: Some("entropy"),
            ..ledger()
        })
        .await;
        farm.plant("alice", 0.0).await.unwrap();
        let session = farm.work("alice", None).await.unwrap();
        assert_eq!(session.entropy_source, Some(EntropySource::Local));
    }

    #[tokio::test]
    async fn test_zero_attempts_is_no_solution() {
        let farm = connected(ledger()).await;
        farm.plant("alice", 1.0).await.unwrap();

        let err = farm.work("alice", Some(0)).await.unwrap_err();
        assert!(matches!(err, FarmError::NoSolution { attempts: 0 }));
        assert_eq!(farm.status("alice").await.session.status, SessionStatus::Planted);
        assert_eq!(farm.ledger().calls(), vec!["plant"]);
    }

    #[tokio::test]
    async fn test_invalid_stake() {
        let farm = connected(ledger()).await;
        for stake in [-1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                farm.plant("alice", stake).await,
                Err(FarmError::InvalidStake(_))
            ));
        }
        assert!(farm.ledger().calls().is_empty());
    }

    #[tokio::test]
    async fn test_double_plant_is_rejected() {
        let farm = connected(ledger()).await;
        farm.plant("alice", 1.0).await.unwrap();
        assert!(matches!(
            farm.plant("alice", 1.0).await,
            Err(FarmError::OutOfOrder { op: "plant", .. })
        ));
    }

    #[tokio::test]
    async fn test_replant_after_harvest() {
        let farm = connected(ledger()).await;
        farm.run_cycle("alice", 1.0).await.unwrap();

        let session = farm.plant("alice", 3.0).await.unwrap();
        assert_eq!(session.status, SessionStatus::Planted);
        assert_eq!(session.stake, 3.0);
        assert_eq!(session.reward, None);
        assert_eq!(session.transactions.len(), 1);

        // history survives the new round
        let account = farm.status("alice").await.account.unwrap();
        assert_eq!(account.harvests, 1);
    }

    #[tokio::test]
    async fn test_ledger_failure_keeps_state() {
        let farm = connected(MockLedger {
            fail: Some("plant"),
            ..ledger()
        })
        .await;

        let err = farm.plant("alice", 1.0).await.unwrap_err();
        assert!(matches!(err, FarmError::Ledger { op: "plant", .. }));
        assert!(err.to_string().contains("rejected by contract"));
        assert_eq!(farm.status("alice").await.session.status, SessionStatus::None);
    }

    #[tokio::test]
    async fn test_cycle_error_names_step() {
        let farm = connected(MockLedger {
            fail: Some("harvest"),
            ..ledger()
        })
        .await;

        let err = farm.run_cycle("alice", 1.0).await.unwrap_err();
        assert!(matches!(err, FarmError::Cycle { step: "harvest", .. }));
        assert_eq!(farm.status("alice").await.session.status, SessionStatus::Worked);
    }

    #[tokio::test]
    async fn test_reconnect_keeps_history() {
        let farm = connected(ledger()).await;
        farm.run_cycle("alice", 0.0).await.unwrap();

        farm.connect_signer("alice", Signer::from_bytes([1u8; 32]))
            .await
            .unwrap();
        assert_eq!(farm.status("alice").await.account.unwrap().harvests, 1);

        farm.connect_signer("alice", Signer::from_bytes([3u8; 32]))
            .await
            .unwrap();
        assert_eq!(farm.status("alice").await.account.unwrap().harvests, 0);
    }

    #[tokio::test]
    async fn test_same_user_is_serialized() {
        let farm = Arc::new(connected(ledger()).await);

        let plants = (0..4).map(|_| {
            let farm = farm.clone();
            tokio::spawn(async move { farm.plant("alice", 1.0).await })
        });
        let mut ok = 0;
        for handle in plants {
            if handle.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(farm.ledger().calls(), vec!["plant"]);
    }

    #[tokio::test]
    async fn test_cycle_holds_slot_through_pauses() {
        let farm = Farm::new(
            ledger(),
            FarmConfig {
                plant_work_delay: Duration::from_millis(100),
                ..config()
            },
        );
        farm.connect_signer("alice", Signer::from_bytes([1u8; 32]))
            .await
            .unwrap();
        let farm = Arc::new(farm);

        let cycle = {
            let farm = farm.clone();
            tokio::spawn(async move { farm.run_cycle("alice", 1.0).await })
        };
        // land inside the plant → work pause
        tokio::time::sleep(Duration::from_millis(30)).await;

        // a work call now waits for the cycle, then finds the round harvested
        let err = farm.work("alice", None).await.unwrap_err();
        assert!(matches!(
            err,
            FarmError::OutOfOrder {
                op: "work",
                found: SessionStatus::Harvested,
                ..
            }
        ));

        let session = cycle.await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Harvested);
        assert_eq!(farm.ledger().calls(), vec!["plant", "work", "harvest"]);
    }

    #[tokio::test]
    async fn test_block_info() {
        let farm = Farm::new(ledger(), config());
        let info = farm.block_info().await.unwrap();
        assert_eq!(info.index, 42);
        assert_eq!(info.entropy, Some("07".repeat(32)));
    }

    #[test]
    fn test_reward_estimate() {
        assert!((estimate_reward(0.0, 0, Duration::ZERO) - 0.00005).abs() < 1e-12);

        // 1000 KALE doubles it, so do ten nibbles and five minutes
        let doubled = 0.00005 * 2.0;
        assert!((estimate_reward(1000.0, 0, Duration::ZERO) - doubled).abs() < 1e-12);
        assert!((estimate_reward(0.0, 10, Duration::ZERO) - doubled).abs() < 1e-12);
        assert!((estimate_reward(0.0, 0, Duration::from_secs(300)) - doubled).abs() < 1e-12);
    }

    #[test]
    fn test_stake_units() {
        assert_eq!(stake_to_units(1.0).unwrap(), 10_000_000);
        assert_eq!(stake_to_units(0.1234567).unwrap(), 1_234_567);
        assert!(stake_to_units(1e300).is_err());
    }
}
