use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::pow::Attempt;
use crate::signer::Signer;

/// What the ledger knows about a farmer's account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatus {
    pub exists: bool,
    /// Stroops.
    pub xlm_balance: i64,
    pub has_trustline: bool,
    /// KALE base units.
    pub kale_balance: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerHealth {
    pub network_passphrase: String,
    pub protocol_version: u32,
    pub latest_ledger: u32,
    pub contract_reachable: bool,
    pub farm_index: Option<u32>,
}

/// The chain as the farm sees it.
///
/// Submissions return the transaction hash.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Index of the round currently open for planting.
    async fn farm_index(&self) -> Result<u32>;

    /// Entropy of round `index`, `None` until someone has planted in it.
    async fn entropy(&self, index: u32) -> Result<Option<[u8; 32]>>;

    async fn account_status(&self, account: &str) -> Result<AccountStatus>;

    /// Stake `amount` base units into the open round.
    async fn plant(&self, signer: &Signer, amount: i128) -> Result<String>;

    async fn work(&self, signer: &Signer, attempt: &Attempt) -> Result<String>;

    async fn harvest(&self, signer: &Signer, index: u32) -> Result<String>;

    async fn health(&self) -> Result<LedgerHealth>;
}
