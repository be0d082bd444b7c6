use anyhow::{Context, Result};
use async_trait::async_trait;
use stellar_xdr::curr::{Int128Parts, ScBytes, ScVal};

use crate::config::LedgerConfig;
use crate::farm::{AccountStatus, Ledger, LedgerHealth};
use crate::pow::{Attempt, PowHash};
use crate::rpc::{account_address, SorobanRpc};
use crate::signer::Signer;
use crate::tracing::prelude::*;

const KALE_ASSET_CODE: &str = "KALE";

/// KALE farm contract client
pub struct KaleContract {
    rpc: SorobanRpc,
    asset_issuer: String,
}

impl KaleContract {
    /// Create a new KALE contract client
    ///
    /// # Arguments
    /// * `rpc_url` - The Soroban RPC endpoint URL
    /// * `contract_address` - The KALE farm contract address
    /// * `network_passphrase` - The network passphrase
    /// * `asset_issuer` - Issuer of the KALE classic asset, for trustline lookups
    pub fn new(
        rpc_url: &str,
        contract_address: &str,
        network_passphrase: &str,
        asset_issuer: &str,
    ) -> Result<Self> {
        let rpc = SorobanRpc::new(rpc_url, contract_address, network_passphrase)?;
        Ok(Self {
            rpc,
            asset_issuer: asset_issuer.to_string(),
        })
    }

    pub fn from_config(config: &LedgerConfig) -> Result<Self> {
        Self::new(
            &config.rpc_url,
            &config.contract_id,
            &config.network_passphrase,
            &config.asset_issuer,
        )
    }

    /// Build, simulate, sign and submit a contract call
    ///
    /// Returns the transaction hash
    async fn invoke(&self, signer: &Signer, function: &str, args: Vec<ScVal>) -> Result<String> {
        let transaction = self
            .rpc
            .build_invoke_transaction(signer.public_key(), function, args)
            .await?;
        let transaction = self
            .rpc
            .prepare_transaction(transaction)
            .await
            .with_context(|| format!("Failed to prepare {}", function))?;

        let envelope = signer.sign(transaction, self.rpc.network_passphrase())?;
        let hash = self.rpc.submit_envelope(&envelope).await?;

        info!(function, farmer = signer.public_key(), tx = %hash, "Submitted contract call");
        Ok(hash)
    }
}

#[async_trait]
impl Ledger for KaleContract {
    /// Reads the "FarmIndex" value from the contract's instance storage.
    async fn farm_index(&self) -> Result<u32> {
        let instance = self.rpc.get_contract_instance().await?;
        let value = SorobanRpc::parse_instance_storage_value(&instance, "FarmIndex")?;

        if let ScVal::U32(index) = value {
            Ok(index)
        } else {
            anyhow::bail!("FarmIndex is not a U32 value: {:?}", value)
        }
    }

    /// The `Block(index)` temporary entry only exists once someone has
    /// planted in that round.
    async fn entropy(&self, index: u32) -> Result<Option<[u8; 32]>> {
        let key = self.rpc.temporary_key("Block", vec![ScVal::U32(index)])?;
        let Some(entry) = self.rpc.get_ledger_entry(key).await? else {
            return Ok(None);
        };

        let fields = SorobanRpc::parse_contract_map(&entry)?;
        Ok(block_entropy(&fields))
    }

    async fn account_status(&self, account: &str) -> Result<AccountStatus> {
        let Some(xlm_balance) = self.rpc.get_xlm_balance(account).await? else {
            return Ok(AccountStatus::default());
        };
        let (has_trustline, kale_balance) = self
            .rpc
            .check_trustline_and_balance(account, KALE_ASSET_CODE, &self.asset_issuer)
            .await?;

        Ok(AccountStatus {
            exists: true,
            xlm_balance,
            has_trustline,
            kale_balance,
        })
    }

    async fn plant(&self, signer: &Signer, amount: i128) -> Result<String> {
        self.invoke(signer, "plant", plant_args(signer.public_key(), amount)?)
            .await
    }

    async fn work(&self, signer: &Signer, attempt: &Attempt) -> Result<String> {
        self.invoke(signer, "work", work_args(signer.public_key(), attempt)?)
            .await
    }

    async fn harvest(&self, signer: &Signer, index: u32) -> Result<String> {
        self.invoke(signer, "harvest", harvest_args(signer.public_key(), index)?)
            .await
    }

    async fn health(&self) -> Result<LedgerHealth> {
        let network = self.rpc.network_status().await?;
        let contract_reachable = match self.rpc.get_contract_instance().await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Farm contract instance unavailable");
                false
            }
        };
        let farm_index = if contract_reachable {
            self.farm_index().await.ok()
        } else {
            None
        };

        Ok(LedgerHealth {
            network_passphrase: network.passphrase,
            protocol_version: network.protocol_version,
            latest_ledger: network.latest_ledger,
            contract_reachable,
            farm_index,
        })
    }
}

fn i128_val(amount: i128) -> ScVal {
    ScVal::I128(Int128Parts {
        hi: (amount >> 64) as i64,
        lo: amount as u64,
    })
}

/// plant(farmer: Address, amount: i128)
fn plant_args(farmer: &str, amount: i128) -> Result<Vec<ScVal>> {
    Ok(vec![ScVal::Address(account_address(farmer)?), i128_val(amount)])
}

/// work(farmer: Address, hash: BytesN<32>, nonce: u64)
///
/// The contract recomputes the digest with Keccak-256, so anything else
/// would be rejected on chain.
fn work_args(farmer: &str, attempt: &Attempt) -> Result<Vec<ScVal>> {
    if attempt.hash != PowHash::Keccak256 {
        anyhow::bail!(
            "Work digest uses {}, the farm contract verifies {}",
            attempt.hash,
            PowHash::Keccak256
        );
    }
    Ok(vec![
        ScVal::Address(account_address(farmer)?),
        ScVal::Bytes(ScBytes(attempt.digest.to_vec().try_into()?)),
        ScVal::U64(attempt.nonce),
    ])
}

/// harvest(farmer: Address, index: u32)
fn harvest_args(farmer: &str, index: u32) -> Result<Vec<ScVal>> {
    Ok(vec![ScVal::Address(account_address(farmer)?), ScVal::U32(index)])
}

/// The `entropy` field of a decoded `Block`.
fn block_entropy(fields: &[(String, ScVal)]) -> Option<[u8; 32]> {
    fields.iter().find_map(|(name, value)| match value {
        ScVal::Bytes(bytes) if name == "entropy" && bytes.len() == 32 => {
            let mut entropy = [0u8; 32];
            entropy.copy_from_slice(bytes.as_slice());
            Some(entropy)
        }
        _ => None,
    })
}
