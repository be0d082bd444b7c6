use anyhow::{Context, Result};
use stellar_rpc_client::{Client, LedgerEntryResult, SimulateTransactionResponse};
use stellar_strkey::{Contract, Strkey};
use stellar_xdr::curr::{
    AccountId, AlphaNum12, AlphaNum4, AssetCode12, AssetCode4, ContractDataDurability, Hash,
    HostFunction, InvokeContractArgs, InvokeHostFunctionOp, LedgerEntryData, LedgerKey,
    LedgerKeyContractData, LedgerKeyTrustLine, Limits, Memo, MuxedAccount, Operation,
    OperationBody, Preconditions, PublicKey, ReadXdr, ScAddress, ScSymbol, ScVal, ScVec, SequenceNumber,
    SorobanAuthorizationEntry, SorobanTransactionData, Transaction, TransactionEnvelope,
    TransactionExt, TransactionV1Envelope, TrustLineAsset, Uint256, VecM,
};

use crate::tracing::prelude::*;

/// Inclusion fee added on top of the simulated resource fee.
const BASE_FEE: u32 = 100;

/// What the RPC node reports about itself.
#[derive(Debug, Clone)]
pub struct NetworkStatus {
    pub passphrase: String,
    pub protocol_version: u32,
    pub latest_ledger: u32,
}

/// General-purpose Soroban RPC client for interacting with contracts
pub struct SorobanRpc {
    client: Client,
    contract_id: Contract,
    network_passphrase: String,
}

impl SorobanRpc {
    /// Create a new RPC client instance
    ///
    /// # Arguments
    /// * `rpc_url` - The Soroban RPC endpoint URL
    /// * `contract_address` - The contract address (e.g., "CDSWUUXGPWDZG76ISK6SUCVPZJMD5YUV66J2FXFXFGDX25XKZJIEITAO")
    /// * `network_passphrase` - The network passphrase (e.g., "Test SDF Network ; September 2015" for testnet)
    pub fn new(rpc_url: &str, contract_address: &str, network_passphrase: &str) -> Result<Self> {
        let client = Client::new(rpc_url)?;
        let contract_id =
            Contract::from_string(contract_address).context("Failed to parse contract address")?;

        Ok(Self {
            client,
            contract_id,
            network_passphrase: network_passphrase.to_string(),
        })
    }

    fn contract_address(&self) -> ScAddress {
        ScAddress::Contract(Hash(self.contract_id.0))
    }

    /// Get the contract instance storage entry
    ///
    /// Instance storage is accessed using ScVal::LedgerKeyContractInstance as the key.
    pub async fn get_contract_instance(&self) -> Result<LedgerEntryResult> {
        let ledger_key = LedgerKey::ContractData(LedgerKeyContractData {
            contract: self.contract_address(),
            key: ScVal::LedgerKeyContractInstance,
            durability: ContractDataDurability::Persistent,
        });

        let response = self.client.get_ledger_entries(&[ledger_key]).await?;

        response
            .entries
            .and_then(|e| e.into_iter().next())
            .context("Contract instance entry not found")
    }

    /// Parse a value from instance storage by key name
    pub fn parse_instance_storage_value(
        entry: &LedgerEntryResult,
        key_name: &str,
    ) -> Result<ScVal> {
        let entry_data = LedgerEntryData::from_xdr_base64(&entry.xdr, Limits::none())
            .context("Failed to decode XDR")?;

        // Navigate: ContractData -> ContractInstance -> storage -> find key
        if let LedgerEntryData::ContractData(contract_data) = entry_data {
            if let ScVal::ContractInstance(instance) = contract_data.val {
                let storage_map = instance
                    .storage
                    .context("ContractInstance has no storage map")?;

                // Instance storage keys are wrapped: Vec(ScVec([Symbol("KeyName")]))
                for map_entry in storage_map.iter() {
                    if let ScVal::Vec(Some(vec)) = &map_entry.key {
                        if let Some(ScVal::Symbol(sym)) = vec.first() {
                            if sym.to_utf8_string_lossy() == key_name {
                                return Ok(map_entry.val.clone());
                            }
                        }
                    }
                }

                anyhow::bail!("Key '{}' not found in instance storage", key_name);
            }
        }

        anyhow::bail!("Unexpected ledger entry structure")
    }

    /// Temporary-storage key of the form `Vec([Symbol(name), ..parts])`
    pub fn temporary_key(&self, name: &str, parts: Vec<ScVal>) -> Result<LedgerKey> {
        let mut key = vec![ScVal::Symbol(ScSymbol(name.try_into()?))];
        key.extend(parts);

        Ok(LedgerKey::ContractData(LedgerKeyContractData {
            contract: self.contract_address(),
            key: ScVal::Vec(Some(ScVec(key.try_into()?))),
            durability: ContractDataDurability::Temporary,
        }))
    }

    /// Decode a ledger entry holding a contract struct into its field map
    pub fn parse_contract_map(entry: &LedgerEntryResult) -> Result<Vec<(String, ScVal)>> {
        let entry_data = LedgerEntryData::from_xdr_base64(&entry.xdr, Limits::none())
            .context("Failed to decode XDR")?;

        let LedgerEntryData::ContractData(contract_data) = entry_data else {
            anyhow::bail!("Ledger entry is not ContractData");
        };
        let ScVal::Map(Some(map)) = contract_data.val else {
            anyhow::bail!("Contract value is not a Map: {:?}", contract_data.val);
        };

        Ok(map
            .iter()
            .filter_map(|entry| match &entry.key {
                ScVal::Symbol(sym) => Some((sym.to_utf8_string_lossy(), entry.val.clone())),
                _ => None,
            })
            .collect())
    }

    /// Build a transaction to invoke a contract function
    ///
    /// # Arguments
    /// * `source_account` - The public key of the account that will sign the transaction
    /// * `function_name` - The contract function to invoke
    /// * `args` - The function arguments
    pub async fn build_invoke_transaction(
        &self,
        source_account: &str,
        function_name: &str,
        args: Vec<ScVal>,
    ) -> Result<Transaction> {
        let account_bytes = account_bytes(source_account)?;

        // Get the account sequence number
        let account_response = self.client.get_account(source_account).await?;
        let sequence = account_response.seq_num.0 + 1;

        let invoke_args = InvokeContractArgs {
            contract_address: self.contract_address(),
            function_name: ScSymbol(function_name.try_into().context("Function name too long")?),
            args: args.try_into()?,
        };

        let operation = Operation {
            source_account: None,
            body: OperationBody::InvokeHostFunction(InvokeHostFunctionOp {
                host_function: HostFunction::InvokeContract(invoke_args),
                auth: VecM::default(),
            }),
        };

        // Fees are updated after simulation
        Ok(Transaction {
            source_account: MuxedAccount::Ed25519(Uint256(account_bytes)),
            fee: BASE_FEE,
            seq_num: SequenceNumber(sequence),
            cond: Preconditions::None,
            memo: Memo::None,
            operations: vec![operation].try_into()?,
            ext: TransactionExt::V0,
        })
    }

    /// Simulate a transaction to get resource requirements and fees
    pub async fn simulate_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<SimulateTransactionResponse> {
        let envelope = TransactionEnvelope::Tx(TransactionV1Envelope {
            tx: transaction.clone(),
            signatures: VecM::default(),
        });

        self.client
            .simulate_transaction_envelope(&envelope)
            .await
            .context("Failed to simulate transaction")
    }

    /// Apply simulation results to a transaction
    pub fn apply_simulation_to_transaction(
        &self,
        mut transaction: Transaction,
        simulation: &SimulateTransactionResponse,
    ) -> Result<Transaction> {
        let first_result = simulation
            .results
            .first()
            .context("No simulation results found")?;

        if simulation.transaction_data.is_empty() {
            anyhow::bail!("No transaction data in simulation response");
        }

        let soroban_tx_data =
            SorobanTransactionData::from_xdr_base64(&simulation.transaction_data, Limits::none())
                .context("Failed to parse soroban transaction data")?;

        if !first_result.auth.is_empty() {
            let auth_entries: Vec<SorobanAuthorizationEntry> = first_result
                .auth
                .iter()
                .filter_map(|xdr| SorobanAuthorizationEntry::from_xdr_base64(xdr, Limits::none()).ok())
                .collect();

            let mut operations: Vec<_> = transaction.operations.to_vec();
            if let Some(operation) = operations.get_mut(0) {
                if let OperationBody::InvokeHostFunction(ref mut invoke_op) = operation.body {
                    invoke_op.auth = auth_entries
                        .try_into()
                        .context("Failed to convert auth entries")?;
                }
            }
            transaction.operations = operations.try_into()?;
        }

        transaction.ext = TransactionExt::V1(soroban_tx_data);

        let resource_fee =
            u32::try_from(simulation.min_resource_fee).context("Resource fee out of range")?;
        transaction.fee = BASE_FEE
            .checked_add(resource_fee)
            .context("Transaction fee overflow")?;

        Ok(transaction)
    }

    /// Simulate, bail on contract errors, and apply the footprint and fees
    pub async fn prepare_transaction(&self, transaction: Transaction) -> Result<Transaction> {
        let simulation = self.simulate_transaction(&transaction).await?;

        if let Some(error) = &simulation.error {
            anyhow::bail!("Transaction simulation failed: {}", error);
        }

        debug!(
            min_resource_fee = simulation.min_resource_fee,
            "Simulated transaction"
        );
        self.apply_simulation_to_transaction(transaction, &simulation)
    }

    /// Submit a signed transaction envelope, returning its hex hash
    pub async fn submit_envelope(&self, envelope: &TransactionEnvelope) -> Result<String> {
        let response = self
            .client
            .send_transaction(envelope)
            .await
            .context("Failed to submit transaction")?;

        Ok(hex::encode(response.0))
    }

    /// Check if an account has a trustline to a specific asset and get the balance
    ///
    /// Returns (has_trustline, balance) where balance is in stroops
    pub async fn check_trustline_and_balance(
        &self,
        account_address: &str,
        asset_code: &str,
        asset_issuer: &str,
    ) -> Result<(bool, i64)> {
        let account_id = AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(account_bytes(
            account_address,
        )?)));
        let issuer = AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(account_bytes(
            asset_issuer,
        )?)));

        let trustline_key = LedgerKey::Trustline(LedgerKeyTrustLine {
            account_id,
            asset: trustline_asset(asset_code, issuer)?,
        });

        let Some(entry) = self.get_ledger_entry(trustline_key).await? else {
            return Ok((false, 0));
        };

        match LedgerEntryData::from_xdr_base64(&entry.xdr, Limits::none())? {
            LedgerEntryData::Trustline(trustline) => Ok((true, trustline.balance)),
            _ => Ok((false, 0)),
        }
    }

    /// Get the network passphrase
    pub fn network_passphrase(&self) -> &str {
        &self.network_passphrase
    }

    /// Get a ledger entry by key; a missing entry is `None`, a failed lookup an error
    pub async fn get_ledger_entry(&self, key: LedgerKey) -> Result<Option<LedgerEntryResult>> {
        let response = self
            .client
            .get_ledger_entries(&[key])
            .await
            .context("Failed to fetch ledger entry")?;
        Ok(response.entries.and_then(|e| e.into_iter().next()))
    }

    /// Get the XLM balance of an account
    ///
    /// Returns the balance in stroops, or None if the account doesn't exist
    pub async fn get_xlm_balance(&self, account_address: &str) -> Result<Option<i64>> {
        match self.client.get_account(account_address).await {
            Ok(account) => Ok(Some(account.balance)),
            Err(stellar_rpc_client::Error::NotFound(..)) => {
                debug!(account = account_address, "Account not found");
                Ok(None)
            }
            Err(e) => Err(e).with_context(|| format!("Failed to fetch account {}", account_address)),
        }
    }

    /// Passphrase, protocol and latest ledger as reported by the node
    pub async fn network_status(&self) -> Result<NetworkStatus> {
        let network = self
            .client
            .get_network()
            .await
            .context("Failed to query network")?;
        let latest = self
            .client
            .get_latest_ledger()
            .await
            .context("Failed to query latest ledger")?;

        Ok(NetworkStatus {
            passphrase: network.passphrase,
            protocol_version: network.protocol_version,
            latest_ledger: latest.sequence,
        })
    }
}

/// Raw ed25519 bytes of a `G...` account id
pub fn account_bytes(account: &str) -> Result<[u8; 32]> {
    match Strkey::from_string(account).context("Failed to parse account address")? {
        Strkey::PublicKeyEd25519(pk) => Ok(pk.0),
        _ => anyhow::bail!("Invalid account key type"),
    }
}

/// `ScAddress` of a `G...` account id
pub fn account_address(account: &str) -> Result<ScAddress> {
    Ok(ScAddress::Account(AccountId(PublicKey::PublicKeyTypeEd25519(
        Uint256(account_bytes(account)?),
    ))))
}

fn trustline_asset(code: &str, issuer: AccountId) -> Result<TrustLineAsset> {
    let bytes = code.as_bytes();
    match bytes.len() {
        1..=4 => {
            let mut padded = [0u8; 4];
            padded[..bytes.len()].copy_from_slice(bytes);
            Ok(TrustLineAsset::CreditAlphanum4(AlphaNum4 {
                asset_code: AssetCode4(padded),
                issuer,
            }))
        }
        5..=12 => {
            let mut padded = [0u8; 12];
            padded[..bytes.len()].copy_from_slice(bytes);
            Ok(TrustLineAsset::CreditAlphanum12(AlphaNum12 {
                asset_code: AssetCode12(padded),
                issuer,
            }))
        }
        _ => anyhow::bail!("Invalid asset code '{}'", code),
    }
}
