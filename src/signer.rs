use std::fmt;

use anyhow::{Context, Result};
use ed25519_dalek::{Signer as _, SigningKey};
use sha2::{Digest, Sha256};
use stellar_strkey::Strkey;
use stellar_xdr::curr::{
    DecoratedSignature, Hash, Limits, Signature, SignatureHint, Transaction, TransactionEnvelope,
    TransactionSignaturePayload, TransactionSignaturePayloadTaggedTransaction,
    TransactionV1Envelope, WriteXdr,
};

/// Local ed25519 key that signs farm transactions.
#[derive(Clone)]
pub struct Signer {
    key: SigningKey,
    public_key: String,
}

impl Signer {
    /// From an `S...` secret seed.
    pub fn from_secret(secret: &str) -> Result<Self> {
        match Strkey::from_string(secret.trim()).context("Failed to parse secret key")? {
            Strkey::PrivateKeyEd25519(sk) => Ok(Self::from_bytes(sk.0)),
            _ => anyhow::bail!("Not an ed25519 secret seed"),
        }
    }

    pub fn from_bytes(seed: [u8; 32]) -> Self {
        let key = SigningKey::from_bytes(&seed);
        let public_key =
            stellar_strkey::ed25519::PublicKey(key.verifying_key().to_bytes()).to_string();
        Self { key, public_key }
    }

    /// `G...` account id.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.key.verifying_key().to_bytes()
    }

    /// Hash a transaction the way the network does before verifying signatures.
    pub fn transaction_hash(transaction: &Transaction, network_passphrase: &str) -> Result<[u8; 32]> {
        let network_id = Hash(sha256(network_passphrase.as_bytes()));
        let payload = TransactionSignaturePayload {
            network_id,
            tagged_transaction: TransactionSignaturePayloadTaggedTransaction::Tx(transaction.clone()),
        };
        let bytes = payload
            .to_xdr(Limits::none())
            .context("Failed to encode signature payload")?;
        Ok(sha256(&bytes))
    }

    /// Sign `transaction` and wrap it in an envelope ready for submission.
    pub fn sign(
        &self,
        transaction: Transaction,
        network_passphrase: &str,
    ) -> Result<TransactionEnvelope> {
        let hash = Self::transaction_hash(&transaction, network_passphrase)?;
        let signature = self.key.sign(&hash);

        let public = self.public_key_bytes();
        let decorated = DecoratedSignature {
            hint: SignatureHint([public[28], public[29], public[30], public[31]]),
            signature: Signature(signature.to_bytes().to_vec().try_into()?),
        };

        Ok(TransactionEnvelope::Tx(TransactionV1Envelope {
            tx: transaction,
            signatures: vec![decorated].try_into()?,
        }))
    }
}

fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(bytes));
    out
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Verifier, VerifyingKey};
    use stellar_xdr::curr::{
        Memo, MuxedAccount, Preconditions, SequenceNumber, TransactionExt, Uint256,
    };

    const PASSPHRASE: &str = "Test SDF Network ; September 2015";

    fn empty_transaction(source: [u8; 32]) -> Transaction {
        Transaction {
            source_account: MuxedAccount::Ed25519(Uint256(source)),
            fee: 100,
            seq_num: SequenceNumber(1),
            cond: Preconditions::None,
            memo: Memo::None,
            operations: Default::default(),
            ext: TransactionExt::V0,
        }
    }

    #[test]
    fn test_secret_round_trip() {
        let seed = [3u8; 32];
        let secret = stellar_strkey::ed25519::PrivateKey(seed).to_string();

        let signer = Signer::from_secret(&secret).unwrap();
        assert_eq!(signer.public_key(), Signer::from_bytes(seed).public_key());
        assert!(signer.public_key().starts_with('G'));
        assert_eq!(signer.public_key().len(), 56);
    }

    #[test]
    fn test_rejects_non_secret() {
        assert!(Signer::from_secret("GCHPTWXMT3HYF4RLZHWBNRF4MPXLTJ76ISHMSYIWCCDXWUYOQG5MR2AB").is_err());
        assert!(Signer::from_secret("garbage").is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let signer = Signer::from_bytes([9u8; 32]);
        let debug = format!("{:?}", signer);
        assert!(debug.contains(signer.public_key()));
        assert!(!debug.contains("SigningKey"));
    }

    #[test]
    fn test_signature_verifies() {
        let signer = Signer::from_bytes([5u8; 32]);
        let tx = empty_transaction(signer.public_key_bytes());
        let hash = Signer::transaction_hash(&tx, PASSPHRASE).unwrap();

        let envelope = signer.sign(tx, PASSPHRASE).unwrap();
        let TransactionEnvelope::Tx(v1) = envelope else {
            panic!("expected a v1 envelope");
        };
        assert_eq!(v1.signatures.len(), 1);

        let decorated = &v1.signatures[0];
        assert_eq!(decorated.hint.0, signer.public_key_bytes()[28..32]);

        let bytes: [u8; 64] = decorated.signature.0.to_vec().try_into().unwrap();
        let verifying = VerifyingKey::from_bytes(&signer.public_key_bytes()).unwrap();
        assert!(verifying
            .verify(&hash, &ed25519_dalek::Signature::from_bytes(&bytes))
            .is_ok());
    }

    #[test]
    fn test_hash_depends_on_network() {
        let signer = Signer::from_bytes([5u8; 32]);
        let tx = empty_transaction(signer.public_key_bytes());
        assert_ne!(
            Signer::transaction_hash(&tx, PASSPHRASE).unwrap(),
            Signer::transaction_hash(&tx, "Public Global Stellar Network ; September 2015").unwrap()
        );
    }
}
