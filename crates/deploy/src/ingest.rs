//! Evidence submission to a deployed core contract.
//!
//! A financial record is reduced to a SHA-256 fingerprint and submitted to the
//! core's `validateTransaction(bytes32,string)` together with a link to the
//! supporting document.

use alloy_core::primitives::{Address, B256};
use sha2::{Digest, Sha256};

use crate::{
    ChainClient, ChainError, Receipt,
    abi::{ContractCall, Token},
};

/// Core method that validates a fingerprinted record.
pub const VALIDATE_METHOD: &str = "validateTransaction";

/// A financial record to be fingerprinted and validated on chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceRecord {
    pub record_id: String,
    /// Amount, exactly as it should be hashed (e.g. `5000.0`).
    pub amount: String,
    pub sender: String,
    /// Where the supporting document lives, e.g. an `ipfs://` URI.
    pub evidence_uri: String,
}

impl EvidenceRecord {
    /// Deterministic fingerprint: `sha256(record_id || amount || sender)`.
    pub fn fingerprint(&self) -> B256 {
        let mut hasher = Sha256::new();
        hasher.update(self.record_id.as_bytes());
        hasher.update(self.amount.as_bytes());
        hasher.update(self.sender.as_bytes());
        B256::from_slice(&hasher.finalize())
    }

    /// The `validateTransaction` call for this record.
    pub fn validation_call(&self) -> ContractCall {
        ContractCall::new(
            VALIDATE_METHOD,
            vec![
                Token::FixedBytes(self.fingerprint()),
                Token::String(self.evidence_uri.clone()),
            ],
        )
    }
}

/// Submit a record to the core contract and wait for its confirmation.
pub async fn ingest_record<C: ChainClient>(
    client: &C,
    core: Address,
    record: &EvidenceRecord,
) -> Result<Receipt, ChainError> {
    let fingerprint = record.fingerprint();
    tracing::info!(
        record_id = %record.record_id,
        amount = %record.amount,
        fingerprint = %fingerprint,
        "Processing record..."
    );

    let pending = client.call(core, &record.validation_call()).await?;
    tracing::info!(tx_hash = %pending.tx_hash, "Sent to ledger, waiting for confirmation...");

    let receipt = client.wait(pending).await?;
    tracing::info!(
        record_id = %record.record_id,
        block = receipt.block_number,
        "Record confirmed"
    );

    Ok(receipt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> EvidenceRecord {
        EvidenceRecord {
            record_id: "INV-2026-001".to_string(),
            amount: "5000.0".to_string(),
            sender: "Acme Corp".to_string(),
            evidence_uri: "ipfs://QmHash".to_string(),
        }
    }

    #[test]
    fn test_fingerprint_is_sha256_of_concatenated_fields() {
        assert_eq!(
            record().fingerprint().to_string(),
            "0x4c6e901649dfb92651bdfd57738057a8323d4b5ac7c85b0cc707b494fd9cf990"
        );
    }

    #[test]
    fn test_fingerprint_ignores_evidence_uri() {
        let mut other = record();
        other.evidence_uri = "ipfs://Other".to_string();
        assert_eq!(other.fingerprint(), record().fingerprint());

        other.amount = "5000.00".to_string();
        assert_ne!(other.fingerprint(), record().fingerprint());
    }

    #[test]
    fn test_validation_call() {
        let call = record().validation_call();
        assert_eq!(call.signature(), "validateTransaction(bytes32,string)");

        let calldata = call.calldata();
        assert_eq!(hex::encode(&calldata[..4]), "6bc5f48a");
        assert_eq!(&calldata[4..36], record().fingerprint().as_slice());
        // selector + 2 head words + length word + one padded data word
        assert_eq!(calldata.len(), 4 + 4 * 32);
    }
}
