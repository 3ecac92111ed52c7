use debtmarket_crypto::{Address, Hash256};
use serde::{Deserialize, Serialize};

use crate::error::DebtMarketError;
use crate::router::RepaymentRecord;
use crate::terms::TermsKind;
use crate::types::{AgreementId, Amount, BlockContext, TokenId};

/// Protocol events recorded on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolEvent {
    OrderFilled {
        agreement_id: AgreementId,
        debtor: Address,
        creditor: Address,
        underwriter: Address,
        relayer: Address,
        principal_currency: Address,
        principal_amount: Amount,
    },
    OrderCancelled {
        agreement_id: AgreementId,
        cancelled_by: Address,
    },
    Repayment(RepaymentRecord),
    TokenTransferred {
        token_id: TokenId,
        from: Address,
        to: Address,
    },
    TokenApproved {
        token_id: TokenId,
        owner: Address,
        spender: Option<Address>,
    },
    PoolCreated {
        pool: Address,
        manager: Address,
        currency: Address,
    },
    PoolInvestment {
        pool: Address,
        investor: Address,
        amount: Amount,
    },
    PoolSubscriptionClosed {
        pool: Address,
    },
    PoolAcquired {
        pool: Address,
        token_id: TokenId,
        seller: Address,
        price: Amount,
    },
    PoolReleased {
        pool: Address,
        token_id: TokenId,
        to: Address,
    },
    PoolProceedsReceived {
        pool: Address,
        token_id: TokenId,
        amount: Amount,
    },
    PoolDistribution {
        pool: Address,
        investor: Address,
        amount: Amount,
    },
    TransferAgentAuthorized {
        agent: Address,
    },
    TransferAgentRevoked {
        agent: Address,
    },
    TermsContractRegistered {
        address: Address,
        kind: TermsKind,
    },
}

impl ProtocolEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolEvent::OrderFilled { .. } => "order_filled",
            ProtocolEvent::OrderCancelled { .. } => "order_cancelled",
            ProtocolEvent::Repayment(_) => "repayment",
            ProtocolEvent::TokenTransferred { .. } => "token_transferred",
            ProtocolEvent::TokenApproved { .. } => "token_approved",
            ProtocolEvent::PoolCreated { .. } => "pool_created",
            ProtocolEvent::PoolInvestment { .. } => "pool_investment",
            ProtocolEvent::PoolSubscriptionClosed { .. } => "pool_subscription_closed",
            ProtocolEvent::PoolAcquired { .. } => "pool_acquired",
            ProtocolEvent::PoolReleased { .. } => "pool_released",
            ProtocolEvent::PoolProceedsReceived { .. } => "pool_proceeds_received",
            ProtocolEvent::PoolDistribution { .. } => "pool_distribution",
            ProtocolEvent::TransferAgentAuthorized { .. } => "transfer_agent_authorized",
            ProtocolEvent::TransferAgentRevoked { .. } => "transfer_agent_revoked",
            ProtocolEvent::TermsContractRegistered { .. } => "terms_contract_registered",
        }
    }
}

/// Hash-chained ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub index: u64,
    pub block: u64,
    pub timestamp: u64,
    pub kind: String,
    pub event: ProtocolEvent,
    pub previous_hash: Option<Hash256>,
    pub entry_hash: Hash256,
}

#[derive(Serialize)]
struct EntryMaterial<'a> {
    index: u64,
    block: u64,
    timestamp: u64,
    kind: &'a str,
    event: &'a ProtocolEvent,
    previous_hash: Option<&'a Hash256>,
}

/// Append-only event log with hash-chain proofs.
///
/// No in-place mutation API is exposed; every committed transaction only
/// ever appends.
#[derive(Debug, Default, Clone)]
pub struct EventLedger {
    entries: Vec<LedgerEntry>,
}

impl EventLedger {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Rebuild a ledger from persisted entries and verify hash-chain integrity.
    pub fn from_entries(entries: Vec<LedgerEntry>) -> Result<Self, DebtMarketError> {
        let ledger = Self { entries };

        for (expected_index, entry) in ledger.entries.iter().enumerate() {
            if entry.index != expected_index as u64 {
                return Err(DebtMarketError::Ledger(format!(
                    "ledger index gap detected at position {} (found {})",
                    expected_index, entry.index
                )));
            }
        }

        if !ledger.verify_chain() {
            return Err(DebtMarketError::Ledger(
                "persisted ledger hash-chain verification failed".to_string(),
            ));
        }

        Ok(ledger)
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn head(&self) -> Option<&Hash256> {
        self.entries.last().map(|entry| &entry.entry_hash)
    }

    /// Repayments routed for `agreement_id`, oldest first.
    pub fn repayments<'s>(
        &'s self,
        agreement_id: &'s AgreementId,
    ) -> impl Iterator<Item = &'s RepaymentRecord> + 's {
        self.entries.iter().filter_map(move |entry| match &entry.event {
            ProtocolEvent::Repayment(record) if record.agreement_id == *agreement_id => {
                Some(record)
            }
            _ => None,
        })
    }

    pub(crate) fn append(&mut self, block: BlockContext, event: ProtocolEvent) {
        let index = self.entries.len() as u64;
        let previous_hash = self.head().copied();
        let kind = event.kind().to_string();
        let entry_hash = compute_entry_hash(
            index,
            block.number,
            block.timestamp,
            &kind,
            &event,
            previous_hash.as_ref(),
        );
        self.entries.push(LedgerEntry {
            index,
            block: block.number,
            timestamp: block.timestamp,
            kind,
            event,
            previous_hash,
            entry_hash,
        });
    }

    pub fn verify_chain(&self) -> bool {
        let mut previous_hash: Option<Hash256> = None;
        for entry in &self.entries {
            if entry.kind != entry.event.kind() {
                return false;
            }
            let expected_hash = compute_entry_hash(
                entry.index,
                entry.block,
                entry.timestamp,
                &entry.kind,
                &entry.event,
                previous_hash.as_ref(),
            );
            if entry.entry_hash != expected_hash {
                return false;
            }
            if entry.previous_hash != previous_hash {
                return false;
            }
            previous_hash = Some(entry.entry_hash);
        }
        true
    }
}

fn compute_entry_hash(
    index: u64,
    block: u64,
    timestamp: u64,
    kind: &str,
    event: &ProtocolEvent,
    previous_hash: Option<&Hash256>,
) -> Hash256 {
    let material = EntryMaterial {
        index,
        block,
        timestamp,
        kind,
        event,
        previous_hash,
    };
    let bytes = serde_json::to_vec(&material).unwrap_or_default();
    Hash256::digest(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(tag: &[u8]) -> AgreementId {
        AgreementId(Hash256::digest(tag))
    }

    fn sample_ledger() -> EventLedger {
        let mut ledger = EventLedger::new();
        let block = BlockContext::new(10, 1_700_000_000);
        ledger.append(
            block,
            ProtocolEvent::OrderFilled {
                agreement_id: id(b"a"),
                debtor: Address::derive("debtor"),
                creditor: Address::derive("creditor"),
                underwriter: Address::NULL,
                relayer: Address::NULL,
                principal_currency: Address::derive("REP"),
                principal_amount: 1_000,
            },
        );
        ledger.append(
            block.advanced(1, 15),
            ProtocolEvent::Repayment(RepaymentRecord {
                agreement_id: id(b"a"),
                payer: Address::derive("debtor"),
                beneficiary: Address::derive("creditor"),
                amount: 400,
                currency: Address::derive("REP"),
                block: 11,
                timestamp: 1_700_000_015,
            }),
        );
        ledger
    }

    #[test]
    fn verifies_hash_chain() {
        let ledger = sample_ledger();
        assert_eq!(ledger.len(), 2);
        assert!(ledger.verify_chain());
        assert_eq!(ledger.entries()[1].previous_hash, Some(ledger.entries()[0].entry_hash));
    }

    #[test]
    fn detects_tampered_entries() {
        let mut entries = sample_ledger().entries().to_vec();
        if let ProtocolEvent::Repayment(record) = &mut entries[1].event {
            record.amount = 4_000;
        }
        assert!(EventLedger::from_entries(entries).is_err());
    }

    #[test]
    fn detects_index_gaps() {
        let mut entries = sample_ledger().entries().to_vec();
        entries.remove(0);
        let err = EventLedger::from_entries(entries).unwrap_err();
        assert!(matches!(err, DebtMarketError::Ledger(_)));
    }

    #[test]
    fn persisted_entries_roundtrip() {
        let ledger = sample_ledger();
        let json = serde_json::to_string(ledger.entries()).unwrap();
        let entries: Vec<LedgerEntry> = serde_json::from_str(&json).unwrap();
        let rebuilt = EventLedger::from_entries(entries).unwrap();
        assert_eq!(rebuilt.head(), ledger.head());
    }

    #[test]
    fn repayments_filter_by_agreement() {
        let ledger = sample_ledger();
        let amounts: Vec<Amount> = ledger.repayments(&id(b"a")).map(|r| r.amount).collect();
        assert_eq!(amounts, vec![400]);
        assert_eq!(ledger.repayments(&id(b"b")).count(), 0);
    }
}
