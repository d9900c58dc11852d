use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ledger::{AccountId, Amount, LedgerEvent, StakeRecord, Timestamp, TransactionKind};

/// Complete persisted state of one pool.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub owner: AccountId,
    pub creation_time: Timestamp,
    pub total_staked: Amount,
    pub total_assets: Amount,
    pub total_carbon_credits: Amount,
    pub records: BTreeMap<AccountId, StakeRecord>,
    pub events: Vec<LedgerEvent>,
    #[serde(with = "crate::snapshot::hex_root")]
    pub state_root: [u8; 32],
}

impl PoolSnapshot {
    pub fn recompute_root(&self) -> [u8; 32] {
        compute_state_root(
            &self.owner,
            self.creation_time,
            [
                self.total_staked,
                self.total_assets,
                self.total_carbon_credits,
            ],
            &self.records,
            &self.events,
        )
    }
}

pub(crate) fn compute_state_root(
    owner: &str,
    creation_time: Timestamp,
    totals: [Amount; 3],
    records: &BTreeMap<AccountId, StakeRecord>,
    events: &[LedgerEvent],
) -> [u8; 32] {
    let mut leaves: Vec<[u8; 32]> = Vec::with_capacity(records.len() + 2);

    let mut hasher = Sha256::new();
    hasher.update(b"pool");
    hasher.update((owner.len() as u64).to_le_bytes());
    hasher.update(owner.as_bytes());
    hasher.update(creation_time.to_le_bytes());
    for total in totals {
        hasher.update(total.to_le_bytes());
    }
    leaves.push(hasher.finalize().into());
    leaves.push(events_leaf(events));

    for (participant, record) in records {
        let mut hasher = Sha256::new();
        hasher.update(b"stake");
        hasher.update((participant.len() as u64).to_le_bytes());
        hasher.update(participant.as_bytes());
        hasher.update(record.balance.to_le_bytes());
        hasher.update((record.transactions.len() as u64).to_le_bytes());
        for tx in &record.transactions {
            hasher.update(tx.amount.to_le_bytes());
            hasher.update(tx.timestamp.to_le_bytes());
            hasher.update([match tx.kind {
                TransactionKind::Stake => 0u8,
                TransactionKind::Withdraw => 1u8,
            }]);
        }
        leaves.push(hasher.finalize().into());
    }
    build_merkle(leaves)
}

fn events_leaf(events: &[LedgerEvent]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"events");
    hasher.update((events.len() as u64).to_le_bytes());
    for event in events {
        let (tag, participant, amount) = match event {
            LedgerEvent::Staked {
                participant,
                amount,
            } => (0u8, Some(participant), amount),
            LedgerEvent::Withdrawn {
                participant,
                amount,
            } => (1, Some(participant), amount),
            LedgerEvent::AssetsAdded { amount } => (2, None, amount),
            LedgerEvent::AssetsRemoved { amount } => (3, None, amount),
            LedgerEvent::CarbonCreditsAdded { amount } => (4, None, amount),
        };
        hasher.update([tag]);
        if let Some(participant) = participant {
            hasher.update((participant.len() as u64).to_le_bytes());
            hasher.update(participant.as_bytes());
        }
        hasher.update(amount.to_le_bytes());
    }
    hasher.finalize().into()
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"staking-pool-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity(leaves.len().div_ceil(2));
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            hasher.update(chunk.get(1).unwrap_or(&chunk[0]));
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}

pub(crate) mod hex_root {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| D::Error::custom("state root must be 32 bytes"))
    }
}
