//! Hedera Ledger Integration
//!
//! Anchors learning entries on the Hedera Consensus Service and mints badge
//! NFTs through a contract.
//!
//! ## Architecture
//!
//! - **LedgerBackend**: the network operations the tracker needs
//! - **HederaGateway**: HTTP implementation (signing gateway + mirror node)
//! - **LedgerService**: recording policy; returns [`LedgerOutcome`]
//!
//! ## Local placeholders
//!
//! When a write cannot reach the network and fallback is allowed, the
//! service returns [`LedgerOutcome::LocalOnly`] carrying a `local_<ms>` id.
//! Those ids are never confirmed later; [`is_local_transaction_id`] tells
//! them apart.

mod backend;
mod gateway;
mod service;

pub use backend::{
    AccountBalance, ContractCall, ContractDeployment, LedgerBackend, LedgerError, LedgerReceipt,
    TransactionStatus,
};
pub use gateway::{mirror_transaction_id, GatewayConfig, HederaGateway};
pub use service::{
    entry_memo, BadgeMetadata, LedgerOutcome, LedgerService, LedgerSettings, LedgerStatus,
    MAX_MESSAGE_BYTES,
};

use chrono::{DateTime, Utc};

const LOCAL_PREFIX: &str = "local_";

/// Placeholder id for a write that never reached the network
pub fn local_transaction_id(at: DateTime<Utc>) -> String {
    format!("{}{}", LOCAL_PREFIX, at.timestamp_millis())
}

pub fn is_local_transaction_id(id: &str) -> bool {
    id.starts_with(LOCAL_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_local_ids() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let id = local_transaction_id(at);
        assert_eq!(id, "local_1700000000123");
        assert!(is_local_transaction_id(&id));
        assert!(!is_local_transaction_id("0.0.1@1700000000.1"));
    }
}
