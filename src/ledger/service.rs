//! Ledger service
//!
//! Wraps a [`LedgerBackend`] with the tracker's recording policy. Every
//! write comes back as a [`LedgerOutcome`]: either the network confirmed it,
//! or the tracker kept a local placeholder id and says why.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::backend::{ContractCall, ContractDeployment, LedgerBackend, LedgerError, TransactionStatus};
use super::{is_local_transaction_id, local_transaction_id};
use crate::model::Entry;

/// Hedera consensus messages are capped at 1024 bytes
pub const MAX_MESSAGE_BYTES: usize = 1024;

/// Outcome of a ledger write
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerOutcome {
    /// The network accepted the transaction
    Confirmed {
        transaction_id: String,
        status: String,
    },
    /// Nothing reached the network; `transaction_id` is a `local_` placeholder
    LocalOnly {
        transaction_id: String,
        reason: String,
    },
}

impl LedgerOutcome {
    pub fn transaction_id(&self) -> &str {
        match self {
            LedgerOutcome::Confirmed { transaction_id, .. } => transaction_id,
            LedgerOutcome::LocalOnly { transaction_id, .. } => transaction_id,
        }
    }

    /// Receipt status, or `LOCAL_FALLBACK` for local placeholders
    pub fn status(&self) -> &str {
        match self {
            LedgerOutcome::Confirmed { status, .. } => status,
            LedgerOutcome::LocalOnly { .. } => "LOCAL_FALLBACK",
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, LedgerOutcome::Confirmed { .. })
    }

    fn local(reason: impl Into<String>) -> Self {
        LedgerOutcome::LocalOnly {
            transaction_id: local_transaction_id(Utc::now()),
            reason: reason.into(),
        }
    }
}

/// Recording policy for [`LedgerService`]
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    /// Network name used for explorer links ("testnet", "mainnet")
    pub network: String,
    /// Consensus topic that receives entry memos
    pub topic_id: Option<String>,
    /// Badge NFT contract
    pub badge_contract_id: Option<String>,
    /// Gas limit for badge mints
    pub mint_gas: u64,
    /// Degrade to local placeholder ids instead of failing
    pub allow_local_fallback: bool,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            network: "testnet".to_string(),
            topic_id: None,
            badge_contract_id: None,
            mint_gas: 300_000,
            allow_local_fallback: true,
        }
    }
}

/// Snapshot of the ledger configuration for status endpoints
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerStatus {
    pub enabled: bool,
    pub network: String,
    pub topic_id: Option<String>,
    pub badge_contract_id: Option<String>,
    pub allow_local_fallback: bool,
}

/// Metadata stored with a minted badge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BadgeMetadata {
    pub user_id: String,
    pub name: String,
    pub rarity: String,
    pub milestone: u32,
    pub entry_count: u32,
}

/// Records entries and mints badges on the ledger
pub struct LedgerService {
    backend: Option<Arc<dyn LedgerBackend>>,
    settings: LedgerSettings,
}

impl LedgerService {
    pub fn new(backend: Arc<dyn LedgerBackend>, settings: LedgerSettings) -> Self {
        Self {
            backend: Some(backend),
            settings,
        }
    }

    /// A service with no network; every write is local-only
    pub fn disabled() -> Self {
        Self {
            backend: None,
            settings: LedgerSettings::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    pub fn status(&self) -> LedgerStatus {
        LedgerStatus {
            enabled: self.is_enabled(),
            network: self.settings.network.clone(),
            topic_id: self.settings.topic_id.clone(),
            badge_contract_id: self.settings.badge_contract_id.clone(),
            allow_local_fallback: self.settings.allow_local_fallback,
        }
    }

    /// Submit a memo to the entry topic
    pub async fn record_entry(&self, memo: &str) -> Result<LedgerOutcome, LedgerError> {
        let Some(backend) = &self.backend else {
            return Ok(LedgerOutcome::local("ledger disabled"));
        };

        let result = match &self.settings.topic_id {
            Some(topic_id) => backend
                .submit_message(topic_id, memo)
                .await,
            None => Err(LedgerError::NotConfigured("topic_id".to_string())),
        };

        self.settle("record_entry", result.map(|r| (r.transaction_id, r.status)))
    }

    /// Mint the NFT for a badge milestone
    pub async fn mint_badge(
        &self,
        milestone: u32,
        metadata: &BadgeMetadata,
    ) -> Result<LedgerOutcome, LedgerError> {
        let Some(backend) = &self.backend else {
            return Ok(LedgerOutcome::local("ledger disabled"));
        };

        let result = match &self.settings.badge_contract_id {
            Some(contract_id) => {
                let metadata_json = serde_json::to_string(metadata)
                    .map_err(|e| LedgerError::InvalidResponse(e.to_string()))?;
                let call = ContractCall {
                    contract_id: contract_id.clone(),
                    function: "mintBadge".to_string(),
                    params: vec![
                        serde_json::Value::from(metadata.user_id.clone()),
                        serde_json::Value::from(milestone),
                        serde_json::Value::from(metadata_json),
                    ],
                    gas: self.settings.mint_gas,
                };
                backend.execute_contract(&call).await
            }
            None => Err(LedgerError::NotConfigured("badge_contract_id".to_string())),
        };

        self.settle("mint_badge", result.map(|r| (r.transaction_id, r.status)))
    }

    /// Deploy contract bytecode; never falls back
    pub async fn deploy_contract(
        &self,
        bytecode: &str,
        gas: u64,
    ) -> Result<ContractDeployment, LedgerError> {
        let deployment = self.backend()?.deploy_contract(bytecode, gas).await?;
        tracing::info!(
            contract_id = %deployment.contract_id,
            transaction_id = %deployment.transaction_id,
            "Deployed contract"
        );
        Ok(deployment)
    }

    /// Execute a contract function; never falls back
    pub async fn call_contract(&self, call: &ContractCall) -> Result<LedgerOutcome, LedgerError> {
        let receipt = self.backend()?.execute_contract(call).await?;
        Ok(LedgerOutcome::Confirmed {
            transaction_id: receipt.transaction_id,
            status: receipt.status,
        })
    }

    /// Read-only contract call
    pub async fn query_contract(&self, call: &ContractCall) -> Result<serde_json::Value, LedgerError> {
        self.backend()?.query_contract(call).await
    }

    /// Confirm a transaction on the mirror node
    pub async fn verify(&self, transaction_id: &str) -> Result<TransactionStatus, LedgerError> {
        if is_local_transaction_id(transaction_id) {
            return Err(LedgerError::LocalTransaction(transaction_id.to_string()));
        }
        self.backend()?.transaction_status(transaction_id).await
    }

    fn backend(&self) -> Result<&Arc<dyn LedgerBackend>, LedgerError> {
        self.backend
            .as_ref()
            .ok_or_else(|| LedgerError::NotConfigured("ledger disabled".to_string()))
    }

    fn settle(
        &self,
        operation: &str,
        result: Result<(String, String), LedgerError>,
    ) -> Result<LedgerOutcome, LedgerError> {
        match result {
            Ok((transaction_id, status)) => {
                tracing::info!(operation, transaction_id = %transaction_id, status = %status, "Ledger write confirmed");
                Ok(LedgerOutcome::Confirmed {
                    transaction_id,
                    status,
                })
            }
            Err(e) if self.settings.allow_local_fallback => {
                tracing::warn!(operation, error = %e, "Ledger write failed, keeping local record");
                Ok(LedgerOutcome::local(e.to_string()))
            }
            Err(e) => {
                tracing::error!(operation, error = %e, "Ledger write failed");
                Err(e)
            }
        }
    }
}

/// Compact JSON memo anchoring an entry. The title is shortened until the
/// serialized memo fits in [`MAX_MESSAGE_BYTES`], so it is always valid JSON.
pub fn entry_memo(entry: &Entry) -> String {
    let mut title = entry.title.as_str();
    loop {
        let memo = serde_json::json!({
            "type": "devchain.entry",
            "entryId": entry.id,
            "userId": entry.user_id,
            "title": title,
            "category": entry.category,
            "date": entry.date,
        })
        .to_string();

        if memo.len() <= MAX_MESSAGE_BYTES || title.is_empty() {
            return memo;
        }
        let over = memo.len() - MAX_MESSAGE_BYTES;
        title = truncate_bytes(title, title.len().saturating_sub(over));
    }
}

fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
