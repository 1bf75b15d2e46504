//! Ledger backend contract
//!
//! [`LedgerBackend`] is the seam between the tracker and the Hedera network.
//! The production implementation is [`super::HederaGateway`]; tests plug in
//! their own.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Receipt for a transaction the network accepted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerReceipt {
    pub transaction_id: String,
    pub status: String,
}

/// A smart-contract function invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContractCall {
    pub contract_id: String,
    pub function: String,
    #[serde(default)]
    pub params: Vec<serde_json::Value>,
    pub gas: u64,
}

/// Result of deploying contract bytecode
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContractDeployment {
    pub contract_id: String,
    #[serde(default)]
    pub file_id: Option<String>,
    pub transaction_id: String,
}

/// Consensus state of a transaction as reported by the mirror node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatus {
    pub transaction_id: String,
    /// Mirror node result code, e.g. `SUCCESS`
    pub result: String,
    #[serde(default)]
    pub consensus_timestamp: Option<String>,
}

impl TransactionStatus {
    pub fn is_success(&self) -> bool {
        self.result == "SUCCESS"
    }
}

/// Account balance in tinybars
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    pub account_id: String,
    pub tinybars: i64,
}

/// Operations the tracker needs from the ledger
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    /// Submit a consensus-service message to a topic
    async fn submit_message(&self, topic_id: &str, message: &str)
        -> Result<LedgerReceipt, LedgerError>;

    /// Execute a state-changing contract function
    async fn execute_contract(&self, call: &ContractCall) -> Result<LedgerReceipt, LedgerError>;

    /// Upload bytecode and create a contract instance
    async fn deploy_contract(
        &self,
        bytecode: &str,
        gas: u64,
    ) -> Result<ContractDeployment, LedgerError>;

    /// Read-only contract call
    async fn query_contract(&self, call: &ContractCall) -> Result<serde_json::Value, LedgerError>;

    /// Look up a transaction on the mirror node
    async fn transaction_status(&self, transaction_id: &str)
        -> Result<TransactionStatus, LedgerError>;

    /// Look up an account balance on the mirror node
    async fn account_balance(&self, account_id: &str) -> Result<AccountBalance, LedgerError>;
}

/// Errors from the ledger layer
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Ledger unavailable")]
    Unavailable,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Ledger API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Request timeout")]
    Timeout,

    #[error("Ledger not configured: {0}")]
    NotConfigured(String),

    #[error("Transaction not found: {0}")]
    NotFound(String),

    #[error("Transaction {0} was never submitted to the ledger")]
    LocalTransaction(String),

    #[error("Unexpected ledger response: {0}")]
    InvalidResponse(String),
}

impl LedgerError {
    /// Classify a transport error the same way everywhere
    pub(crate) fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LedgerError::Timeout
        } else if e.is_connect() {
            LedgerError::Unavailable
        } else {
            LedgerError::Request(e)
        }
    }
}
