//! Hedera gateway client
//!
//! Writes (topic messages, contract deploy/execute) go through an HTTP
//! gateway that holds the operator key and signs transactions. Reads go to
//! the public Mirror Node REST API.
//!
//! Gateway endpoints:
//! - `POST {gateway}/topics/{topic_id}/messages` - `{message}` → `{transactionId, status}`
//! - `POST {gateway}/contracts` - `{bytecode, gas}` → `{contractId, fileId, transactionId}`
//! - `POST {gateway}/contracts/{id}/execute` - `{function, params, gas}` → `{transactionId, status}`
//! - `POST {gateway}/contracts/{id}/call` - `{function, params, gas}` → `{result}`
//!
//! Mirror node endpoints:
//! - `GET {mirror}/api/v1/transactions/{id}`
//! - `GET {mirror}/api/v1/balances?account.id={id}`

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::backend::{
    AccountBalance, ContractCall, ContractDeployment, LedgerBackend, LedgerError, LedgerReceipt,
    TransactionStatus,
};

/// Connection settings for [`HederaGateway`]
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the signing gateway
    pub gateway_url: String,
    /// Base URL of the mirror node (e.g. "https://testnet.mirrornode.hedera.com")
    pub mirror_url: String,
    /// Operator account the gateway pays fees from
    pub operator_id: Option<String>,
    /// Bearer token for the gateway
    pub api_key: Option<String>,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            gateway_url: "http://localhost:7546".to_string(),
            mirror_url: "https://testnet.mirrornode.hedera.com".to_string(),
            operator_id: None,
            api_key: None,
            request_timeout_ms: 10_000,
        }
    }
}

/// HTTP implementation of [`LedgerBackend`]
pub struct HederaGateway {
    client: Client,
    config: GatewayConfig,
}

impl HederaGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, LedgerError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(concat!("DevChain/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn gateway_url(&self, path: &str) -> String {
        format!("{}{}", self.config.gateway_url.trim_end_matches('/'), path)
    }

    fn mirror_url(&self, path: &str) -> String {
        format!("{}{}", self.config.mirror_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        };
        match &self.config.operator_id {
            Some(operator) => request.header("X-Operator-Id", operator),
            None => request,
        }
    }

    async fn post_gateway<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, LedgerError> {
        let request = self.authorize(self.client.post(self.gateway_url(path)).json(body));
        let response = request.send().await.map_err(LedgerError::from_transport)?;
        decode(response).await
    }

    async fn get_mirror<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, LedgerError> {
        let response = self
            .client
            .get(self.mirror_url(path))
            .send()
            .await
            .map_err(LedgerError::from_transport)?;
        decode(response).await
    }
}

async fn decode<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, LedgerError> {
    let status = response.status();
    if status.is_success() {
        response
            .json::<T>()
            .await
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()))
    } else {
        let message = response.text().await.unwrap_or_default();
        Err(LedgerError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// SDK form `0.0.123@1700000000.000000001` to mirror form `0.0.123-1700000000-000000001`
pub fn mirror_transaction_id(transaction_id: &str) -> String {
    match transaction_id.split_once('@') {
        Some((account, valid_start)) => {
            format!("{}-{}", account, valid_start.replacen('.', "-", 1))
        }
        None => transaction_id.to_string(),
    }
}

#[async_trait]
impl LedgerBackend for HederaGateway {
    async fn submit_message(
        &self,
        topic_id: &str,
        message: &str,
    ) -> Result<LedgerReceipt, LedgerError> {
        let body = SubmitMessageRequest { message };
        self.post_gateway(&format!("/topics/{}/messages", topic_id), &body)
            .await
    }

    async fn execute_contract(&self, call: &ContractCall) -> Result<LedgerReceipt, LedgerError> {
        let body = ContractCallRequest::from(call);
        self.post_gateway(&format!("/contracts/{}/execute", call.contract_id), &body)
            .await
    }

    async fn deploy_contract(
        &self,
        bytecode: &str,
        gas: u64,
    ) -> Result<ContractDeployment, LedgerError> {
        let body = DeployRequest { bytecode, gas };
        self.post_gateway("/contracts", &body).await
    }

    async fn query_contract(&self, call: &ContractCall) -> Result<serde_json::Value, LedgerError> {
        let body = ContractCallRequest::from(call);
        let response: QueryResponse = self
            .post_gateway(&format!("/contracts/{}/call", call.contract_id), &body)
            .await?;
        Ok(response.result)
    }

    async fn transaction_status(
        &self,
        transaction_id: &str,
    ) -> Result<TransactionStatus, LedgerError> {
        let path = format!(
            "/api/v1/transactions/{}",
            mirror_transaction_id(transaction_id)
        );
        let response: MirrorTransactions = match self.get_mirror(&path).await {
            Err(LedgerError::Api { status: 404, .. }) => {
                return Err(LedgerError::NotFound(transaction_id.to_string()))
            }
            other => other?,
        };

        let tx = response
            .transactions
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::NotFound(transaction_id.to_string()))?;

        Ok(TransactionStatus {
            transaction_id: transaction_id.to_string(),
            result: tx.result,
            consensus_timestamp: tx.consensus_timestamp,
        })
    }

    async fn account_balance(&self, account_id: &str) -> Result<AccountBalance, LedgerError> {
        let path = format!("/api/v1/balances?account.id={}", account_id);
        let response: MirrorBalances = self.get_mirror(&path).await?;

        let entry = response
            .balances
            .into_iter()
            .find(|b| b.account == account_id)
            .ok_or_else(|| LedgerError::NotFound(account_id.to_string()))?;

        Ok(AccountBalance {
            account_id: entry.account,
            tinybars: entry.balance,
        })
    }
}

// ============================================
// Request/Response DTOs
// ============================================

#[derive(Debug, Serialize)]
struct SubmitMessageRequest<'a> {
    message: &'a str,
}

#[derive(Debug, Serialize)]
struct DeployRequest<'a> {
    bytecode: &'a str,
    gas: u64,
}

#[derive(Debug, Serialize)]
struct ContractCallRequest<'a> {
    function: &'a str,
    params: &'a [serde_json::Value],
    gas: u64,
}

impl<'a> From<&'a ContractCall> for ContractCallRequest<'a> {
    fn from(call: &'a ContractCall) -> Self {
        Self {
            function: &call.function,
            params: &call.params,
            gas: call.gas,
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct MirrorTransactions {
    #[serde(default)]
    transactions: Vec<MirrorTransaction>,
}

#[derive(Debug, Deserialize)]
struct MirrorTransaction {
    result: String,
    #[serde(default)]
    consensus_timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MirrorBalances {
    #[serde(default)]
    balances: Vec<MirrorBalance>,
}

#[derive(Debug, Deserialize)]
struct MirrorBalance {
    account: String,
    balance: i64,
}
