//! Notification backend implementations

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Delivery, EmailMessage, Notifier, NotifyError};

fn http_client(timeout: Duration) -> Result<Client, NotifyError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

// ============================================
// Resend relay
// ============================================

/// Serverless relay in front of Resend
///
/// `POST <function_url>` with `{to_email, subject, message}`; replies
/// `{success: true, id}` or `{success: false, error}`.
pub struct ResendRelay {
    client: Client,
    function_url: String,
}

impl ResendRelay {
    pub fn new(function_url: String, timeout: Duration) -> Result<Self, NotifyError> {
        Ok(Self {
            client: http_client(timeout)?,
            function_url,
        })
    }
}

#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    to_email: &'a str,
    subject: &'a str,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct RelayResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[async_trait]
impl Notifier for ResendRelay {
    fn name(&self) -> &'static str {
        "resend"
    }

    async fn send(&self, message: &EmailMessage) -> Result<Delivery, NotifyError> {
        let body = RelayRequest {
            to_email: &message.to_email,
            subject: &message.subject,
            message: &message.message,
        };

        let response = self.client.post(&self.function_url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        // The relay reports failures in the body, sometimes with a 200
        match serde_json::from_str::<RelayResponse>(&text) {
            Ok(reply) if reply.success && status.is_success() => Ok(Delivery {
                backend: self.name(),
                id: reply.id,
            }),
            Ok(reply) => Err(NotifyError::Rejected {
                backend: self.name(),
                message: reply.error.unwrap_or_else(|| format!("status {}", status)),
            }),
            Err(_) => Err(NotifyError::Api {
                backend: self.name(),
                status: status.as_u16(),
                message: text,
            }),
        }
    }
}

// ============================================
// Web3Forms
// ============================================

/// Web3Forms submit endpoint
pub struct Web3Forms {
    client: Client,
    endpoint: String,
    access_key: String,
    from_name: String,
}

impl Web3Forms {
    pub fn new(
        endpoint: String,
        access_key: String,
        from_name: String,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint,
            access_key,
            from_name,
        })
    }
}

#[derive(Debug, Serialize)]
struct Web3FormsRequest<'a> {
    access_key: &'a str,
    subject: &'a str,
    from_name: &'a str,
    email: &'a str,
    name: &'a str,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct Web3FormsResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

#[async_trait]
impl Notifier for Web3Forms {
    fn name(&self) -> &'static str {
        "web3forms"
    }

    async fn send(&self, message: &EmailMessage) -> Result<Delivery, NotifyError> {
        let body = Web3FormsRequest {
            access_key: &self.access_key,
            subject: &message.subject,
            from_name: &self.from_name,
            email: &message.to_email,
            name: message.to_name.as_deref().unwrap_or(&message.to_email),
            message: &message.message,
        };

        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        match serde_json::from_str::<Web3FormsResponse>(&text) {
            Ok(reply) if reply.success => Ok(Delivery {
                backend: self.name(),
                id: None,
            }),
            Ok(reply) => Err(NotifyError::Rejected {
                backend: self.name(),
                message: reply.message.unwrap_or_else(|| format!("status {}", status)),
            }),
            Err(_) => Err(NotifyError::Api {
                backend: self.name(),
                status: status.as_u16(),
                message: text,
            }),
        }
    }
}

// ============================================
// Formspree
// ============================================

/// Formspree form endpoint
pub struct Formspree {
    client: Client,
    endpoint: String,
}

impl Formspree {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self, NotifyError> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint,
        })
    }
}

#[derive(Debug, Serialize)]
struct FormspreeRequest<'a> {
    email: &'a str,
    #[serde(rename = "_subject")]
    subject: &'a str,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct FormspreeErrors {
    #[serde(default)]
    errors: Vec<FormspreeError>,
}

#[derive(Debug, Deserialize)]
struct FormspreeError {
    message: String,
}

#[async_trait]
impl Notifier for Formspree {
    fn name(&self) -> &'static str {
        "formspree"
    }

    async fn send(&self, message: &EmailMessage) -> Result<Delivery, NotifyError> {
        let body = FormspreeRequest {
            email: &message.to_email,
            subject: &message.subject,
            message: &message.message,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(Delivery {
                backend: self.name(),
                id: None,
            });
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<FormspreeErrors>(&text)
            .ok()
            .map(|e| {
                e.errors
                    .into_iter()
                    .map(|e| e.message)
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .filter(|m| !m.is_empty())
            .unwrap_or(text);

        Err(NotifyError::Api {
            backend: self.name(),
            status: status.as_u16(),
            message,
        })
    }
}

// ============================================
// Disabled
// ============================================

/// Logs messages instead of sending them
pub struct LogOnly;

#[async_trait]
impl Notifier for LogOnly {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, message: &EmailMessage) -> Result<Delivery, NotifyError> {
        tracing::info!(
            to = %message.to_email,
            subject = %message.subject,
            "Email notifications disabled, message not sent"
        );
        Ok(Delivery {
            backend: self.name(),
            id: None,
        })
    }
}
