//! Email Notifications
//!
//! One [`Notifier`] is chosen by configuration:
//!
//! - **ResendRelay**: serverless function in front of the Resend API
//! - **Web3Forms**: Web3Forms submit endpoint
//! - **Formspree**: Formspree form endpoint
//! - **LogOnly**: notifications disabled; messages are logged
//!
//! There is no failover between backends.

mod backends;
pub mod templates;

pub use backends::{Formspree, LogOnly, ResendRelay, Web3Forms};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::NotificationsConfig;

/// An outbound email
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailMessage {
    pub to_email: String,
    #[serde(default)]
    pub to_name: Option<String>,
    pub subject: String,
    pub message: String,
}

/// Confirmation from a backend
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Delivery {
    pub backend: &'static str,
    /// Provider message id, when the provider returns one
    pub id: Option<String>,
}

/// A notification backend
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, message: &EmailMessage) -> Result<Delivery, NotifyError>;
}

/// Errors from notification backends
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{backend} returned {status}: {message}")]
    Api {
        backend: &'static str,
        status: u16,
        message: String,
    },

    #[error("{backend} rejected the message: {message}")]
    Rejected {
        backend: &'static str,
        message: String,
    },

    #[error("Notifier not configured: {0}")]
    NotConfigured(String),
}

/// Build the backend named in configuration
pub fn build_notifier(config: &NotificationsConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    let timeout = Duration::from_secs(config.request_timeout_secs);

    let notifier: Arc<dyn Notifier> = match config.backend.to_lowercase().as_str() {
        "resend" => {
            let url = config
                .resend_function_url
                .clone()
                .ok_or_else(|| NotifyError::NotConfigured("resend_function_url".to_string()))?;
            Arc::new(ResendRelay::new(url, timeout)?)
        }
        "web3forms" => {
            let key = config
                .web3forms_access_key
                .clone()
                .ok_or_else(|| NotifyError::NotConfigured("web3forms_access_key".to_string()))?;
            Arc::new(Web3Forms::new(
                "https://api.web3forms.com/submit".to_string(),
                key,
                config.from_name.clone(),
                timeout,
            )?)
        }
        "formspree" => {
            let form_id = config
                .formspree_form_id
                .clone()
                .ok_or_else(|| NotifyError::NotConfigured("formspree_form_id".to_string()))?;
            Arc::new(Formspree::new(
                format!("https://formspree.io/f/{}", form_id),
                timeout,
            )?)
        }
        "none" | "log" => Arc::new(LogOnly),
        other => {
            return Err(NotifyError::NotConfigured(format!(
                "unknown backend '{}'. Use resend, web3forms, formspree or none",
                other
            )))
        }
    };

    tracing::info!(backend = notifier.name(), "Notification backend ready");
    Ok(notifier)
}
