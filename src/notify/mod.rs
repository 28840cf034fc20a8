//! Notification dispatch
//!
//! Sends the report's plain-text notification body to a webhook. Email
//! formatting is left to the receiving end; this module only delivers
//! text. Delivery failure is a warning for the caller, never fatal.

use anyhow::{bail, Result};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

/// Build the webhook payload for a notification body.
fn build_payload(text: &str) -> serde_json::Value {
    json!({ "text": text })
}

/// POST the notification body to a webhook URL.
pub fn dispatch_webhook(url: &str, text: &str) -> Result<()> {
    debug!("dispatching webhook notification to {}", url);

    let agent = ureq::config::Config::builder()
        .http_status_as_error(false)
        .timeout_global(Some(Duration::from_secs(15)))
        .build()
        .new_agent();

    let response = agent
        .post(url)
        .header("Content-Type", "application/json")
        .send_json(&build_payload(text))?;

    let status = response.status().as_u16();
    if status >= 400 {
        bail!("webhook returned status {}", status);
    }

    info!("webhook notification delivered");
    Ok(())
}
