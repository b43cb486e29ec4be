use anyhow::Context;
use async_trait::async_trait;

use super::{NotificationProvider, TemplateKind};

/// Posts templated notifications to an HTTP mail API. The API resolves the
/// user id to an address and renders the template server-side.
pub struct HttpEmailProvider {
    api_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpEmailProvider {
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            api_url,
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NotificationProvider for HttpEmailProvider {
    async fn notify(
        &self,
        user_id: &str,
        kind: TemplateKind,
        context: &serde_json::Value,
    ) -> anyhow::Result<()> {
        self.client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "user_id": user_id,
                "template": kind.as_str(),
                "context": context,
            }))
            .send()
            .await
            .context("failed to send notification")?
            .error_for_status()
            .context("notification API returned error")?;

        Ok(())
    }
}
