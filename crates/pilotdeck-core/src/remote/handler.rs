//! Section handler for plain JSON endpoints.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::repository::PayloadRepository;
use crate::character::CharacterId;
use crate::registry::{AuthContext, SectionHandler};
use crate::section::Section;
use crate::{Error, Result};

/// Path of a section's endpoint below `characters/{id}/`.
#[must_use]
pub const fn endpoint_path(section: Section) -> &'static str {
    match section {
        Section::IndustryJobs => "industry/jobs",
        Section::JumpClones => "clones",
        Section::MailLabels => "mail/labels",
        Section::MailLists => "mail/lists",
        Section::Mails => "mail",
        Section::WalletBalance => "wallet",
        Section::WalletJournal => "wallet/journal",
        Section::WalletTransactions => "wallet/transactions",
        other => other.as_str(),
    }
}

/// Fetches a section with one authenticated GET and stores the body as is.
pub struct JsonSection {
    section: Section,
    base_url: Url,
    client: Client,
    payloads: Arc<PayloadRepository>,
}

impl JsonSection {
    /// Creates a handler for `section` below the API root `base_url`.
    #[must_use]
    pub fn new(section: Section, base_url: &Url, client: Client, payloads: Arc<PayloadRepository>) -> Self {
        let mut base_url = base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            section,
            base_url,
            client,
            payloads,
        }
    }

    /// Endpoint URL of the section for a character.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be built.
    pub fn endpoint(&self, character_id: CharacterId) -> Result<Url> {
        let path = format!("characters/{character_id}/{}/", endpoint_path(self.section));
        Ok(self.base_url.join(&path)?)
    }
}

#[async_trait]
impl SectionHandler for JsonSection {
    async fn fetch(&self, auth: &AuthContext) -> Result<Value> {
        let url = self.endpoint(auth.character_id)?;
        debug!(section = %self.section, %url, "Fetching section");

        let response = self
            .client
            .get(url)
            .bearer_auth(&auth.access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.is_empty() {
                status.canonical_reason().unwrap_or_default().to_string()
            } else {
                body
            };
            return Err(Error::Remote {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    async fn persist(&self, character_id: CharacterId, payload: &Value) -> Result<()> {
        self.payloads.put(character_id, self.section, payload).await
    }

    async fn remove(&self, character_id: CharacterId) -> Result<()> {
        self.payloads.delete(character_id, self.section).await
    }
}
