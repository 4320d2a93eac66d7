//! Facebook Graph API adapters

mod insights;
mod publish;

use crosspost_domain::{AccountCredential, PublishError};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::time::Duration;

use crate::http::{build_client, remote_error, transport_error};

pub const DEFAULT_GRAPH_URL: &str = "https://graph.facebook.com";
pub const DEFAULT_API_VERSION: &str = "v19.0";

/// Graph API client for one configured endpoint and version
pub struct FacebookAdapter {
    client: Client,
    base_url: String,
    api_version: String,
}

impl FacebookAdapter {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::with_base_url(DEFAULT_GRAPH_URL, DEFAULT_API_VERSION, timeout)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        api_version: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_version: api_version.into(),
        })
    }

    /// Look up a page's name, which also proves the token can read it
    pub async fn page_name(&self, credential: &AccountCredential) -> Result<String, PublishError> {
        let url = format!(
            "{}/{}/{}",
            self.base_url, self.api_version, credential.platform_account_id
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("fields", "name"),
                ("access_token", credential.access_token.expose_secret()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(remote_error(status, body));
        }

        match serde_json::from_str::<PageInfo>(&body) {
            Ok(PageInfo { name: Some(name) }) => Ok(name),
            _ => Err(remote_error(status, body)),
        }
    }

    fn endpoint(&self, node: &str, edge: &str) -> String {
        format!("{}/{}/{}/{}", self.base_url, self.api_version, node, edge)
    }

    /// POST a form and return the `id` the Graph API assigned
    async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<String, PublishError> {
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(remote_error(status, body));
        }

        match serde_json::from_str::<GraphId>(&body) {
            Ok(GraphId { id: Some(id) }) if !id.is_empty() => Ok(id),
            _ => Err(remote_error(status, body)),
        }
    }
}

#[derive(Deserialize)]
struct GraphId {
    id: Option<String>,
}

#[derive(Deserialize)]
struct PageInfo {
    name: Option<String>,
}
