use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::error::{ExportError, Result};
use crate::nodes::Node;
use crate::settings::Settings;

const TOKEN_HEADER: &str = "X-Figma-Token";

/// One page's response: the untouched body (for the snapshot) and the parsed root.
#[derive(Debug, Clone)]
pub struct PageDocument {
    pub raw: Value,
    pub root: Node,
}

/// Anything that can produce a page's node tree.
#[async_trait]
pub trait NodeSource: Send + Sync {
    async fn fetch_page(&self, page_id: &str) -> Result<PageDocument>;
}

pub struct FigmaClient {
    http: reqwest::Client,
    api_base: String,
    file: String,
    token: String,
}

impl FigmaClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()?;
        Ok(FigmaClient {
            http,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            file: settings.file.clone(),
            token: settings.token.clone(),
        })
    }

    pub fn nodes_url(&self, page_id: &str) -> String {
        format!("{}/files/{}/nodes?ids={}", self.api_base, self.file, page_id)
    }
}

#[async_trait]
impl NodeSource for FigmaClient {
    async fn fetch_page(&self, page_id: &str) -> Result<PageDocument> {
        let url = self.nodes_url(page_id);
        info!("Requesting data from Figma: {}", url);

        let response = self
            .http
            .get(&url)
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ExportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let raw: Value = serde_json::from_str(&body)?;
        info!("Request for page {} successful ({} bytes)", page_id, body.len());
        document_from_response(raw, page_id)
    }
}

/// Page ids are copied from Figma URLs with `-`; the response keys them with `:`.
pub fn node_key(page_id: &str) -> String {
    page_id.replace('-', ":")
}

/// Pull `nodes[<key>].document` out of a nodes response.
pub fn document_from_response(raw: Value, page_id: &str) -> Result<PageDocument> {
    let key = node_key(page_id);
    let document = raw
        .get("nodes")
        .and_then(|nodes| nodes.get(&key))
        .and_then(|entry| entry.get("document"))
        .filter(|doc| !doc.is_null())
        .cloned()
        .ok_or_else(|| ExportError::MissingDocument { key: key.clone() })?;
    let root: Node = serde_json::from_value(document)?;
    Ok(PageDocument { raw, root })
}
