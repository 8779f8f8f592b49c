use std::collections::HashMap;

use anyhow::{bail, Result};
use reqwest::Client;
use serde_json::Value;

/// Thin client for the execution core's single invocation route (§4.1, §6:
/// `/invoke/{function_ref}[/*]`). Adapted from the teacher's `LambdaClient`,
/// reduced from its full Lambda-compatible management API (create/update/
/// publish/alias/concurrency) to the one route this core actually exposes —
/// the rest is out of scope (§C: "admin UI/CLI/REST CRUD surfaces").
pub struct InvokeClient {
    client: Client,
    base_url: String,
}

pub struct InvokeResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl InvokeResponse {
    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl InvokeClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    pub async fn invoke(
        &self,
        function_ref: &str,
        tail_path: &str,
        method: &str,
        headers: &[(&str, &str)],
        body: Vec<u8>,
    ) -> Result<InvokeResponse> {
        self.invoke_with_query(function_ref, tail_path, "", method, headers, body).await
    }

    pub async fn invoke_with_query(
        &self,
        function_ref: &str,
        tail_path: &str,
        query: &str,
        method: &str,
        headers: &[(&str, &str)],
        body: Vec<u8>,
    ) -> Result<InvokeResponse> {
        let url = if query.is_empty() {
            format!("{}/invoke/{}{}", self.base_url, function_ref, tail_path)
        } else {
            format!("{}/invoke/{}{}?{}", self.base_url, function_ref, tail_path, query)
        };
        let method: reqwest::Method = method.parse()?;

        let mut request = self.client.request(method, &url).body(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let response_headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(InvokeResponse {
            status,
            headers: response_headers,
            body,
        })
    }

    pub async fn health(&self) -> Result<bool> {
        let response = self.client.get(format!("{}/healthz", self.base_url)).send().await?;
        Ok(response.status().is_success())
    }

    pub async fn metrics(&self) -> Result<String> {
        let response = self.client.get(format!("{}/metrics", self.base_url)).send().await?;
        if !response.status().is_success() {
            bail!("metrics endpoint returned {}", response.status());
        }
        Ok(response.text().await?)
    }
}
