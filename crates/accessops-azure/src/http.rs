//! Request plumbing shared by the three REST clients.

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::trace;

use crate::auth::Credential;
use crate::{AzureError, Result};

/// List envelope used by ARM (`nextLink`), Graph (`@odata.nextLink`) and DevOps (`count`)
#[derive(Debug, serde::Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "nextLink", default)]
    next_link: Option<String>,
    #[serde(rename = "@odata.nextLink", default)]
    odata_next_link: Option<String>,
}

pub(crate) struct RestClient {
    http: reqwest::Client,
    base_url: String,
    credential: Credential,
}

impl RestClient {
    pub fn new(http: reqwest::Client, base_url: &str, credential: Credential) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credential,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path starting with `/`
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn request(&self, method: Method, url: &str) -> Result<reqwest::RequestBuilder> {
        let header = self.credential.header().await?;
        let req = self.http.request(method, url);
        Ok(header.apply(req).header("Accept", "application/json"))
    }

    async fn send(&self, req: reqwest::RequestBuilder, url: &str) -> Result<reqwest::Response> {
        req.send().await.map_err(|source| AzureError::Transport {
            url: url.to_string(),
            source,
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        let req = self.request(Method::GET, url).await?.query(query);
        let resp = self.send(req, url).await?;
        decode(url, handle_response(url, resp).await?)
    }

    /// GET that maps 404 to `None`
    pub async fn get_optional<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>> {
        let req = self.request(Method::GET, url).await?.query(query);
        let resp = self.send(req, url).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            trace!(url, "Not found");
            return Ok(None);
        }
        decode(url, handle_response(url, resp).await?).map(Some)
    }

    /// GET a list, following continuation links until exhausted
    pub async fn list<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page: Page<T> = self.get(url, query).await?;
        loop {
            items.append(&mut page.value);
            match page.next_link.take().or(page.odata_next_link.take()) {
                Some(next) => {
                    trace!(next = %next, "Following next link");
                    page = self.get(&next, &[]).await?;
                }
                None => break,
            }
        }
        Ok(items)
    }

    /// Send a JSON body; an empty response decodes from `null`
    pub async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: &B,
    ) -> Result<T> {
        let req = self
            .request(method, url)
            .await?
            .query(query)
            .header("Content-Type", "application/json")
            .json(body);
        let resp = self.send(req, url).await?;
        decode(url, handle_response(url, resp).await?)
    }
}

fn decode<T: DeserializeOwned>(url: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| AzureError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}

pub(crate) async fn handle_response(url: &str, resp: reqwest::Response) -> Result<Value> {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();

    if !status.is_success() {
        let (code, message) = error_details(&body);
        return Err(AzureError::Api {
            status: status.as_u16(),
            url: url.to_string(),
            code,
            message,
        });
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&body).map_err(|e| AzureError::Decode {
        url: url.to_string(),
        message: format!("invalid JSON: {e}"),
    })
}

/// Code and message from an ARM/Graph `error` envelope or a DevOps exception body
fn error_details(body: &str) -> (String, String) {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(err) = json.get("error") {
            let code = err.get("code").and_then(|v| v.as_str()).unwrap_or("Unknown");
            let message = err.get("message").and_then(|v| v.as_str()).unwrap_or("");
            return (code.to_string(), message.to_string());
        }
        if let Some(message) = json.get("message").and_then(|v| v.as_str()) {
            let code = json
                .get("typeKey")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown");
            return (code.to_string(), message.to_string());
        }
    }
    ("Unknown".to_string(), body.to_string())
}

/// Quote a value for an OData `$filter` literal
pub(crate) fn odata_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
