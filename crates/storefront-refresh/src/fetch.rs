//! Fetch primitive: pulls one product category from the upstream API and
//! replaces its records.
//!
//! ```text
//! GET {base}/products/{key}                 → [{ id, manufacturer, .. }, ..]
//! GET {base}/availability/{manufacturer}    → { "response": [{ id, DATAPAYLOAD }, ..] }
//!   ↓ merge availability by id (case-insensitive)
//! RecordStore::replace_all(key, records)
//!   ↓
//! PUBLISH products:refreshed key            (when a publisher is configured)
//! ```

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use storefront_cache::RefreshPublisher;
use storefront_storage::{DynRecordStore, ProductKey, ProductRecordSet, RecordStoreError};

const IN_STOCK_OPEN: &str = "<INSTOCKVALUE>";
const IN_STOCK_CLOSE: &str = "</INSTOCKVALUE>";

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid upstream base url {url}: {message}")]
    BaseUrl { url: String, message: String },
    #[error("upstream returned {status} for {url}")]
    Status { status: u16, url: String },
    #[error("unexpected upstream payload from {url}: {message}")]
    Payload { url: String, message: String },
    #[error(transparent)]
    Store(#[from] RecordStoreError),
}

/// Refreshes the stored records of one product key.
#[async_trait]
pub trait ProductFetcher: Send + Sync {
    async fn fetch(&self, key: &ProductKey) -> Result<(), FetchError>;
}

#[derive(Debug, Deserialize)]
struct AvailabilityEnvelope {
    response: Value,
}

#[derive(Debug, Deserialize)]
struct AvailabilityEntry {
    id: String,
    #[serde(rename = "DATAPAYLOAD", default)]
    payload: String,
}

pub struct HttpProductFetcher {
    http: reqwest::Client,
    base_url: Url,
    records: DynRecordStore,
    publisher: Option<RefreshPublisher>,
}

impl HttpProductFetcher {
    pub fn new(
        base_url: &str,
        request_timeout: Duration,
        records: DynRecordStore,
    ) -> Result<Self, FetchError> {
        let invalid = |message: String| FetchError::BaseUrl {
            url: base_url.to_string(),
            message,
        };
        let parsed = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(invalid("not a hierarchical url".into()));
        }

        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            base_url: parsed,
            records,
            publisher: None,
        })
    }

    pub fn with_publisher(mut self, publisher: RefreshPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Appends `segments` to the base path, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| FetchError::BaseUrl {
                url: self.base_url.to_string(),
                message: "not a hierarchical url".into(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json(&self, url: Url) -> Result<Value, FetchError> {
        let resp = self.http.get(url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(resp.json().await?)
    }

    async fn fetch_products(&self, key: &ProductKey) -> Result<Vec<Value>, FetchError> {
        let url = self.endpoint(&["products", key.as_str()])?;
        match self.get_json(url.clone()).await? {
            Value::Array(items) => Ok(items),
            other => Err(FetchError::Payload {
                url: url.to_string(),
                message: format!("expected a JSON array, got {}", type_name(&other)),
            }),
        }
    }

    /// Availability for one manufacturer, keyed by lowercased product id.
    async fn fetch_availability(
        &self,
        manufacturer: &str,
    ) -> Result<HashMap<String, String>, FetchError> {
        let url = self.endpoint(&["availability", manufacturer])?;
        let body = self.get_json(url.clone()).await?;
        let envelope: AvailabilityEnvelope =
            serde_json::from_value(body).map_err(|e| FetchError::Payload {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        // The upstream reports failures as a non-array `response`
        let entries: Vec<AvailabilityEntry> =
            serde_json::from_value(envelope.response).map_err(|e| FetchError::Payload {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        Ok(entries
            .into_iter()
            .map(|entry| (entry.id.to_lowercase(), parse_in_stock(&entry.payload)))
            .collect())
    }
}

#[async_trait]
impl ProductFetcher for HttpProductFetcher {
    async fn fetch(&self, key: &ProductKey) -> Result<(), FetchError> {
        let mut products = self.fetch_products(key).await?;

        let manufacturers: BTreeSet<String> = products
            .iter()
            .filter_map(|p| p.get("manufacturer").and_then(Value::as_str))
            .map(str::to_string)
            .collect();

        let mut availability = HashMap::new();
        for manufacturer in &manufacturers {
            match self.fetch_availability(manufacturer).await {
                Ok(entries) => availability.extend(entries),
                Err(e) => {
                    tracing::warn!(key = %key, manufacturer = %manufacturer, error = %e, "availability fetch failed");
                }
            }
        }

        let merged = merge_availability(&mut products, &availability);
        tracing::debug!(
            key = %key,
            products = products.len(),
            manufacturers = manufacturers.len(),
            with_availability = merged,
            "upstream data merged"
        );

        let records = ProductRecordSet::new(products);
        self.records.replace_all(key, &records).await?;
        tracing::info!(key = %key, rows = records.len(), "product records replaced");

        if let Some(publisher) = &self.publisher {
            if let Err(e) = publisher.publish(key).await {
                tracing::warn!(key = %key, error = %e, "refresh notification failed");
            }
        }
        Ok(())
    }
}

/// Sets `availability` on every product with a matching id. Returns how many
/// products matched.
fn merge_availability(products: &mut [Value], availability: &HashMap<String, String>) -> usize {
    let mut merged = 0;
    for product in products.iter_mut() {
        let Some(id) = product.get("id").and_then(Value::as_str) else {
            continue;
        };
        let Some(value) = availability.get(&id.to_lowercase()) else {
            continue;
        };
        if let Value::Object(fields) = product {
            fields.insert("availability".to_string(), Value::String(value.clone()));
            merged += 1;
        }
    }
    merged
}

/// Extracts the `<INSTOCKVALUE>` text, or the trimmed payload if the tag is absent.
fn parse_in_stock(payload: &str) -> String {
    let Some(start) = payload.find(IN_STOCK_OPEN) else {
        return payload.trim().to_string();
    };
    let rest = &payload[start + IN_STOCK_OPEN.len()..];
    match rest.find(IN_STOCK_CLOSE) {
        Some(end) => rest[..end].trim().to_string(),
        None => payload.trim().to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
