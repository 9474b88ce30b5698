//! Tessie API client. Publishes the tariff document to a Powerwall energy site.

use crate::settings::TessieCredentials;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tou_engine::error::{Result, ScheduleError};
use tou_engine::Publisher;
use tracing::debug;

pub const TESSIE_API_BASE: &str = "https://api.tessie.com/api/1";

/// Sends time-of-use settings for one energy site.
pub struct TessieClient {
    client: Client,
    base_url: String,
    api_key: String,
    site_id: String,
}

impl TessieClient {
    pub fn new(client: Client, base_url: impl Into<String>, credentials: &TessieCredentials) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: credentials.api_key.clone(),
            site_id: credentials.site_id.clone(),
        }
    }

    /// The time-of-use settings endpoint for the configured site.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/energy_sites/{}/time_of_use_settings",
            self.base_url.trim_end_matches('/'),
            self.site_id
        )
    }
}

impl Publisher for TessieClient {
    fn publish(&self, payload: &str) -> Result<()> {
        let url = self.endpoint();
        debug!(%url, bytes = payload.len(), "posting time-of-use settings");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_string())
            .send()
            .map_err(|e| ScheduleError::Publish(format!("Tessie request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let reason = response.text().unwrap_or_default();
            Err(ScheduleError::Publish(format!(
                "Tessie returned HTTP {}: {}",
                status,
                reason.trim()
            )))
        }
    }
}

#[derive(Deserialize)]
struct ProductsResponse {
    response: Vec<Product>,
}

#[derive(Deserialize)]
struct Product {
    #[serde(default)]
    energy_site_id: Option<u64>,
    #[serde(default)]
    site_name: Option<String>,
}

/// An energy site on the Tessie account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnergySite {
    pub id: u64,
    pub name: Option<String>,
}

/// Energy sites from a `/products` response. Vehicles are skipped.
pub fn parse_energy_sites(body: &str) -> Result<Vec<EnergySite>> {
    let products: ProductsResponse = serde_json::from_str(body)
        .map_err(|e| ScheduleError::Parse(format!("Tessie products response: {}", e)))?;
    Ok(products
        .response
        .into_iter()
        .filter_map(|product| {
            product.energy_site_id.map(|id| EnergySite {
                id,
                name: product.site_name,
            })
        })
        .collect())
}

/// List the energy sites visible to `api_key`.
///
/// # Errors
/// Returns `ScheduleError::Fetch` on request failure or a non-success status.
pub fn list_energy_sites(client: &Client, base_url: &str, api_key: &str) -> Result<Vec<EnergySite>> {
    let url = format!("{}/products", base_url.trim_end_matches('/'));
    let response = client
        .get(&url)
        .bearer_auth(api_key)
        .send()
        .map_err(|e| ScheduleError::Fetch(format!("Tessie products: {}", e)))?;
    if !response.status().is_success() {
        return Err(ScheduleError::Fetch(format!(
            "Tessie products: HTTP {}",
            response.status()
        )));
    }
    let body = response
        .text()
        .map_err(|e| ScheduleError::Fetch(format!("Tessie products: {}", e)))?;
    parse_energy_sites(&body)
}
