//! NBRB exchange rate client.

use chrono::{DateTime, Local};
use serde::Deserialize;
use tracing::{debug, warn};

const NBRB_API_URL: &str = "https://api.nbrb.by/exrates/rates";

const FETCH_TIMEOUT_SECS: u64 = 10;

/// One official rate as published by the NBRB API.
///
/// `Cur_Abbreviation` and `Cur_Scale` are optional in older payload shapes,
/// so both fall back to sensible defaults.
#[derive(Deserialize, Debug, Clone)]
pub struct RateSnapshot {
    #[serde(rename = "Cur_Abbreviation", default)]
    pub abbreviation: Option<String>,
    #[serde(rename = "Cur_Scale", default = "default_scale")]
    pub scale: u32,
    #[serde(rename = "Cur_OfficialRate")]
    pub official_rate: f64,
}

fn default_scale() -> u32 {
    1
}

/// The endpoint returns a single object for one currency and an array for
/// the full table.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum RatePayload {
    One(RateSnapshot),
    Many(Vec<RateSnapshot>),
}

pub struct RateClient {
    client: reqwest::Client,
    base_url: String,
}

impl RateClient {
    pub fn new() -> Self {
        Self::with_base_url(NBRB_API_URL.to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self { client, base_url }
    }

    /// Fetch the official rate for one currency code.
    pub async fn fetch(&self, code: &str) -> Result<RateSnapshot, String> {
        let url = format!("{}/{}?parammode=2", self.base_url, code);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("HTTP error: {e}"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| format!("Failed to read response: {e}"))?;

        debug!("NBRB response status: {status}");

        if !status.is_success() {
            return Err(format!("API error {status}"));
        }

        let payload: RatePayload =
            serde_json::from_str(&body).map_err(|e| format!("Failed to parse response: {e}"))?;

        match payload {
            RatePayload::One(snapshot) => Ok(snapshot),
            RatePayload::Many(list) => list
                .into_iter()
                .find(|s| s.abbreviation.as_deref() == Some(code))
                .ok_or_else(|| format!("no rate for {code} in response")),
        }
    }

    /// Build the user-facing rates text for the given currency codes.
    ///
    /// Never fails: a fetch error for a code becomes an inline ⚠️ line
    /// instead of propagating to the caller.
    pub async fn rate_message(&self, codes: &[String]) -> String {
        let now = Local::now();
        let mut blocks = Vec::with_capacity(codes.len());

        for code in codes {
            match self.fetch(code).await {
                Ok(snapshot) => blocks.push(format_snapshot(code, &snapshot, now)),
                Err(e) => {
                    warn!("Rate fetch failed for {code}: {e}");
                    blocks.push(format!("⚠️ {code}: {e}"));
                }
            }
        }

        blocks.join("\n\n")
    }
}

fn format_snapshot(requested: &str, snapshot: &RateSnapshot, now: DateTime<Local>) -> String {
    let code = snapshot.abbreviation.as_deref().unwrap_or(requested);
    format!(
        "{flag} NBRB {code} exchange rate\nas of {stamp}:\n\n{scale} {code} = {rate:.4} BYN",
        flag = currency_flag(code),
        stamp = now.format("%d.%m.%Y %H:%M"),
        scale = snapshot.scale,
        rate = snapshot.official_rate,
    )
}

fn currency_flag(code: &str) -> &'static str {
    match code {
        "USD" => "🇺🇸",
        "EUR" => "🇪🇺",
        "RUB" => "🇷🇺",
        "CNY" => "🇨🇳",
        "PLN" => "🇵🇱",
        _ => "💱",
    }
}
