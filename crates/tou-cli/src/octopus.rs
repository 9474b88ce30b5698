//! Octopus Energy GraphQL client.
//!
//! Every call is a `POST` of `{query, variables}` to a single endpoint. A Kraken
//! token is obtained from the account API key first and sent as the bare
//! `Authorization` header on later calls.
//!
//! Response parsing is kept in free functions so it can be tested against
//! captured payloads without a network.

use crate::settings::OctopusCredentials;
use chrono::DateTime;
use chrono_tz::Tz;
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tou_engine::error::{Result, ScheduleError};
use tou_engine::interval::parse_timestamp;
use tou_engine::{RawInterval, SavingsSession};
use tracing::debug;

pub const OCTOPUS_GRAPHQL_URL: &str = "https://api.octopus.energy/v1/graphql/";

const TOKEN_MUTATION: &str = "mutation krakenTokenAuthentication($api: String!) {
  obtainKrakenToken(input: {APIKey: $api}) {
    token
  }
}";

const DISPATCHES_QUERY: &str = "query getData($input: String!) {
  plannedDispatches(accountNumber: $input) {
    startDt
    endDt
  }
}";

const SAVING_SESSIONS_QUERY: &str = "query savingSessions($account: String!) {
  savingSessions {
    account(accountNumber: $account) {
      hasJoinedCampaign
    }
    events {
      id
      code
      startAt
      endAt
      rewardPerKwhInOctoPoints
    }
  }
}";

// ── Wire types ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphQlRequest<'a, V: Serialize> {
    query: &'a str,
    variables: V,
    #[serde(skip_serializing_if = "Option::is_none")]
    operation_name: Option<&'a str>,
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenData {
    obtain_kraken_token: TokenPayload,
}

#[derive(Deserialize)]
struct TokenPayload {
    token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DispatchData {
    planned_dispatches: Vec<RawInterval>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SavingSessionsData {
    saving_sessions: SavingSessions,
}

#[derive(Deserialize)]
struct SavingSessions {
    #[serde(default)]
    events: Vec<SavingEvent>,
}

/// A savings session as advertised by Octopus.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingEvent {
    #[serde(default)]
    pub code: Option<String>,
    pub start_at: String,
    pub end_at: String,
    pub reward_per_kwh_in_octo_points: f64,
}

// ── Parsing ─────────────────────────────────────────────────────────────────

fn parse_response<T: DeserializeOwned>(body: &str, what: &str) -> Result<T> {
    let response: GraphQlResponse<T> = serde_json::from_str(body)
        .map_err(|e| ScheduleError::Parse(format!("{} response: {}", what, e)))?;
    if !response.errors.is_empty() {
        let messages: Vec<&str> = response.errors.iter().map(|e| e.message.as_str()).collect();
        return Err(ScheduleError::Fetch(format!(
            "{} rejected: {}",
            what,
            messages.join("; ")
        )));
    }
    response
        .data
        .ok_or_else(|| ScheduleError::Parse(format!("{} response has no data", what)))
}

/// Token from an `obtainKrakenToken` response.
pub fn parse_token(body: &str) -> Result<String> {
    let data: TokenData = parse_response(body, "obtainKrakenToken")?;
    Ok(data.obtain_kraken_token.token)
}

/// Raw intervals from a `plannedDispatches` response.
pub fn parse_dispatches(body: &str) -> Result<Vec<RawInterval>> {
    let data: DispatchData = parse_response(body, "plannedDispatches")?;
    Ok(data.planned_dispatches)
}

/// Events from a `savingSessions` response.
pub fn parse_saving_events(body: &str) -> Result<Vec<SavingEvent>> {
    let data: SavingSessionsData = parse_response(body, "savingSessions")?;
    Ok(data.saving_sessions.events)
}

/// The first event that has not finished and starts on today's local date.
///
/// Rewards are quoted in points per kWh and converted to currency per kWh by
/// dividing by `points_per_unit`.
///
/// # Errors
/// Returns `ScheduleError::Parse` if an event timestamp is malformed or an
/// event ends before it starts.
pub fn select_saving_session(
    events: &[SavingEvent],
    now: DateTime<Tz>,
    points_per_unit: f64,
) -> Result<Option<SavingsSession>> {
    let tz = now.timezone();
    for event in events {
        let start = parse_timestamp(&event.start_at, &tz)?;
        let end = parse_timestamp(&event.end_at, &tz)?;
        if end > now && start.date_naive() == now.date_naive() {
            let rate = event.reward_per_kwh_in_octo_points / points_per_unit;
            debug!(code = ?event.code, %start, %end, rate, "selected savings session");
            return SavingsSession::new(start, end, rate).map(Some);
        }
    }
    Ok(None)
}

// ── Client ──────────────────────────────────────────────────────────────────

/// An authenticated session against the Octopus GraphQL API.
pub struct OctopusClient {
    client: Client,
    endpoint: String,
    token: String,
    account_number: String,
}

impl OctopusClient {
    /// Exchange the API key for a Kraken token.
    ///
    /// # Errors
    /// Returns `ScheduleError::Fetch` if the request fails or the key is
    /// rejected, and `ScheduleError::Parse` for an unexpected response.
    pub fn connect(
        client: Client,
        endpoint: impl Into<String>,
        credentials: &OctopusCredentials,
    ) -> Result<Self> {
        let endpoint = endpoint.into();
        let request = GraphQlRequest {
            query: TOKEN_MUTATION,
            variables: serde_json::json!({ "api": credentials.api_key }),
            operation_name: None,
        };
        let body = post(&client, &endpoint, None, &request, "obtainKrakenToken")?;
        let token = parse_token(&body)?;
        debug!("obtained Kraken token");
        Ok(Self {
            client,
            endpoint,
            token,
            account_number: credentials.account_number.clone(),
        })
    }

    /// Off-peak windows the utility has planned for this account.
    pub fn planned_dispatches(&self) -> Result<Vec<RawInterval>> {
        let request = GraphQlRequest {
            query: DISPATCHES_QUERY,
            variables: serde_json::json!({ "input": self.account_number }),
            operation_name: Some("getData"),
        };
        let body = self.send(&request, "plannedDispatches")?;
        let dispatches = parse_dispatches(&body)?;
        debug!(count = dispatches.len(), "fetched planned dispatches");
        Ok(dispatches)
    }

    /// All advertised savings sessions, past and future.
    pub fn saving_events(&self) -> Result<Vec<SavingEvent>> {
        let request = GraphQlRequest {
            query: SAVING_SESSIONS_QUERY,
            variables: serde_json::json!({ "account": self.account_number }),
            operation_name: None,
        };
        let body = self.send(&request, "savingSessions")?;
        parse_saving_events(&body)
    }

    fn send<V: Serialize>(&self, request: &GraphQlRequest<'_, V>, what: &str) -> Result<String> {
        post(&self.client, &self.endpoint, Some(&self.token), request, what)
    }
}

fn post<V: Serialize>(
    client: &Client,
    endpoint: &str,
    token: Option<&str>,
    request: &GraphQlRequest<'_, V>,
    what: &str,
) -> Result<String> {
    let mut builder = client.post(endpoint).json(request);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, token);
    }
    let response = builder
        .send()
        .map_err(|e| ScheduleError::Fetch(format!("{} request failed: {}", what, e)))?;

    let status = response.status();
    let body = response
        .text()
        .map_err(|e| ScheduleError::Fetch(format!("{} response unreadable: {}", what, e)))?;
    if !status.is_success() {
        return Err(ScheduleError::Fetch(format!("{}: HTTP {}", what, status)));
    }
    Ok(body)
}
