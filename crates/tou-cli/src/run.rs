//! One scheduler run: kill switch, fetch, compute, publish.

use crate::free_electricity::{self, FREE_ELECTRICITY_URL};
use crate::kill_switch::{AlwaysEnabled, HttpKillSwitch, KillSwitch, MqttKillSwitch};
use crate::octopus::{self, OctopusClient, SavingEvent, OCTOPUS_GRAPHQL_URL};
use crate::settings::{KillSwitchSettings, Settings};
use crate::tessie::{TessieClient, TESSIE_API_BASE};
use anyhow::{Context, Result};
use chrono::DateTime;
use chrono_tz::Tz;
use reqwest::blocking::Client;
use std::time::Duration;
use tou_engine::error::Result as ScheduleResult;
use tou_engine::{
    normalize_all, FileStateStore, Publisher, RawInterval, RunReport, ScheduleConfig,
    ScheduleError, ScheduleInputs, Source, StateStore, TimeInterval,
};
use tracing::{info, warn};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a run gets its pricing windows from.
pub trait IntervalSources {
    fn planned_dispatches(&self) -> ScheduleResult<Vec<RawInterval>>;
    fn saving_events(&self) -> ScheduleResult<Vec<SavingEvent>>;
    fn free_session(&self, now: DateTime<Tz>) -> ScheduleResult<Option<TimeInterval>>;
}

struct HttpSources {
    octopus: OctopusClient,
    client: Client,
}

impl IntervalSources for HttpSources {
    fn planned_dispatches(&self) -> ScheduleResult<Vec<RawInterval>> {
        self.octopus.planned_dispatches()
    }

    fn saving_events(&self) -> ScheduleResult<Vec<SavingEvent>> {
        self.octopus.saving_events()
    }

    fn free_session(&self, now: DateTime<Tz>) -> ScheduleResult<Option<TimeInterval>> {
        free_electricity::fetch_announcement(&self.client, FREE_ELECTRICITY_URL, now)
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    /// The kill switch was off; nothing was fetched or published.
    Disabled,
    Completed(Box<RunReport>),
}

/// Fetch every input the configuration asks for.
///
/// Planned dispatches are mandatory. Savings and free-electricity sessions are
/// only fetched when participating, and a network failure on either leaves it
/// absent.
///
/// # Errors
/// Returns any error from the dispatch fetch, and `ScheduleError::Parse` from
/// any source.
pub fn gather_inputs<S: IntervalSources + ?Sized>(
    config: &ScheduleConfig,
    sources: &S,
    now: DateTime<Tz>,
) -> ScheduleResult<ScheduleInputs> {
    let now = now.with_timezone(&config.timezone);
    let raw = sources.planned_dispatches()?;
    let dispatches = normalize_all(&raw, Source::Dispatch, &config.timezone)?;
    info!(count = dispatches.len(), "planned dispatches");

    let savings = if config.participate_savings {
        optional(
            "savings sessions",
            sources.saving_events().and_then(|events| {
                octopus::select_saving_session(&events, now, config.savings_points_per_unit)
            }),
        )?
    } else {
        None
    };

    let free = if config.participate_free {
        optional("free electricity", sources.free_session(now))?
    } else {
        None
    };

    Ok(ScheduleInputs {
        dispatches,
        savings,
        free,
    })
}

fn optional<T>(what: &str, result: ScheduleResult<Option<T>>) -> ScheduleResult<Option<T>> {
    match result {
        Err(ScheduleError::Fetch(message)) => {
            warn!(source = what, error = %message, "source unavailable, continuing without it");
            Ok(None)
        }
        other => other,
    }
}

/// Gather inputs and run the pipeline against already-built collaborators.
pub fn run_once<S, St, P>(
    config: &ScheduleConfig,
    sources: &S,
    store: &St,
    publisher: &P,
    now: DateTime<Tz>,
) -> Result<RunReport>
where
    S: IntervalSources + ?Sized,
    St: StateStore + ?Sized,
    P: Publisher + ?Sized,
{
    let inputs = gather_inputs(config, sources, now).context("Failed to fetch pricing windows")?;
    tou_engine::run(config, &inputs, now, store, publisher)
        .context("Failed to update the Powerwall schedule")
}

/// A complete run against the live services.
///
/// # Errors
/// Fails if the kill switch cannot be read, Octopus authentication or the
/// dispatch fetch fails, or the controller update fails.
pub fn execute(settings: &Settings, now: DateTime<Tz>) -> Result<RunOutcome> {
    let client = Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    let enabled = match &settings.kill_switch {
        Some(KillSwitchSettings::Http(http)) => {
            HttpKillSwitch::new(client.clone(), http.clone()).check()
        }
        Some(KillSwitchSettings::Mqtt(mqtt)) => MqttKillSwitch::new(mqtt.clone()).check(),
        None => AlwaysEnabled.check(),
    }
    .context("Failed to read kill switch")?;
    if !enabled {
        info!("kill switch is off, skipping run");
        return Ok(RunOutcome::Disabled);
    }

    let octopus = OctopusClient::connect(client.clone(), OCTOPUS_GRAPHQL_URL, &settings.octopus)
        .context("Failed to authenticate with Octopus")?;
    let sources = HttpSources {
        octopus,
        client: client.clone(),
    };
    let store = FileStateStore::new(&settings.state_file);
    let publisher = TessieClient::new(client, TESSIE_API_BASE, &settings.tessie);

    let report = run_once(&settings.schedule, &sources, &store, &publisher, now)?;
    Ok(RunOutcome::Completed(Box::new(report)))
}
