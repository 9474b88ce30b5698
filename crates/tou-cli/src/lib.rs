//! # tou-cli
//!
//! The runner around [`tou_engine`]: loads the configuration file, checks the
//! remote kill switch, fetches pricing windows from Octopus and publishes the
//! resulting schedule to a Powerwall through Tessie.
//!
//! ## Modules
//!
//! - [`settings`] - runner settings and the configuration template
//! - [`octopus`] - Octopus GraphQL client (dispatches, savings sessions)
//! - [`free_electricity`] - free-electricity announcement scraping
//! - [`tessie`] - Tessie client, the controller [`tou_engine::Publisher`]
//! - [`kill_switch`] - pre-flight enable/disable check
//! - [`run`] - one complete scheduler run

pub mod free_electricity;
pub mod kill_switch;
pub mod octopus;
pub mod run;
pub mod settings;
pub mod tessie;

pub use kill_switch::{HttpKillSwitch, KillSwitch, MqttKillSwitch};
pub use run::{execute, gather_inputs, run_once, IntervalSources, RunOutcome};
pub use settings::{write_template, Settings, CONFIG_TEMPLATE};
pub use tessie::TessieClient;
