//! Shared domain types and configuration for shelfprobe.
//!
//! The engine crate consumes these types; exporters and schedulers outside the
//! workspace only ever see [`RunTarget`] going in and [`RunResult`] coming out.

pub mod app_config;
pub mod config;
pub mod error;
pub mod page;
pub mod products;
pub mod run;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use error::{ConfigError, CoreError};
pub use page::{PageCapture, PageSnapshot, PageState};
pub use products::{
    CanonicalUnit, NormalizedRecord, Provenance, RawProductCandidate, SourceKind, UnitFamily,
};
pub use run::{BlockingObservation, RunBounds, RunResult, RunTarget, TerminalStatus};
