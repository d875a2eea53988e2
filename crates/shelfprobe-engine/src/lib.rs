pub mod browse;
pub mod cache;
pub mod detect;
pub mod error;
pub mod events;
pub mod extract;
pub mod keys;
pub mod normalize;
mod parse_helpers;
pub mod run;
pub mod scroll;

pub use browse::{BrowseAction, Browser, HttpBrowser, ReplayBrowser, RobotsRules};
pub use cache::{MemoryCache, NoCache, SnapshotCache};
pub use detect::{classify, classify_signals, Detector, PageSignals, ProfileSpec, SiteProfile};
pub use error::{BrowseError, EngineError, ParseError, StepFailure};
pub use events::{EventSink, RecordingSink, RunEvent, TracingSink};
pub use extract::{extract, Extraction};
pub use normalize::{normalize_price, normalize_quantity, Price, Quantity};
pub use run::{Orchestrator, RunPhase};
pub use scroll::{ScrollBounds, ScrollStep, Scroller, StopReason};
