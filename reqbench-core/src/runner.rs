mod aggregate;
mod config;
mod dispatch;
mod gate;
mod progress;
mod record;
mod summary;
mod worker;

pub use aggregate::Aggregator;
pub use config::{Retention, RunConfig, StopCondition};
pub use dispatch::{Dispatcher, run};
pub use gate::{PermitGate, RunState, StopHandle};
pub use progress::{ProgressFn, ProgressUpdate};
pub use record::{FailureKind, Outcome, RawResponse, ResultRecord};
pub use summary::{BodySizeSummary, LatencySummary, Summary};
