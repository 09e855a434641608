mod progress;
mod run;
mod schedule;
mod vu;

pub use progress::{ProgressFn, ProgressUpdate, StageProgress};
pub use run::{RunOutcome, run, validate};
pub use schedule::{RampSchedule, StageSnapshot};
pub use vu::{StartSignal, VuContext, run_vu};
