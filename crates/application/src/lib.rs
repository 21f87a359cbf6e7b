mod clock;
mod pipeline;
mod worker;

pub use clock::{Clock, ClockRef, ManualClock, SystemClock};
pub use pipeline::{FrameOutcome, GesturePipeline, PipelineError};
pub use worker::{spawn_session_worker, SessionWorker};
