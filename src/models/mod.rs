pub mod batch;
pub mod event;
pub mod loaders;
pub mod work;

pub use batch::{BatchId, BatchState, BatchStatus, BatchSummary};
pub use event::{LatestOutcome, ProgressEvent};
pub use loaders::{load_all_images, LoadedImage};
pub use work::{Outcome, OutcomeRecord, UnitOfWork};
