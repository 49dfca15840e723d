//! Background job machinery: persisted job records, the key-value store
//! seam, and the worker-pool executor.

pub mod executor;
pub mod record;
pub mod store;

pub use executor::{
    ExecutorConfig, JobStatus, ResultsOutcome, StatusOutcome, Submission, TaskExecutor,
};
pub use record::{JobFailure, JobRecord, JobState};
pub use store::{JobStore, KvStore, LoadedRecord, MemoryStore};
