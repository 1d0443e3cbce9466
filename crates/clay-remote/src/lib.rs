mod client;
mod error;
mod types;

pub use client::{HttpRemoteJobs, RemoteJobs};
pub use error::RemoteError;
pub use types::{HistoryQuery, JobHistoryRecord, JobOutput, JobResultInfo, JobStatus};
