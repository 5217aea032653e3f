//! Job records: the result of submitting a `query` or `copy` request.
//! Every job completes synchronously and is immediately `DONE` (§5 — this
//! is a single-threaded, in-process emulator, not a real async job queue).

use tinyquery_plan::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreateDisposition {
    #[default]
    CreateIfNeeded,
    CreateNever,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteDisposition {
    #[default]
    WriteEmpty,
    WriteAppend,
    WriteTruncate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Done,
}

#[derive(Debug, Clone)]
pub struct JobReference {
    pub project_id: String,
    pub job_id: String,
}

/// The part of a job record every caller can see regardless of job kind.
#[derive(Debug, Clone)]
pub struct JobInfo {
    pub state: JobState,
    pub job_reference: JobReference,
    pub total_bytes_processed: Option<u64>,
}

pub(crate) enum JobRecord {
    Query { info: JobInfo, results: Context },
    Copy { info: JobInfo },
}

impl JobRecord {
    pub(crate) fn info(&self) -> &JobInfo {
        match self {
            JobRecord::Query { info, .. } => info,
            JobRecord::Copy { info } => info,
        }
    }
}
