use indexmap::IndexMap;

use crate::jobs::JobRecord;

/// What [`ResultAggregator::apply_completion`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The record moved from pending to completed.
    Applied,
    /// The record was already terminal; nothing changed.
    AlreadyTerminal,
    /// No record with that id exists; nothing changed.
    UnknownJob,
}

/// Ordered view of every job submitted through one orchestrator.
///
/// Records keep their insertion position and label for as long as the
/// aggregator lives. Only status and output url ever change.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    records: IndexMap<String, JobRecord>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append records in order. Ids already present are skipped so an
    /// existing placeholder never moves. Returns how many were added.
    pub fn append(&mut self, records: impl IntoIterator<Item = JobRecord>) -> usize {
        let mut added = 0;
        for record in records {
            if self.records.contains_key(record.id()) {
                tracing::warn!(job_id = record.id(), "Ignoring duplicate job record");
                continue;
            }
            self.records.insert(record.id().to_string(), record);
            added += 1;
        }
        added
    }

    pub fn apply_completion(&mut self, job_id: &str, output_url: &str) -> Completion {
        let Some(record) = self.records.get_mut(job_id) else {
            tracing::warn!(job_id, "Completion for unknown job ignored");
            return Completion::UnknownJob;
        };
        if record.mark_completed(output_url.to_string()) {
            tracing::debug!(job_id, label = record.label(), "Job completed");
            Completion::Applied
        } else {
            Completion::AlreadyTerminal
        }
    }

    pub fn get(&self, job_id: &str) -> Option<&JobRecord> {
        self.records.get(job_id)
    }

    pub fn is_pending(&self, job_id: &str) -> bool {
        self.records.get(job_id).is_some_and(JobRecord::is_pending)
    }

    pub fn records(&self) -> impl Iterator<Item = &JobRecord> {
        self.records.values()
    }

    pub fn to_vec(&self) -> Vec<JobRecord> {
        self.records.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
