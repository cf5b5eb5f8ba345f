use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a submitted generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Placeholder label for the slot at `index` when the request did not name it.
pub fn default_label(index: usize) -> String {
    format!("Result {}", index + 1)
}

/// One unit of submitted generation work as the UI sees it.
///
/// The id and label are fixed at submission time. Only the aggregator may
/// move a record out of `Pending`, which is why the fields are private.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRecord {
    id: String,
    label: String,
    status: JobStatus,
    output_url: Option<String>,
    submitted_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn pending(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            status: JobStatus::Pending,
            output_url: None,
            submitted_at: Utc::now(),
            completed_at: None,
        }
    }

    /// A record that resolved synchronously at submission time.
    pub fn completed(
        id: impl Into<String>,
        label: impl Into<String>,
        output_url: impl Into<String>,
    ) -> Self {
        let mut record = Self::pending(id, label);
        record.mark_completed(output_url.into());
        record
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn output_url(&self) -> Option<&str> {
        self.output_url.as_deref()
    }

    /// Time from submission to completion, once completed.
    pub fn turnaround(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|done| done - self.submitted_at)
    }

    pub fn is_pending(&self) -> bool {
        self.status == JobStatus::Pending
    }

    /// Moves the record to `Completed`. Returns `false` when it was already
    /// terminal, leaving it untouched.
    pub(crate) fn mark_completed(&mut self, output_url: String) -> bool {
        if self.status != JobStatus::Pending {
            return false;
        }
        self.status = JobStatus::Completed;
        self.output_url = Some(output_url);
        self.completed_at = Some(Utc::now());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_record_defaults() {
        let record = JobRecord::pending("r-1", "Result 1");
        assert_eq!(record.id(), "r-1");
        assert_eq!(record.label(), "Result 1");
        assert_eq!(record.status(), JobStatus::Pending);
        assert!(record.output_url().is_none());
        assert!(record.turnaround().is_none());
    }

    #[test]
    fn mark_completed_only_once() {
        let mut record = JobRecord::pending("r-1", "Result 1");
        assert!(record.mark_completed("https://cdn/a.png".into()));
        let first = record.clone();

        assert!(!record.mark_completed("https://cdn/other.png".into()));
        assert_eq!(record, first);
        assert_eq!(record.output_url(), Some("https://cdn/a.png"));
    }

    #[test]
    fn turnaround_spans_submission_to_completion() {
        let mut record = JobRecord::pending("r-1", "Result 1");
        record.submitted_at = record.submitted_at - chrono::Duration::seconds(42);
        record.mark_completed("https://cdn/a.png".into());

        let took = record.turnaround().unwrap();
        assert!(took >= chrono::Duration::seconds(42));
        assert!(took < chrono::Duration::seconds(60));
    }

    #[test]
    fn default_labels_are_one_based() {
        assert_eq!(default_label(0), "Result 1");
        assert_eq!(default_label(4), "Result 5");
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&JobStatus::Completed).unwrap();
        assert_eq!(json, r#""completed""#);
        assert_eq!(JobStatus::Failed.to_string(), "failed");
    }
}
