use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Which analyzer pipeline an upload goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UploadKind {
    Stock,
    Meal,
}

/// Status of an analysis job as tracked by the client.
///
/// Variants are ordered: a job may only move forward. `Completed` and `Failed` are
/// both terminal and share the final rank.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Map the backend's status string.
    pub fn from_wire(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "pending" | "queued" => JobStatus::Queued,
            "processing" => JobStatus::Processing,
            "completed" => JobStatus::Completed,
            "error" | "failed" => JobStatus::Failed,
            other => {
                tracing::warn!(status = %other, "Unknown job status, treating as processing");
                JobStatus::Processing
            }
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Processing => 1,
            JobStatus::Completed | JobStatus::Failed => 2,
        }
    }
}

/// Raw analyzer output, decoded later by the extraction mapper.
pub type JobResult = serde_json::Value;

/// A submitted analysis job. Lives only as long as the client polls it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub kind: UploadKind,
    pub status: JobStatus,
    pub result: Option<JobResult>,
    pub error: Option<String>,
}

impl Job {
    pub fn new(id: impl Into<String>, kind: UploadKind) -> Self {
        Self {
            id: id.into(),
            kind,
            status: JobStatus::Queued,
            result: None,
            error: None,
        }
    }

    /// Apply a status report. Returns false (and changes nothing) when the report
    /// would move the job backwards or out of a terminal state.
    pub fn advance(&mut self, report: StatusResponse) -> bool {
        let next = JobStatus::from_wire(&report.status);
        if self.status.is_terminal() || next.rank() < self.status.rank() {
            tracing::debug!(
                job_id = %self.id,
                current = ?self.status,
                reported = ?next,
                "Ignoring status regression"
            );
            return false;
        }

        self.status = next;
        match next {
            JobStatus::Completed => self.result = Some(report.data.unwrap_or(JobResult::Null)),
            JobStatus::Failed => {
                self.error = Some(report.error.unwrap_or_else(|| "AI processing failed".to_string()))
            }
            _ => {}
        }
        true
    }
}

/// Response from `POST /upload/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: String,
}

/// Response from `GET /upload/status/{job_id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default)]
    pub data: Option<JobResult>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StatusResponse {
    pub fn processing() -> Self {
        Self {
            status: "processing".to_string(),
            ..Self::default()
        }
    }

    pub fn completed(data: JobResult) -> Self {
        Self {
            status: "completed".to_string(),
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions_are_monotonic() {
        let mut job = Job::new("abc123", UploadKind::Stock);
        assert!(job.advance(StatusResponse::processing()));
        assert_eq!(job.status, JobStatus::Processing);

        let queued = StatusResponse {
            status: "pending".to_string(),
            ..StatusResponse::default()
        };
        assert!(!job.advance(queued));
        assert_eq!(job.status, JobStatus::Processing);

        assert!(job.advance(StatusResponse::completed(serde_json::json!([]))));
        assert!(!job.advance(StatusResponse::error("late failure")));
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.error.is_none());
    }

    #[test]
    fn test_error_status_keeps_server_message() {
        let mut job = Job::new("j1", UploadKind::Meal);
        job.advance(StatusResponse::error("Image too blurry"));
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("Image too blurry"));
    }

    #[test]
    fn test_upload_kind_wire_names() {
        assert_eq!(UploadKind::Stock.to_string(), "stock");
        assert_eq!("meal".parse::<UploadKind>().unwrap(), UploadKind::Meal);
    }
}
