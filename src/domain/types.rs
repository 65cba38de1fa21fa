//! Shared domain enumerations for pipeline jobs.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The three stages a pipeline instance moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Compose,
    Render,
    Publish,
}

impl StageName {
    pub const ALL: [StageName; 3] = [StageName::Compose, StageName::Render, StageName::Publish];

    pub fn as_str(self) -> &'static str {
        match self {
            StageName::Compose => "compose",
            StageName::Render => "render",
            StageName::Publish => "publish",
        }
    }

    /// The stage a successful run of `self` hands off to.
    pub fn next(self) -> Option<StageName> {
        match self {
            StageName::Compose => Some(StageName::Render),
            StageName::Render => Some(StageName::Publish),
            StageName::Publish => None,
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for StageName {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "compose" => Ok(StageName::Compose),
            "render" => Ok(StageName::Render),
            "publish" => Ok(StageName::Publish),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Waiting,
    Delayed,
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Waiting => "Waiting",
            JobState::Delayed => "Delayed",
            JobState::Active => "Active",
            JobState::Completed => "Completed",
            JobState::Failed => "Failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// State of a freshly enqueued job given its visibility time.
    pub fn initial(visible_at: OffsetDateTime, now: OffsetDateTime) -> Self {
        if visible_at > now {
            JobState::Delayed
        } else {
            JobState::Waiting
        }
    }

    /// Status string stored in the `apalis.jobs` table.
    pub fn apalis_status(self) -> &'static str {
        match self {
            JobState::Waiting | JobState::Delayed => "Pending",
            JobState::Active => "Running",
            JobState::Completed => "Done",
            JobState::Failed => "Failed",
        }
    }

    /// Map an apalis status back to a pipeline state. Pending jobs whose
    /// `run_at` lies in the future are reported as delayed.
    pub fn from_apalis(status: &str, run_at: OffsetDateTime, now: OffsetDateTime) -> Option<Self> {
        match status {
            "Pending" | "Latest" => Some(JobState::initial(run_at, now)),
            "Running" => Some(JobState::Active),
            "Done" => Some(JobState::Completed),
            "Failed" | "Killed" => Some(JobState::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for JobState {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "Waiting" | "waiting" => Ok(JobState::Waiting),
            "Delayed" | "delayed" => Ok(JobState::Delayed),
            "Active" | "active" => Ok(JobState::Active),
            "Completed" | "completed" => Ok(JobState::Completed),
            "Failed" | "failed" => Ok(JobState::Failed),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn pending_jobs_in_the_future_are_delayed() {
        let now = OffsetDateTime::now_utc();
        let later = now + Duration::minutes(10);

        assert_eq!(
            JobState::from_apalis("Pending", later, now),
            Some(JobState::Delayed)
        );
        assert_eq!(
            JobState::from_apalis("Pending", now, now),
            Some(JobState::Waiting)
        );
        assert_eq!(
            JobState::from_apalis("Killed", now, now),
            Some(JobState::Failed)
        );
        assert_eq!(JobState::from_apalis("Bogus", now, now), None);
    }

    #[test]
    fn stage_names_round_trip_through_strings() {
        for stage in StageName::ALL {
            assert_eq!(StageName::try_from(stage.as_str()), Ok(stage));
        }
        assert!(StageName::try_from("encode").is_err());
    }

    #[test]
    fn stages_chain_compose_render_publish() {
        assert_eq!(StageName::Compose.next(), Some(StageName::Render));
        assert_eq!(StageName::Render.next(), Some(StageName::Publish));
        assert_eq!(StageName::Publish.next(), None);
    }
}
