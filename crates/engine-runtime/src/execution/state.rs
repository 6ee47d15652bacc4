use serde::Serialize;
use std::fmt;

/// Position of a job in its lifecycle.
///
/// ```text
/// Init -> SchemaEnsured -> Resuming -> Extracting -> Loading -> Checkpointing
///                              |            ^  |                    |
///                              |            |  +--> Done            |
///                              +--> Done    +-----------------------+--> Done
/// ```
///
/// Any state may move to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Init,
    SchemaEnsured,
    Resuming,
    Extracting,
    Loading,
    Checkpointing,
    Done,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Init => "init",
            JobState::SchemaEnsured => "schema_ensured",
            JobState::Resuming => "resuming",
            JobState::Extracting => "extracting",
            JobState::Loading => "loading",
            JobState::Checkpointing => "checkpointing",
            JobState::Done => "done",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}
