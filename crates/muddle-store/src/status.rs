use anyhow::Result;
use muddle_errors::muddle_bug;

/// `clear | processing | done`, persisted as `rules.status` for
/// non-transient targets (§3, §4.3). Transient targets never reach
/// `Done` in the database; completion is tracked purely in-process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleStatus {
    Clear = 0,
    Processing = 1,
    Done = 2,
}

impl RuleStatus {
    pub fn from_i64(value: i64) -> Result<Self> {
        match value {
            0 => Ok(RuleStatus::Clear),
            1 => Ok(RuleStatus::Processing),
            2 => Ok(RuleStatus::Done),
            other => muddle_bug!("unrecognised rule status {other}"),
        }
    }

    pub fn as_i64(self) -> i64 {
        self as i64
    }
}
