#![forbid(unsafe_code)]

use concord_kernel_contracts::ContractViolation;
use serde::{Deserialize, Serialize};

pub const MAX_COMMIT_ATTEMPTS: u32 = 16;

/// How `modifyDataRecord` tells a review from an operate call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifyMode {
    /// 5 (or 4) arguments review, 3 operate.
    #[default]
    ByArity,
    /// Second argument is `review` or `operate`.
    ByModeToken,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserKeying {
    #[default]
    Address,
    Id,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeFormat {
    /// `[...]`
    #[default]
    BareArray,
    /// `{"list":[...]}`
    ListObject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseEnvelope {
    pub format: EnvelopeFormat,
    /// Emit `{"Key":..,"Record":..}` per row instead of the bare value.
    pub include_key: bool,
}

impl Default for ResponseEnvelope {
    fn default() -> Self {
        Self {
            format: EnvelopeFormat::BareArray,
            include_key: true,
        }
    }
}

/// How a read-modify-write is made safe against a racing writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommitPolicy {
    /// The host serializes commits per write-set; plain get then put.
    #[default]
    HostSerialized,
    /// Version-guarded put, re-read and re-check on conflict.
    OptimisticRetry { max_attempts: u32 },
}

impl CommitPolicy {
    pub fn attempts(self) -> u32 {
        match self {
            CommitPolicy::HostSerialized => 1,
            CommitPolicy::OptimisticRetry { max_attempts } => max_attempts,
        }
    }

    pub fn is_guarded(self) -> bool {
        matches!(self, CommitPolicy::OptimisticRetry { .. })
    }
}

/// Argument shapes and response envelope of one deployment; `mvp_v1` is the
/// address-keyed, arity-dispatched layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineProfile {
    pub modify_mode: ModifyMode,
    pub review_department: bool,
    pub user_keying: UserKeying,
    pub envelope: ResponseEnvelope,
    pub commit: CommitPolicy,
}

impl EngineProfile {
    pub fn mvp_v1() -> Self {
        Self {
            modify_mode: ModifyMode::ByArity,
            review_department: true,
            user_keying: UserKeying::Address,
            envelope: ResponseEnvelope::default(),
            commit: CommitPolicy::HostSerialized,
        }
    }

    /// Review fields after the id: reviewer, time, result[, department].
    pub fn review_field_count(&self) -> usize {
        if self.review_department {
            4
        } else {
            3
        }
    }

    /// Arguments of createUserRecord; modifyUserRecord may add `content`.
    pub fn user_arity(&self) -> usize {
        match self.user_keying {
            UserKeying::Address => 4,
            UserKeying::Id => 5,
        }
    }

    pub fn validate(&self) -> Result<(), ContractViolation> {
        if let CommitPolicy::OptimisticRetry { max_attempts } = self.commit {
            if max_attempts == 0 || max_attempts > MAX_COMMIT_ATTEMPTS {
                return Err(ContractViolation::InvalidValue {
                    field: "engine_profile.commit.max_attempts",
                    reason: "must be within 1..=16",
                });
            }
        }
        Ok(())
    }
}

impl Default for EngineProfile {
    fn default() -> Self {
        Self::mvp_v1()
    }
}
