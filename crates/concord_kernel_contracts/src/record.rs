#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ContractViolation, SchemaVersion, Validate};

pub const RECORD_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Discriminant shared by every document in the ledger keyspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocType {
    #[serde(rename = "dataRecord")]
    DataRecord,
    #[serde(rename = "userRecord")]
    UserRecord,
}

impl DocType {
    pub fn as_str(self) -> &'static str {
        match self {
            DocType::DataRecord => "dataRecord",
            DocType::UserRecord => "userRecord",
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a data record sits in submit → review → operate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordState {
    Submitted,
    Reviewed,
    Operated,
}

impl RecordState {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordState::Submitted => "submitted",
            RecordState::Reviewed => "reviewed",
            RecordState::Operated => "operated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewVerdict {
    Approved,
    Rejected,
}

impl ReviewVerdict {
    pub const APPROVED: &'static str = "true";
    pub const REJECTED: &'static str = "false";

    /// Expects an already-normalized value.
    pub fn parse(raw: &str) -> Result<Self, ContractViolation> {
        match raw {
            Self::APPROVED => Ok(ReviewVerdict::Approved),
            Self::REJECTED => Ok(ReviewVerdict::Rejected),
            _ => Err(ContractViolation::InvalidValue {
                field: "review_input.review_result",
                reason: "must be \"true\" or \"false\"",
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReviewVerdict::Approved => Self::APPROVED,
            ReviewVerdict::Rejected => Self::REJECTED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataRecord {
    pub doc_type: DocType,
    pub id: String,
    pub department: String,
    pub user: String,
    pub object: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub opinion_time: String,
    pub reviewer: String,
    pub review_time: String,
    pub review_result: String,
    pub review_department: String,
    pub operate_time: String,
    pub content: String,
}

impl Default for DataRecord {
    fn default() -> Self {
        Self {
            doc_type: DocType::DataRecord,
            id: String::new(),
            department: String::new(),
            user: String::new(),
            object: String::new(),
            record_type: String::new(),
            opinion_time: String::new(),
            reviewer: String::new(),
            review_time: String::new(),
            review_result: String::new(),
            review_department: String::new(),
            operate_time: String::new(),
            content: String::new(),
        }
    }
}

impl DataRecord {
    pub fn from_input_v1(input: DataRecordInput) -> Result<Self, ContractViolation> {
        input.validate()?;
        let (opinion_time, operate_time, content) = match input.phase {
            SubmissionPhase::Opinion { opinion_time } => (opinion_time, String::new(), String::new()),
            SubmissionPhase::Operated {
                operate_time,
                content,
            } => (String::new(), operate_time, content),
        };
        Ok(Self {
            doc_type: DocType::DataRecord,
            id: input.id,
            department: input.department,
            user: input.user,
            object: input.object,
            record_type: input.record_type,
            opinion_time,
            operate_time,
            content,
            ..Self::default()
        })
    }

    pub fn un_reviewed(&self) -> bool {
        self.reviewer.is_empty() && self.review_time.is_empty() && self.review_result.is_empty()
    }

    pub fn un_operated(&self) -> bool {
        self.operate_time.is_empty()
    }

    pub fn state(&self) -> RecordState {
        if !self.un_operated() {
            RecordState::Operated
        } else if self.un_reviewed() {
            RecordState::Submitted
        } else {
            RecordState::Reviewed
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.review_result == ReviewVerdict::REJECTED
    }
}

/// Which of the two creation shapes a submission used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionPhase {
    Opinion {
        opinion_time: String,
    },
    Operated {
        operate_time: String,
        content: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRecordInput {
    pub schema_version: SchemaVersion,
    pub id: String,
    pub department: String,
    pub user: String,
    pub object: String,
    pub record_type: String,
    pub phase: SubmissionPhase,
}

impl DataRecordInput {
    pub fn v1(
        id: String,
        department: String,
        user: String,
        object: String,
        record_type: String,
        phase: SubmissionPhase,
    ) -> Result<Self, ContractViolation> {
        let input = Self {
            schema_version: RECORD_CONTRACT_VERSION,
            id,
            department,
            user,
            object,
            record_type,
            phase,
        };
        input.validate()?;
        Ok(input)
    }
}

impl Validate for DataRecordInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != RECORD_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "data_record_input.schema_version",
                reason: "must match RECORD_CONTRACT_VERSION",
            });
        }
        non_empty("data_record_input.id", &self.id)?;
        non_empty("data_record_input.department", &self.department)?;
        non_empty("data_record_input.user", &self.user)?;
        non_empty("data_record_input.object", &self.object)?;
        non_empty("data_record_input.type", &self.record_type)?;
        match &self.phase {
            SubmissionPhase::Opinion { opinion_time } => {
                non_empty("data_record_input.opinion_time", opinion_time)
            }
            SubmissionPhase::Operated {
                operate_time,
                content,
            } => {
                non_empty("data_record_input.operate_time", operate_time)?;
                non_empty("data_record_input.content", content)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewInput {
    pub reviewer: String,
    pub review_time: String,
    pub verdict: ReviewVerdict,
    /// Absent when the active profile does not carry a review department.
    pub review_department: Option<String>,
}

impl Validate for ReviewInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        non_empty("review_input.reviewer", &self.reviewer)?;
        non_empty("review_input.review_time", &self.review_time)?;
        if let Some(d) = &self.review_department {
            non_empty("review_input.review_department", d)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperateInput {
    pub operate_time: String,
    pub content: String,
}

impl Validate for OperateInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        non_empty("operate_input.operate_time", &self.operate_time)?;
        non_empty("operate_input.content", &self.content)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserRecord {
    pub doc_type: DocType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub department: String,
    pub user_name: String,
    pub user_address: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Default for UserRecord {
    fn default() -> Self {
        Self {
            doc_type: DocType::UserRecord,
            id: None,
            department: String::new(),
            user_name: String::new(),
            user_address: String::new(),
            role: String::new(),
            content: None,
        }
    }
}

impl UserRecord {
    pub fn v1(
        id: Option<String>,
        department: String,
        user_name: String,
        user_address: String,
        role: String,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            doc_type: DocType::UserRecord,
            id,
            department,
            user_name,
            user_address,
            role,
            content: None,
        };
        r.validate()?;
        Ok(r)
    }

    /// Storage key: the id when the record carries one, else the address.
    pub fn primary_key(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.user_address)
    }
}

impl Validate for UserRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.doc_type != DocType::UserRecord {
            return Err(ContractViolation::InvalidValue {
                field: "user_record.doc_type",
                reason: "must be userRecord",
            });
        }
        if let Some(id) = &self.id {
            non_empty("user_record.id", id)?;
        }
        non_empty("user_record.department", &self.department)?;
        non_empty("user_record.user_name", &self.user_name)?;
        non_empty("user_record.user_address", &self.user_address)?;
        non_empty("user_record.role", &self.role)?;
        if let Some(c) = &self.content {
            non_empty("user_record.content", c)?;
        }
        Ok(())
    }
}

/// Overwrite applied by modifyUserRecord. Key fields are not part of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfileUpdate {
    pub department: String,
    pub user_name: String,
    pub role: String,
    pub content: Option<String>,
}

impl UserProfileUpdate {
    pub fn apply_to(self, record: &mut UserRecord) {
        record.department = self.department;
        record.user_name = self.user_name;
        record.role = self.role;
        if self.content.is_some() {
            record.content = self.content;
        }
    }
}

/// A decoded ledger value, dispatched on its `docType`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerDocument {
    Data(DataRecord),
    User(UserRecord),
}

impl LedgerDocument {
    pub fn doc_type(&self) -> DocType {
        match self {
            LedgerDocument::Data(_) => DocType::DataRecord,
            LedgerDocument::User(_) => DocType::UserRecord,
        }
    }
}

fn non_empty(field: &'static str, value: &str) -> Result<(), ContractViolation> {
    if value.is_empty() {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must not be empty",
        });
    }
    Ok(())
}
