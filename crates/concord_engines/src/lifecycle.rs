#![forbid(unsafe_code)]

use concord_kernel_contracts::record::{
    DataRecord, DataRecordInput, DocType, OperateInput, ReviewInput, ReviewVerdict,
    SubmissionPhase, UserProfileUpdate, UserRecord,
};
use concord_kernel_contracts::{
    normalize_arg, require_non_empty, ContractViolation, LedgerError, Validate,
};
use concord_storage::kv::WritePrecondition;
use concord_storage::repo::RecordRepository;

use crate::profile::{EngineProfile, ModifyMode, UserKeying};

pub mod reason {
    pub const ALREADY_REVIEWED_OR_OPERATED: &str = "already reviewed or operated";
    pub const OPERATED_OR_NOT_REVIEWED: &str = "already operated or not yet reviewed";
}

pub const MODE_REVIEW: &str = "review";
pub const MODE_OPERATE: &str = "operate";

const OP_CREATE_DATA: &str = "createDataRecord";
const OP_CREATE_USER: &str = "createUserRecord";
const OP_MODIFY_DATA: &str = "modifyDataRecord";
const OP_MODIFY_USER: &str = "modifyUserRecord";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataTransition {
    Review(ReviewInput),
    Operate(OperateInput),
}

impl DataTransition {
    fn name(&self) -> &'static str {
        match self {
            DataTransition::Review(_) => MODE_REVIEW,
            DataTransition::Operate(_) => MODE_OPERATE,
        }
    }
}

/// Stateless apart from its profile; the repository is passed per call.
///
/// Under `CommitPolicy::HostSerialized` the host must serialize commits that
/// touch the same key, or two racing reviews can both pass the state check.
#[derive(Debug, Clone, Default)]
pub struct LifecycleEngine {
    profile: EngineProfile,
}

impl LifecycleEngine {
    pub fn new(profile: EngineProfile) -> Self {
        Self { profile }
    }

    pub fn create_data_record<R>(
        &self,
        repo: &mut R,
        args: &[String],
    ) -> Result<DataRecord, LedgerError>
    where
        R: RecordRepository + ?Sized,
    {
        let input = parse_create_data_args(args)?;
        tracing::debug!(op = OP_CREATE_DATA, key = %input.id, "create requested");
        if repo.exists(&input.id)? {
            return Err(LedgerError::DuplicateRecord { id: input.id });
        }
        let record = DataRecord::from_input_v1(input)?;
        match repo.store_data_record(&record, self.create_precondition()) {
            Ok(()) => {}
            Err(LedgerError::WriteConflict { key }) => {
                return Err(LedgerError::DuplicateRecord { id: key })
            }
            Err(e) => return Err(e),
        }
        tracing::info!(
            op = OP_CREATE_DATA,
            key = %record.id,
            state = record.state().as_str(),
            "data record created"
        );
        Ok(record)
    }

    pub fn create_user_record<R>(
        &self,
        repo: &mut R,
        args: &[String],
    ) -> Result<UserRecord, LedgerError>
    where
        R: RecordRepository + ?Sized,
    {
        let record = self.parse_create_user_args(args)?;
        let key = record.primary_key().to_string();
        tracing::debug!(op = OP_CREATE_USER, key = %key, "create requested");
        if repo.exists(&key)? {
            return Err(LedgerError::DuplicateUser { key });
        }
        match repo.store_user_record(&key, &record, self.create_precondition()) {
            Ok(()) => {}
            Err(LedgerError::WriteConflict { key }) => return Err(LedgerError::DuplicateUser { key }),
            Err(e) => return Err(e),
        }
        tracing::info!(op = OP_CREATE_USER, key = %key, "user record created");
        Ok(record)
    }

    pub fn modify_data_record<R>(
        &self,
        repo: &mut R,
        args: &[String],
    ) -> Result<DataRecord, LedgerError>
    where
        R: RecordRepository + ?Sized,
    {
        let (id, transition) = self.parse_modify_data_args(args)?;
        tracing::debug!(op = OP_MODIFY_DATA, key = %id, transition = transition.name(), "modify requested");
        let next = self.commit_with_retry(&id, || {
            let current = repo
                .load_data_record_versioned(&id)?
                .ok_or_else(|| LedgerError::NotFound {
                    kind: DocType::DataRecord,
                    key: id.clone(),
                })?;
            let precondition = self.guard(current.precondition());
            let mut record = current.value;
            // The key is authoritative; documents written without an id
            // field still land back under the same key.
            record.id = id.clone();
            let next = apply_transition(record, &transition)?;
            repo.store_data_record(&next, precondition)?;
            Ok(next)
        })?;
        tracing::info!(
            op = OP_MODIFY_DATA,
            key = %id,
            transition = transition.name(),
            state = next.state().as_str(),
            "data record transitioned"
        );
        Ok(next)
    }

    pub fn modify_user_record<R>(
        &self,
        repo: &mut R,
        args: &[String],
    ) -> Result<UserRecord, LedgerError>
    where
        R: RecordRepository + ?Sized,
    {
        let (key, update) = self.parse_modify_user_args(args)?;
        tracing::debug!(op = OP_MODIFY_USER, key = %key, "modify requested");
        let next = self.commit_with_retry(&key, || {
            let current = repo
                .load_user_record_versioned(&key)?
                .ok_or_else(|| LedgerError::NotFound {
                    kind: DocType::UserRecord,
                    key: key.clone(),
                })?;
            let precondition = self.guard(current.precondition());
            let mut record = current.value;
            if self.profile.user_keying == UserKeying::Id {
                record.id = Some(key.clone());
            } else {
                record.user_address = key.clone();
            }
            update.clone().apply_to(&mut record);
            repo.store_user_record(&key, &record, precondition)?;
            Ok(record)
        })?;
        tracing::info!(op = OP_MODIFY_USER, key = %key, "user record updated");
        Ok(next)
    }

    fn create_precondition(&self) -> WritePrecondition {
        if self.profile.commit.is_guarded() {
            WritePrecondition::Absent
        } else {
            WritePrecondition::Unchecked
        }
    }

    fn guard(&self, observed: WritePrecondition) -> WritePrecondition {
        if self.profile.commit.is_guarded() {
            observed
        } else {
            WritePrecondition::Unchecked
        }
    }

    /// Runs one read-compute-write step, repeating it from a fresh read when
    /// the guarded write loses a race. Any other error ends the call.
    fn commit_with_retry<T, F>(&self, key: &str, mut step: F) -> Result<T, LedgerError>
    where
        F: FnMut() -> Result<T, LedgerError>,
    {
        let attempts = self.profile.commit.attempts().max(1);
        let mut attempt = 1;
        loop {
            match step() {
                Err(LedgerError::WriteConflict { .. }) if attempt < attempts => {
                    tracing::warn!(key, attempt, "write conflict, re-reading");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    fn parse_create_user_args(&self, args: &[String]) -> Result<UserRecord, LedgerError> {
        let arity = self.profile.user_arity();
        if args.len() != arity {
            return Err(ContractViolation::InvalidArity {
                operation: OP_CREATE_USER,
                expected: user_arity_text(self.profile.user_keying, false),
                got: args.len(),
            }
            .into());
        }
        require_non_empty(OP_CREATE_USER, args)?;
        let a = normalized(args);
        let record = match self.profile.user_keying {
            UserKeying::Address => UserRecord::v1(
                None,
                a[0].clone(),
                a[1].clone(),
                a[2].clone(),
                a[3].clone(),
            )?,
            UserKeying::Id => UserRecord::v1(
                Some(a[0].clone()),
                a[1].clone(),
                a[2].clone(),
                a[3].clone(),
                a[4].clone(),
            )?,
        };
        Ok(record)
    }

    fn parse_modify_user_args(
        &self,
        args: &[String],
    ) -> Result<(String, UserProfileUpdate), LedgerError> {
        let arity = self.profile.user_arity();
        if args.len() != arity && args.len() != arity + 1 {
            return Err(ContractViolation::InvalidArity {
                operation: OP_MODIFY_USER,
                expected: user_arity_text(self.profile.user_keying, true),
                got: args.len(),
            }
            .into());
        }
        require_non_empty(OP_MODIFY_USER, args)?;
        let a = normalized(args);
        // Id profile leads with the id; the address that follows is ignored.
        let (key, fields) = match self.profile.user_keying {
            UserKeying::Address => (a[2].clone(), &a[..]),
            UserKeying::Id => (a[0].clone(), &a[1..]),
        };
        let update = UserProfileUpdate {
            department: fields[0].clone(),
            user_name: fields[1].clone(),
            role: fields[3].clone(),
            content: fields.get(4).cloned(),
        };
        Ok((key, update))
    }

    fn parse_modify_data_args(
        &self,
        args: &[String],
    ) -> Result<(String, DataTransition), LedgerError> {
        let review_len = self.profile.review_field_count();
        let (id, mode, fields): (&String, &str, &[String]) = match self.profile.modify_mode {
            ModifyMode::ByArity => {
                if args.len() == 1 + review_len {
                    (&args[0], MODE_REVIEW, &args[1..])
                } else if args.len() == 3 {
                    (&args[0], MODE_OPERATE, &args[1..])
                } else {
                    return Err(self.modify_arity_error(args.len()));
                }
            }
            ModifyMode::ByModeToken => {
                if args.len() < 2 {
                    return Err(self.modify_arity_error(args.len()));
                }
                require_non_empty(OP_MODIFY_DATA, args)?;
                let mode = normalize_arg(&args[1]);
                let expected = match mode.as_str() {
                    MODE_REVIEW => review_len,
                    MODE_OPERATE => 2,
                    _ => {
                        return Err(LedgerError::InvalidOperation {
                            name: format!("{OP_MODIFY_DATA} mode {mode}"),
                        })
                    }
                };
                if args.len() != 2 + expected {
                    return Err(self.modify_arity_error(args.len()));
                }
                let mode = if mode == MODE_REVIEW {
                    MODE_REVIEW
                } else {
                    MODE_OPERATE
                };
                (&args[0], mode, &args[2..])
            }
        };
        require_non_empty(OP_MODIFY_DATA, args)?;
        let id = normalize_arg(id);
        let f = normalized(fields);
        let transition = if mode == MODE_REVIEW {
            let review = ReviewInput {
                reviewer: f[0].clone(),
                review_time: f[1].clone(),
                verdict: ReviewVerdict::parse(&f[2])?,
                review_department: f.get(3).cloned(),
            };
            review.validate()?;
            DataTransition::Review(review)
        } else {
            let operate = OperateInput {
                operate_time: f[0].clone(),
                content: f[1].clone(),
            };
            operate.validate()?;
            DataTransition::Operate(operate)
        };
        Ok((id, transition))
    }

    fn modify_arity_error(&self, got: usize) -> LedgerError {
        let expected = match (self.profile.modify_mode, self.profile.review_department) {
            (ModifyMode::ByArity, true) => "5 for review, 3 for operate",
            (ModifyMode::ByArity, false) => "4 for review, 3 for operate",
            (ModifyMode::ByModeToken, true) => "6 for review, 4 for operate",
            (ModifyMode::ByModeToken, false) => "5 for review, 4 for operate",
        };
        ContractViolation::InvalidArity {
            operation: OP_MODIFY_DATA,
            expected,
            got,
        }
        .into()
    }
}

/// The state machine proper. Pure: decides and produces the next record.
pub fn apply_transition(
    mut record: DataRecord,
    transition: &DataTransition,
) -> Result<DataRecord, LedgerError> {
    match transition {
        DataTransition::Review(review) => {
            if !(record.un_reviewed() && record.un_operated()) {
                tracing::warn!(key = %record.id, state = record.state().as_str(), "review refused");
                return Err(LedgerError::IllegalTransition {
                    id: record.id,
                    reason: reason::ALREADY_REVIEWED_OR_OPERATED,
                });
            }
            record.reviewer = review.reviewer.clone();
            record.review_time = review.review_time.clone();
            record.review_result = review.verdict.as_str().to_string();
            if let Some(d) = &review.review_department {
                record.review_department = d.clone();
            }
        }
        DataTransition::Operate(operate) => {
            if !record.un_operated() || record.un_reviewed() {
                tracing::warn!(key = %record.id, state = record.state().as_str(), "operate refused");
                return Err(LedgerError::IllegalTransition {
                    id: record.id,
                    reason: reason::OPERATED_OR_NOT_REVIEWED,
                });
            }
            if record.is_rejected() {
                tracing::warn!(key = %record.id, "operate refused on rejected opinion");
                return Err(LedgerError::RejectedOpinion { id: record.id });
            }
            record.operate_time = operate.operate_time.clone();
            record.content = operate.content.clone();
        }
    }
    Ok(record)
}

fn parse_create_data_args(args: &[String]) -> Result<DataRecordInput, LedgerError> {
    if args.len() != 6 && args.len() != 7 {
        return Err(ContractViolation::InvalidArity {
            operation: OP_CREATE_DATA,
            expected: "6 for records with opinion, 7 for records without opinion",
            got: args.len(),
        }
        .into());
    }
    require_non_empty(OP_CREATE_DATA, args)?;
    let a = normalized(args);
    let phase = if a.len() == 6 {
        SubmissionPhase::Opinion {
            opinion_time: a[5].clone(),
        }
    } else {
        SubmissionPhase::Operated {
            operate_time: a[5].clone(),
            content: a[6].clone(),
        }
    };
    Ok(DataRecordInput::v1(
        a[0].clone(),
        a[1].clone(),
        a[2].clone(),
        a[3].clone(),
        a[4].clone(),
        phase,
    )?)
}

fn normalized(args: &[String]) -> Vec<String> {
    args.iter().map(|a| normalize_arg(a)).collect()
}

fn user_arity_text(keying: UserKeying, modify: bool) -> &'static str {
    match (keying, modify) {
        (UserKeying::Address, false) => "4",
        (UserKeying::Address, true) => "4, or 5 with content",
        (UserKeying::Id, false) => "5",
        (UserKeying::Id, true) => "5, or 6 with content",
    }
}
