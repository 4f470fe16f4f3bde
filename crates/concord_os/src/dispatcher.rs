#![forbid(unsafe_code)]

use concord_engines::{EngineProfile, LifecycleEngine, QueryBuilder};
use concord_kernel_contracts::record::DocType;
use concord_kernel_contracts::LedgerError;
use concord_storage::repo::RecordRepository;

use crate::config::{ConcordConfig, ConfigError};

/// Closed set of invocable operations. Legacy names parse as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Init,
    CreateDataRecord,
    CreateUserRecord,
    ModifyDataRecord,
    ModifyUserRecord,
    QueryById,
    QueryByAddress,
    QueryByObject,
    QueryByUser,
    QueryByDepartment,
    QueryWithQueryString,
}

impl Operation {
    pub const ALL: [Operation; 11] = [
        Operation::Init,
        Operation::CreateDataRecord,
        Operation::CreateUserRecord,
        Operation::ModifyDataRecord,
        Operation::ModifyUserRecord,
        Operation::QueryById,
        Operation::QueryByAddress,
        Operation::QueryByObject,
        Operation::QueryByUser,
        Operation::QueryByDepartment,
        Operation::QueryWithQueryString,
    ];

    pub fn parse(name: &str) -> Result<Self, LedgerError> {
        let op = match name {
            "init" => Operation::Init,
            "createDataRecord" | "initDataRecord" => Operation::CreateDataRecord,
            "createUserRecord" | "initUserRecord" => Operation::CreateUserRecord,
            "modifyDataRecord" => Operation::ModifyDataRecord,
            "modifyUserRecord" => Operation::ModifyUserRecord,
            "queryById" | "queryDataRecordById" => Operation::QueryById,
            "queryByAddress" | "queryUserRecordByAddr" => Operation::QueryByAddress,
            "queryByObject" | "queryDataRecordByObject" => Operation::QueryByObject,
            "queryByUser" | "queryDataRecordByUser" => Operation::QueryByUser,
            "queryByDepartment" | "queryUserRecordByDept" => Operation::QueryByDepartment,
            "queryWithQueryString" => Operation::QueryWithQueryString,
            _ => {
                return Err(LedgerError::InvalidOperation {
                    name: name.to_string(),
                })
            }
        };
        Ok(op)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Init => "init",
            Operation::CreateDataRecord => "createDataRecord",
            Operation::CreateUserRecord => "createUserRecord",
            Operation::ModifyDataRecord => "modifyDataRecord",
            Operation::ModifyUserRecord => "modifyUserRecord",
            Operation::QueryById => "queryById",
            Operation::QueryByAddress => "queryByAddress",
            Operation::QueryByObject => "queryByObject",
            Operation::QueryByUser => "queryByUser",
            Operation::QueryByDepartment => "queryByDepartment",
            Operation::QueryWithQueryString => "queryWithQueryString",
        }
    }
}

/// Host-style response envelope for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResponse {
    pub status: i32,
    pub message: String,
    pub payload: Vec<u8>,
    pub error_code: Option<&'static str>,
}

impl InvocationResponse {
    pub const OK: i32 = 200;
    pub const ERROR: i32 = 500;

    pub fn success(payload: Vec<u8>) -> Self {
        Self {
            status: Self::OK,
            message: String::new(),
            payload,
            error_code: None,
        }
    }

    pub fn failure(err: &LedgerError) -> Self {
        Self {
            status: Self::ERROR,
            message: err.to_string(),
            payload: Vec::new(),
            error_code: Some(err.error_code()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Self::OK
    }
}

impl From<Result<Vec<u8>, LedgerError>> for InvocationResponse {
    fn from(r: Result<Vec<u8>, LedgerError>) -> Self {
        match r {
            Ok(payload) => Self::success(payload),
            Err(e) => Self::failure(&e),
        }
    }
}

/// Routes named invocations to the lifecycle engine or the query builder.
/// Holds configuration only; the repository comes in with each call.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    engine: LifecycleEngine,
    queries: QueryBuilder,
}

impl Dispatcher {
    pub fn new(profile: EngineProfile) -> Self {
        Self {
            engine: LifecycleEngine::new(profile),
            queries: QueryBuilder::new(profile.envelope),
        }
    }

    pub fn from_config(config: &ConcordConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config.profile))
    }

    pub fn invoke<R>(&self, repo: &mut R, name: &str, args: &[String]) -> InvocationResponse
    where
        R: RecordRepository + ?Sized,
    {
        let span = tracing::debug_span!("invoke", op = name, argc = args.len());
        let _enter = span.enter();
        let out = self.run(repo, name, args);
        if let Err(e) = &out {
            tracing::info!(code = e.error_code(), error = %e, "invocation failed");
        }
        out.into()
    }

    pub fn run<R>(&self, repo: &mut R, name: &str, args: &[String]) -> Result<Vec<u8>, LedgerError>
    where
        R: RecordRepository + ?Sized,
    {
        match Operation::parse(name)? {
            Operation::Init => Ok(Vec::new()),
            Operation::CreateDataRecord => self
                .engine
                .create_data_record(repo, args)
                .map(|_| Vec::new()),
            Operation::CreateUserRecord => self
                .engine
                .create_user_record(repo, args)
                .map(|_| Vec::new()),
            Operation::ModifyDataRecord => self
                .engine
                .modify_data_record(repo, args)
                .map(|_| Vec::new()),
            Operation::ModifyUserRecord => self
                .engine
                .modify_user_record(repo, args)
                .map(|_| Vec::new()),
            Operation::QueryById => self.queries.query_by_key(&*repo, DocType::DataRecord, args),
            Operation::QueryByAddress => self.queries.query_by_key(&*repo, DocType::UserRecord, args),
            Operation::QueryByObject => self.queries.query_by_object(&*repo, args),
            Operation::QueryByUser => self.queries.query_by_user(&*repo, args),
            Operation::QueryByDepartment => self.queries.query_by_department(&*repo, args),
            Operation::QueryWithQueryString => self.queries.query_with_string(&*repo, args),
        }
    }
}
