use std::fmt;

use crate::engine::EngineError;
use crate::remediation::RemediationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    InvalidArgs,
    Failed,
    UpstreamFailed,
}

impl ExitCode {
    pub const fn as_i32(self) -> i32 {
        match self {
            ExitCode::Success => 0,
            ExitCode::InvalidArgs => 2,
            ExitCode::Failed => 10,
            ExitCode::UpstreamFailed => 20,
        }
    }
}

#[derive(Debug)]
pub struct ExitError {
    pub code: ExitCode,
    pub err: anyhow::Error,
}

impl ExitError {
    pub fn new(code: ExitCode, err: anyhow::Error) -> Self {
        Self { code, err }
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.err.fmt(f)
    }
}

impl std::error::Error for ExitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.err.source()
    }
}

pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(exit) = err.downcast_ref::<ExitError>() {
        return exit.code.as_i32();
    }
    if let Some(engine) = err.downcast_ref::<EngineError>() {
        return engine_exit_code(engine).as_i32();
    }
    ExitCode::Failed.as_i32()
}

pub fn engine_exit_code(err: &EngineError) -> ExitCode {
    match err {
        EngineError::Api(_)
        | EngineError::Remediation(RemediationError::Api { .. })
        | EngineError::UnloggedFailure { .. } => ExitCode::UpstreamFailed,
        EngineError::Forbidden { .. }
        | EngineError::OutOfScope { .. }
        | EngineError::InvalidPassword(_) => ExitCode::InvalidArgs,
        EngineError::Remediation(_)
        | EngineError::UnknownEvent(_)
        | EngineError::NoFindingKey { .. } => ExitCode::Failed,
    }
}

pub fn invalid_args(message: impl Into<String>) -> anyhow::Error {
    ExitError::new(ExitCode::InvalidArgs, anyhow::anyhow!(message.into())).into()
}

pub fn invalid_args_err(err: anyhow::Error) -> anyhow::Error {
    ExitError::new(ExitCode::InvalidArgs, err).into()
}

pub fn upstream(message: impl Into<String>) -> anyhow::Error {
    ExitError::new(ExitCode::UpstreamFailed, anyhow::anyhow!(message.into())).into()
}

pub fn failed(message: impl Into<String>) -> anyhow::Error {
    ExitError::new(ExitCode::Failed, anyhow::anyhow!(message.into())).into()
}
