#![doc = include_str!("../README.md")]
#![deny(clippy::all)]

use std::path::PathBuf;

use itertools::Itertools;

pub use cosim_schema as schema;

pub mod archive;
pub mod binding;
pub mod description;
pub mod model;
pub mod platform;
pub mod session;
pub mod structure;

pub use archive::{ArchiveBuilder, FmuArchive};
pub use binding::{BindingLoader, Capability, ModelBinding, NativeBinding, NativeLoader, Stage};
pub use description::ModelDescriptionGenerator;
pub use model::{Causality, ModelDescriptor, PortDescriptor, PortType, Value};
pub use platform::Platform;
pub use session::{SessionState, SimulationSession};
pub use structure::{Connection, PortRef, SimulationStructure};

use binding::Fmi2Error;

/// One failing instance inside a multi-instance operation.
#[derive(Debug)]
pub struct InstanceFailure {
    pub instance: String,
    pub error: Error,
}

impl std::fmt::Display for InstanceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.instance, self.error)
    }
}

fn failure_list(failures: &[InstanceFailure]) -> String {
    failures.iter().join("; ")
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Cannot load native component {path:?}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("Native component {library} does not export {symbol}")]
    SymbolMissing { library: String, symbol: String },

    #[error("Model {model_identifier} did not write a usable description: {reason}")]
    DescriptionWrite {
        model_identifier: String,
        reason: String,
    },

    #[error("Packaging failed: {0}")]
    Packaging(String),

    #[error("{instance}: {stage} returned {status}")]
    NativeCall {
        instance: String,
        stage: Stage,
        status: Fmi2Error,
    },

    #[error("{instance}: value reference {value_reference} rejected ({status})")]
    InvalidReference {
        instance: String,
        value_reference: u32,
        status: Fmi2Error,
    },

    #[error("{instance} has not been instantiated")]
    NotInstantiated { instance: String },

    #[error("Unknown port {instance}.{port}")]
    UnknownPort { instance: String, port: String },

    #[error("Port {port} has type {found}, not {expected}")]
    PortType {
        port: String,
        expected: PortType,
        found: PortType,
    },

    #[error("Outputs of {instance} are not readable before initialization mode is left")]
    NotReady { instance: String },

    #[error("Initialization failed: {}", failure_list(.failures))]
    Initialization { failures: Vec<InstanceFailure> },

    #[error("Step at t={time} failed in {instance}")]
    Step {
        instance: String,
        time: f64,
        source: Box<Error>,
    },

    #[error("Propagating {connection} failed")]
    Propagation {
        connection: String,
        source: Box<Error>,
    },

    #[error("Session is faulted after a failure in {instance}")]
    Faulted { instance: String },

    #[error("Session is terminated")]
    SessionClosed,

    #[error("{operation} is not allowed in state {state:?}")]
    StateViolation {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Step to t={time} passes the stop time {stop_time}")]
    StopTimeReached { time: f64, stop_time: f64 },

    #[error("Termination failed: {}", failure_list(.failures))]
    Termination { failures: Vec<InstanceFailure> },

    #[error("Step size must be positive, got {0}")]
    InvalidStepSize(f64),

    #[error("Instance {0} already exists")]
    DuplicateInstance(String),

    #[error("Model identifier {model_identifier} is already bound to {existing:?}")]
    ModelIdentifierConflict {
        model_identifier: String,
        existing: PathBuf,
    },

    #[error("Unknown instance {0}")]
    UnknownInstance(String),

    #[error("Invalid port reference '{0}', expected 'instance.port'")]
    InvalidPortRef(String),

    #[error("Port {port} has causality {found}, a connection needs {expected}")]
    Causality {
        port: String,
        expected: Causality,
        found: Causality,
    },

    #[error("Cannot connect {source_port} ({source_type}) to {target_port} ({target_type})")]
    TypeMismatch {
        source_port: String,
        source_type: PortType,
        target_port: String,
        target_type: PortType,
    },

    #[error("Input {target} is already driven by {existing}")]
    FanIn { target: String, existing: String },

    #[error("TypesPlatform of loaded API ({0}) doesn't match expected (default)")]
    TypesPlatformMismatch(String),

    #[error("FMI version of loaded API ({found}) doesn't match expected ({expected})")]
    FmiVersionMismatch { found: String, expected: String },

    #[error("Unsupported FMI version: {0}")]
    UnsupportedFmiVersion(String),

    #[error("FMU archive structure is not as expected: {0}")]
    ArchiveStructure(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Nul(#[from] std::ffi::NulError),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Schema(#[from] cosim_schema::Error),
}
