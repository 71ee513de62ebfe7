//! Typed view over a native FMI 2.0 co-simulation component.

use std::path::Path;

use crate::Error;

mod native;
mod status;

pub use native::{NativeBinding, NativeLoader};
pub use status::{Fmi2Error, Fmi2Res, Fmi2Status};

/// Lifecycle stage of a native call, used to label failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    SetDebugLogging,
    Instantiate,
    SetupExperiment,
    EnterInitializationMode,
    ExitInitializationMode,
    DoStep,
    Terminate,
    Reset,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::SetDebugLogging => "fmi2SetDebugLogging",
            Stage::Instantiate => "fmi2Instantiate",
            Stage::SetupExperiment => "fmi2SetupExperiment",
            Stage::EnterInitializationMode => "fmi2EnterInitializationMode",
            Stage::ExitInitializationMode => "fmi2ExitInitializationMode",
            Stage::DoStep => "fmi2DoStep",
            Stage::Terminate => "fmi2Terminate",
            Stage::Reset => "fmi2Reset",
        };
        write!(f, "{s}")
    }
}

/// Optional entry points a component may or may not export.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    /// `write_description`
    WriteDescription,
    /// `fmi2GetBinary` and `fmi2SetBinary`
    Binary,
}

/// The typed contract of one loaded FMI 2.0 co-simulation component.
///
/// A binding starts out loaded but not instantiated. [`ModelBinding::instantiate`] creates the
/// native component, every other lifecycle call operates on it, and [`ModelBinding::free`]
/// releases it. Implementations must tolerate `free` being called more than once.
pub trait ModelBinding {
    /// Name used in log messages and errors: the instance name once instantiated, the library
    /// name before that.
    fn name(&self) -> &str;

    /// The ABI's compile-time platform tag, `"default"` for standard builds.
    fn types_platform(&self) -> Result<String, Error>;

    /// The FMI version string reported by the library.
    fn version(&self) -> Result<String, Error>;

    fn has_capability(&self, capability: Capability) -> bool;

    /// Ask the component to write its `modelDescription.xml` to `location`.
    fn write_description(&mut self, location: &Path, model_identifier: &str) -> Result<(), Error>;

    fn instantiate(
        &mut self,
        instance_name: &str,
        guid: &str,
        resource_url: &str,
        logging_on: bool,
    ) -> Result<(), Error>;

    fn setup_experiment(
        &mut self,
        tolerance: Option<f64>,
        start_time: f64,
        stop_time: Option<f64>,
    ) -> Result<(), Error>;

    fn enter_initialization_mode(&mut self) -> Result<(), Error>;

    fn exit_initialization_mode(&mut self) -> Result<(), Error>;

    fn do_step(&mut self, current_time: f64, step_size: f64) -> Result<(), Error>;

    fn terminate(&mut self) -> Result<(), Error>;

    fn reset(&mut self) -> Result<(), Error>;

    /// Release the native component. Safe to call repeatedly.
    fn free(&mut self);

    fn get_real(&mut self, vr: u32) -> Result<f64, Error>;
    fn get_integer(&mut self, vr: u32) -> Result<i32, Error>;
    fn get_boolean(&mut self, vr: u32) -> Result<bool, Error>;
    fn get_string(&mut self, vr: u32) -> Result<String, Error>;
    /// Returns a copy of the component's buffer; the caller owns the result.
    fn get_binary(&mut self, vr: u32) -> Result<Vec<u8>, Error>;

    fn set_real(&mut self, vr: u32, value: f64) -> Result<(), Error>;
    fn set_integer(&mut self, vr: u32, value: i32) -> Result<(), Error>;
    fn set_boolean(&mut self, vr: u32, value: bool) -> Result<(), Error>;
    fn set_string(&mut self, vr: u32, value: &str) -> Result<(), Error>;
    /// The component copies what it needs before returning.
    fn set_binary(&mut self, vr: u32, value: &[u8]) -> Result<(), Error>;

    /// Compare the library's types platform and FMI version against a model description.
    fn check_consistency(&self, fmi_version: &str) -> Result<(), Error> {
        let types_platform = self.types_platform()?;
        if types_platform != "default" {
            return Err(Error::TypesPlatformMismatch(types_platform));
        }
        let found = self.version()?;
        if found != fmi_version {
            return Err(Error::FmiVersionMismatch {
                found,
                expected: fmi_version.to_owned(),
            });
        }
        Ok(())
    }
}

/// Creates bindings from library paths.
///
/// Each session and archive builder holds its own loader; there is no process-wide registry of
/// loaded libraries.
pub trait BindingLoader {
    type Binding: ModelBinding;

    /// Load the library at `path`. Fails with [`Error::Load`] if it is not a loadable component
    /// and with [`Error::SymbolMissing`] if a required entry point is absent.
    fn load(&self, path: &Path) -> Result<Self::Binding, Error>;
}
