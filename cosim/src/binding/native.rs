use std::{
    ffi::{CStr, CString},
    path::{Path, PathBuf},
};

use cosim_sys::fmi2::{self as binding, logger};

use super::{BindingLoader, Capability, Fmi2Res, Fmi2Status, ModelBinding, Stage};
use crate::Error;

/// Fetch an entry point from the symbol table, or fail with [`Error::SymbolMissing`].
macro_rules! sym {
    ($self:ident, $name:ident) => {
        $self
            .binding
            .$name
            .ok_or_else(|| $self.missing(stringify!($name)))?
    };
}

/// Loads components through the [`binding::Fmi2Binding`] symbol table.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeLoader;

impl BindingLoader for NativeLoader {
    type Binding = NativeBinding;

    fn load(&self, path: &Path) -> Result<NativeBinding, Error> {
        NativeBinding::load(path)
    }
}

fn default_callbacks() -> binding::fmi2CallbackFunctions {
    binding::fmi2CallbackFunctions {
        logger: Some(logger::callback_logger_handler as _),
        allocateMemory: Some(libc::calloc),
        freeMemory: Some(libc::free),
        stepFinished: None,
        componentEnvironment: std::ptr::null_mut::<std::os::raw::c_void>(),
    }
}

/// One loaded native library and, once instantiated, the component created from it.
///
/// Dropping the binding frees the component and unloads the library.
pub struct NativeBinding {
    /// Instance name once instantiated, library file stem before.
    name: String,
    path: PathBuf,
    /// Raw FMI 2.0 bindings
    binding: binding::Fmi2Binding,
    /// Pointer to the raw FMI 2.0 instance, null when not instantiated
    component: binding::fmi2Component,
    /// Callbacks struct, must outlive the component
    #[allow(dead_code)]
    callbacks: Box<binding::fmi2CallbackFunctions>,
}

impl NativeBinding {
    /// Load the library at `path` and check that every required entry point is exported.
    pub fn load(path: &Path) -> Result<Self, Error> {
        log::trace!("Loading shared library {path:?}");
        let binding = unsafe { binding::Fmi2Binding::new(path) }.map_err(|e| Error::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        if let Some(symbol) = binding::REQUIRED_SYMBOLS
            .iter()
            .find(|symbol| !binding.has_symbol(symbol))
        {
            return Err(Error::SymbolMissing {
                library: name,
                symbol: symbol.to_string(),
            });
        }
        log::debug!("Loaded {name} from {path:?}: {binding:?}");

        Ok(Self {
            name,
            path: path.to_path_buf(),
            binding,
            component: std::ptr::null_mut(),
            callbacks: Box::new(default_callbacks()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_instantiated(&self) -> bool {
        !self.component.is_null()
    }

    fn missing(&self, symbol: &str) -> Error {
        Error::SymbolMissing {
            library: self.name.clone(),
            symbol: symbol.to_owned(),
        }
    }

    fn component(&self) -> Result<binding::fmi2Component, Error> {
        if self.component.is_null() {
            Err(Error::NotInstantiated {
                instance: self.name.clone(),
            })
        } else {
            Ok(self.component)
        }
    }

    fn check(&self, stage: Stage, status: binding::fmi2Status) -> Result<(), Error> {
        match Fmi2Status(status).ok() {
            Ok(Fmi2Res::OK) => Ok(()),
            Ok(Fmi2Res::Warning) => {
                log::warn!("{}: {stage} returned a warning", self.name);
                Ok(())
            }
            Err(status) => Err(Error::NativeCall {
                instance: self.name.clone(),
                stage,
                status,
            }),
        }
    }

    fn check_value(&self, vr: u32, status: binding::fmi2Status) -> Result<(), Error> {
        let status = Fmi2Status(status);
        if status.is_error() {
            log::error!("{}: access to value reference {vr} failed", self.name);
        }
        status.ok().map(|_| ()).map_err(|status| Error::InvalidReference {
            instance: self.name.clone(),
            value_reference: vr,
            status,
        })
    }

    fn static_string(
        &self,
        f: unsafe extern "C" fn() -> *const std::os::raw::c_char,
    ) -> String {
        let ptr = unsafe { f() };
        if ptr.is_null() {
            String::new()
        } else {
            unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
        }
    }
}

impl Drop for NativeBinding {
    fn drop(&mut self) {
        self.free();
    }
}

impl std::fmt::Debug for NativeBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "NativeBinding {} {{{:?}, {:?}}}",
            self.name, self.path, self.component,
        )
    }
}

impl ModelBinding for NativeBinding {
    fn name(&self) -> &str {
        &self.name
    }

    fn types_platform(&self) -> Result<String, Error> {
        let f = sym!(self, fmi2GetTypesPlatform);
        Ok(self.static_string(f))
    }

    fn version(&self) -> Result<String, Error> {
        let f = sym!(self, fmi2GetVersion);
        Ok(self.static_string(f))
    }

    fn has_capability(&self, capability: Capability) -> bool {
        match capability {
            Capability::WriteDescription => self.binding.write_description.is_some(),
            Capability::Binary => {
                self.binding.fmi2GetBinary.is_some() && self.binding.fmi2SetBinary.is_some()
            }
        }
    }

    fn write_description(&mut self, location: &Path, model_identifier: &str) -> Result<(), Error> {
        let f = sym!(self, write_description);
        let location = CString::new(location.to_string_lossy().as_bytes())?;
        let model_identifier = CString::new(model_identifier)?;
        log::trace!("{}: write_description({location:?})", self.name);
        unsafe { f(location.as_ptr(), model_identifier.as_ptr()) };
        Ok(())
    }

    fn instantiate(
        &mut self,
        instance_name: &str,
        guid: &str,
        resource_url: &str,
        logging_on: bool,
    ) -> Result<(), Error> {
        let f = sym!(self, fmi2Instantiate);
        if self.is_instantiated() {
            log::warn!("{}: already instantiated, freeing the old component", self.name);
            self.free();
        }

        let c_name = CString::new(instance_name)?;
        let guid = CString::new(guid)?;
        let resource_url = CString::new(resource_url)?;

        let component = unsafe {
            let callback_functions = &*self.callbacks as *const binding::fmi2CallbackFunctions;
            f(
                c_name.as_ptr(),
                binding::fmi2Type_fmi2CoSimulation,
                guid.as_ptr(),
                resource_url.as_ptr(),
                callback_functions,
                binding::fmi2False,
                logging_on as binding::fmi2Boolean,
            )
        };
        self.name = instance_name.to_owned();
        if component.is_null() {
            return Err(Error::NativeCall {
                instance: self.name.clone(),
                stage: Stage::Instantiate,
                status: super::Fmi2Error::Error,
            });
        }
        log::trace!("Created FMI2.0 CS component {component:?}");
        self.component = component;

        if logging_on {
            let f = sym!(self, fmi2SetDebugLogging);
            let status = unsafe { f(component, binding::fmi2True, 0, std::ptr::null()) };
            self.check(Stage::SetDebugLogging, status)?;
        }
        Ok(())
    }

    fn setup_experiment(
        &mut self,
        tolerance: Option<f64>,
        start_time: f64,
        stop_time: Option<f64>,
    ) -> Result<(), Error> {
        let f = sym!(self, fmi2SetupExperiment);
        let status = unsafe {
            f(
                self.component()?,
                tolerance.is_some() as binding::fmi2Boolean,
                tolerance.unwrap_or(0.0),
                start_time,
                stop_time.is_some() as binding::fmi2Boolean,
                stop_time.unwrap_or(0.0),
            )
        };
        self.check(Stage::SetupExperiment, status)
    }

    fn enter_initialization_mode(&mut self) -> Result<(), Error> {
        let f = sym!(self, fmi2EnterInitializationMode);
        let status = unsafe { f(self.component()?) };
        self.check(Stage::EnterInitializationMode, status)
    }

    fn exit_initialization_mode(&mut self) -> Result<(), Error> {
        let f = sym!(self, fmi2ExitInitializationMode);
        let status = unsafe { f(self.component()?) };
        self.check(Stage::ExitInitializationMode, status)
    }

    fn do_step(&mut self, current_time: f64, step_size: f64) -> Result<(), Error> {
        let f = sym!(self, fmi2DoStep);
        let status = unsafe { f(self.component()?, current_time, step_size, binding::fmi2True) };
        self.check(Stage::DoStep, status)
    }

    fn terminate(&mut self) -> Result<(), Error> {
        let f = sym!(self, fmi2Terminate);
        let status = unsafe { f(self.component()?) };
        self.check(Stage::Terminate, status)
    }

    fn reset(&mut self) -> Result<(), Error> {
        let f = sym!(self, fmi2Reset);
        let status = unsafe { f(self.component()?) };
        self.check(Stage::Reset, status)
    }

    fn free(&mut self) {
        if self.component.is_null() {
            return;
        }
        log::trace!("Freeing component {:?}", self.component);
        if let Some(f) = self.binding.fmi2FreeInstance {
            unsafe { f(self.component) };
        }
        self.component = std::ptr::null_mut();
    }

    fn get_real(&mut self, vr: u32) -> Result<f64, Error> {
        let f = sym!(self, fmi2GetReal);
        let mut value: binding::fmi2Real = 0.0;
        let status = unsafe { f(self.component()?, &vr, 1, &mut value) };
        self.check_value(vr, status)?;
        Ok(value)
    }

    fn get_integer(&mut self, vr: u32) -> Result<i32, Error> {
        let f = sym!(self, fmi2GetInteger);
        let mut value: binding::fmi2Integer = 0;
        let status = unsafe { f(self.component()?, &vr, 1, &mut value) };
        self.check_value(vr, status)?;
        Ok(value)
    }

    fn get_boolean(&mut self, vr: u32) -> Result<bool, Error> {
        let f = sym!(self, fmi2GetBoolean);
        let mut value: binding::fmi2Boolean = binding::fmi2False;
        let status = unsafe { f(self.component()?, &vr, 1, &mut value) };
        self.check_value(vr, status)?;
        Ok(value != binding::fmi2False)
    }

    fn get_string(&mut self, vr: u32) -> Result<String, Error> {
        let f = sym!(self, fmi2GetString);
        let mut value: binding::fmi2String = std::ptr::null();
        let status = unsafe { f(self.component()?, &vr, 1, &mut value) };
        self.check_value(vr, status)?;
        if value.is_null() {
            return Ok(String::new());
        }
        Ok(unsafe { CStr::from_ptr(value) }
            .to_string_lossy()
            .into_owned())
    }

    fn get_binary(&mut self, vr: u32) -> Result<Vec<u8>, Error> {
        let f = sym!(self, fmi2GetBinary);
        let mut size: usize = 0;
        let mut value: *const binding::fmi2Byte = std::ptr::null();
        let status = unsafe { f(self.component()?, &vr, 1, &mut size, &mut value) };
        self.check_value(vr, status)?;
        if value.is_null() || size == 0 {
            return Ok(Vec::new());
        }
        Ok(unsafe { std::slice::from_raw_parts(value, size) }.to_vec())
    }

    fn set_real(&mut self, vr: u32, value: f64) -> Result<(), Error> {
        let f = sym!(self, fmi2SetReal);
        let status = unsafe { f(self.component()?, &vr, 1, &value) };
        self.check_value(vr, status)
    }

    fn set_integer(&mut self, vr: u32, value: i32) -> Result<(), Error> {
        let f = sym!(self, fmi2SetInteger);
        let status = unsafe { f(self.component()?, &vr, 1, &value) };
        self.check_value(vr, status)
    }

    fn set_boolean(&mut self, vr: u32, value: bool) -> Result<(), Error> {
        let f = sym!(self, fmi2SetBoolean);
        let value = value as binding::fmi2Boolean;
        let status = unsafe { f(self.component()?, &vr, 1, &value) };
        self.check_value(vr, status)
    }

    fn set_string(&mut self, vr: u32, value: &str) -> Result<(), Error> {
        let f = sym!(self, fmi2SetString);
        let value = CString::new(value)?;
        let ptr = value.as_ptr();
        let status = unsafe { f(self.component()?, &vr, 1, &ptr) };
        self.check_value(vr, status)
    }

    fn set_binary(&mut self, vr: u32, value: &[u8]) -> Result<(), Error> {
        let f = sym!(self, fmi2SetBinary);
        let size = value.len();
        let ptr = value.as_ptr();
        let status = unsafe { f(self.component()?, &vr, 1, &size, &ptr) };
        self.check_value(vr, status)
    }
}
