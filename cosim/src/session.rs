//! A single run of a [`SimulationStructure`].
//!
//! ```text
//! Created -> Instantiated -> Initializing -> Stepping -> Terminated
//! ```
//!
//! [`SimulationSession::instantiate`] loads and instantiates every instance,
//! [`SimulationSession::init`] sets up the experiment and enters initialization mode (instantiating
//! first when that has not happened yet), and the
//! first [`SimulationSession::step`] (or [`SimulationSession::exit_initialization`]) leaves it.
//! Each step advances every instance by the fixed step size in insertion order and then copies
//! every connected output to its input, so values produced during one interval are seen by the
//! receiving instance during the next one.

use crate::{
    binding::{BindingLoader, ModelBinding, NativeLoader},
    structure::{Connection, PortRef, SimulationStructure},
    Error, InstanceFailure, PortDescriptor, PortType, Value,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    Created,
    Instantiated,
    Initializing,
    Stepping,
    Terminated,
}

/// A live instance owned by the session.
struct Slot<B> {
    name: String,
    binding: B,
    /// Entered initialization mode, so `fmi2Terminate` is meaningful.
    initialized: bool,
    /// Left initialization mode, so outputs may be read.
    ready: bool,
}

pub struct SimulationSession<L: BindingLoader = NativeLoader> {
    structure: SimulationStructure,
    loader: L,
    slots: Vec<Slot<L::Binding>>,
    state: SessionState,
    step_size: f64,
    start_time: f64,
    stop_time: Option<f64>,
    tolerance: Option<f64>,
    logging_on: bool,
    steps: u64,
    /// Instance whose failure stopped forward progress.
    faulted: Option<String>,
}

impl SimulationSession<NativeLoader> {
    /// Create a session over a private copy of `structure`, loading native libraries.
    pub fn new(structure: &SimulationStructure, step_size: f64) -> Result<Self, Error> {
        Self::with_loader(structure, step_size, NativeLoader)
    }
}

impl<L: BindingLoader> SimulationSession<L> {
    /// Create a session that obtains its bindings from `loader`.
    pub fn with_loader(
        structure: &SimulationStructure,
        step_size: f64,
        loader: L,
    ) -> Result<Self, Error> {
        if !(step_size.is_finite() && step_size > 0.0) {
            return Err(Error::InvalidStepSize(step_size));
        }
        Ok(Self {
            structure: structure.clone(),
            loader,
            slots: Vec::new(),
            state: SessionState::Created,
            step_size,
            start_time: 0.0,
            stop_time: None,
            tolerance: None,
            logging_on: false,
            steps: 0,
            faulted: None,
        })
    }

    pub fn with_start_time(mut self, start_time: f64) -> Self {
        self.start_time = start_time;
        self
    }

    /// Steps that would move past `stop_time` fail with [`Error::StopTimeReached`].
    pub fn with_stop_time(mut self, stop_time: f64) -> Self {
        self.stop_time = Some(stop_time);
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    /// Enable native debug logging for every instance.
    pub fn with_logging(mut self, logging_on: bool) -> Self {
        self.logging_on = logging_on;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// `start_time + steps * step_size`, computed from the step count so no rounding error
    /// accumulates.
    pub fn current_time(&self) -> f64 {
        self.start_time + self.steps as f64 * self.step_size
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn stop_time(&self) -> Option<f64> {
        self.stop_time
    }

    pub fn steps_taken(&self) -> u64 {
        self.steps
    }

    pub fn structure(&self) -> &SimulationStructure {
        &self.structure
    }

    pub fn instance_names(&self) -> impl Iterator<Item = &str> {
        self.structure.instance_names()
    }

    /// The instance whose failure faulted the session, if any.
    pub fn faulted_instance(&self) -> Option<&str> {
        self.faulted.as_deref()
    }

    pub fn types_platform(&self, instance: &str) -> Result<String, Error> {
        self.ensure_open()?;
        let slot = self
            .slots
            .iter()
            .find(|slot| slot.name == instance)
            .ok_or_else(|| self.not_loaded(instance))?;
        slot.binding.types_platform()
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.state == SessionState::Terminated {
            Err(Error::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn require(&self, operation: &'static str, expected: SessionState) -> Result<(), Error> {
        self.ensure_open()?;
        if self.state != expected {
            return Err(Error::StateViolation {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    fn not_loaded(&self, instance: &str) -> Error {
        if self.structure.instance(instance).is_some() {
            Error::NotReady {
                instance: instance.to_owned(),
            }
        } else {
            Error::UnknownInstance(instance.to_owned())
        }
    }

    /// Load and instantiate every instance in insertion order.
    ///
    /// All or nothing: if any instance fails, the ones already created are freed and unloaded
    /// before the error is returned, and the session stays in `Created`.
    pub fn instantiate(&mut self) -> Result<(), Error> {
        self.require("instantiate", SessionState::Created)?;

        let mut slots = Vec::with_capacity(self.structure.len());
        for (name, descriptor) in self.structure.instances() {
            log::debug!(
                "Instantiating '{name}' from {:?}",
                descriptor.library_path()
            );
            let created = self
                .loader
                .load(descriptor.library_path())
                .and_then(|mut binding| {
                    if let Err(e) = binding.check_consistency(descriptor.fmi_version()) {
                        log::warn!("{name}: {e}");
                    }
                    let resource_url = descriptor.resource_url()?;
                    binding.instantiate(name, descriptor.guid(), &resource_url, self.logging_on)?;
                    Ok(binding)
                });
            match created {
                Ok(binding) => slots.push(Slot {
                    name: name.to_owned(),
                    binding,
                    initialized: false,
                    ready: false,
                }),
                Err(e) => {
                    log::error!("Instantiating '{name}' failed: {e}");
                    for mut slot in slots.into_iter().rev() {
                        slot.binding.free();
                    }
                    return Err(e);
                }
            }
        }

        self.slots = slots;
        self.state = SessionState::Instantiated;
        Ok(())
    }

    /// Set up the experiment and enter initialization mode on every instance.
    ///
    /// A session still in `Created` is instantiated first, with the same all-or-nothing rollback
    /// as [`instantiate`](Self::instantiate).
    ///
    /// Every instance is attempted. If any fail, the failures are returned together and the
    /// session is faulted: it can still be inspected and terminated, but not stepped.
    pub fn init(&mut self) -> Result<(), Error> {
        if self.state == SessionState::Created {
            self.instantiate()?;
        }
        self.require("init", SessionState::Instantiated)?;

        let (tolerance, start_time, stop_time) = (self.tolerance, self.start_time, self.stop_time);
        let mut failures = Vec::new();
        for slot in &mut self.slots {
            log::trace!("{}: setup experiment, start {start_time}", slot.name);
            let res = slot
                .binding
                .setup_experiment(tolerance, start_time, stop_time)
                .and_then(|_| slot.binding.enter_initialization_mode());
            match res {
                Ok(()) => slot.initialized = true,
                Err(error) => failures.push(InstanceFailure {
                    instance: slot.name.clone(),
                    error,
                }),
            }
        }

        self.state = SessionState::Initializing;
        self.fault_on(failures)
    }

    /// Leave initialization mode on every instance. [`step`](Self::step) does this implicitly.
    pub fn exit_initialization(&mut self) -> Result<(), Error> {
        self.require("exit_initialization", SessionState::Initializing)?;
        if let Some(instance) = &self.faulted {
            return Err(Error::Faulted {
                instance: instance.clone(),
            });
        }

        let mut failures = Vec::new();
        for slot in &mut self.slots {
            match slot.binding.exit_initialization_mode() {
                Ok(()) => slot.ready = true,
                Err(error) => failures.push(InstanceFailure {
                    instance: slot.name.clone(),
                    error,
                }),
            }
        }

        self.fault_on(failures)?;
        self.state = SessionState::Stepping;
        Ok(())
    }

    fn fault_on(&mut self, failures: Vec<InstanceFailure>) -> Result<(), Error> {
        match failures.first() {
            None => Ok(()),
            Some(first) => {
                self.faulted = Some(first.instance.clone());
                Err(Error::Initialization { failures })
            }
        }
    }

    /// Advance every instance by one step, then propagate all connections.
    ///
    /// Returns the new current time. The time only advances if every instance stepped
    /// successfully; the first failing instance stops the step and faults the session.
    pub fn step(&mut self) -> Result<f64, Error> {
        self.ensure_open()?;
        match self.state {
            SessionState::Created | SessionState::Instantiated => {
                return Err(Error::StateViolation {
                    operation: "step",
                    state: self.state,
                })
            }
            _ => {}
        }
        if let Some(instance) = &self.faulted {
            return Err(Error::Faulted {
                instance: instance.clone(),
            });
        }
        if self.state == SessionState::Initializing {
            self.exit_initialization()?;
        }

        let time = self.current_time();
        let next = self.start_time + (self.steps + 1) as f64 * self.step_size;
        if let Some(stop_time) = self.stop_time {
            if next - stop_time > self.step_size * 1e-9 {
                return Err(Error::StopTimeReached {
                    time: next,
                    stop_time,
                });
            }
        }

        for slot in &mut self.slots {
            log::trace!("{}: doStep({time}, {})", slot.name, self.step_size);
            if let Err(e) = slot.binding.do_step(time, self.step_size) {
                log::error!("{}: step at t={time} failed: {e}", slot.name);
                self.faulted = Some(slot.name.clone());
                return Err(Error::Step {
                    instance: slot.name.clone(),
                    time,
                    source: Box::new(e),
                });
            }
        }
        self.steps += 1;

        let connections = self.structure.connections().to_vec();
        for connection in &connections {
            if let Err(e) = self.propagate(connection) {
                self.faulted = Some(connection.target.instance.clone());
                return Err(Error::Propagation {
                    connection: connection.to_string(),
                    source: Box::new(e),
                });
            }
        }

        Ok(self.current_time())
    }

    fn propagate(&mut self, connection: &Connection) -> Result<(), Error> {
        let value = self.read(&connection.source, None)?;
        log::trace!("{connection}: {value}");
        self.write(&connection.target, value)
    }

    /// Resolve a port and the slot index owning it.
    fn resolve(&self, port_ref: &PortRef) -> Result<(usize, PortDescriptor), Error> {
        let port = self.structure.port(port_ref).map_err(|e| match e {
            Error::UnknownInstance(_) => Error::UnknownPort {
                instance: port_ref.instance.clone(),
                port: port_ref.port.clone(),
            },
            other => other,
        })?;
        let index = self
            .slots
            .iter()
            .position(|slot| slot.name == port_ref.instance)
            .ok_or_else(|| self.not_loaded(&port_ref.instance))?;
        Ok((index, port.clone()))
    }

    fn read(&mut self, port_ref: &PortRef, expected: Option<PortType>) -> Result<Value, Error> {
        self.ensure_open()?;
        let (index, port) = self.resolve(port_ref)?;
        if let Some(expected) = expected {
            if expected != port.port_type {
                return Err(Error::PortType {
                    port: port_ref.to_string(),
                    expected,
                    found: port.port_type,
                });
            }
        }
        let slot = &mut self.slots[index];
        if !slot.ready {
            return Err(Error::NotReady {
                instance: slot.name.clone(),
            });
        }
        let vr = port.value_reference;
        let binding = &mut slot.binding;
        Ok(match port.port_type {
            PortType::Real => Value::Real(binding.get_real(vr)?),
            PortType::Integer => Value::Integer(binding.get_integer(vr)?),
            PortType::Boolean => Value::Boolean(binding.get_boolean(vr)?),
            PortType::String => Value::String(binding.get_string(vr)?),
            PortType::Binary => Value::Binary(binding.get_binary(vr)?),
        })
    }

    fn write(&mut self, port_ref: &PortRef, value: Value) -> Result<(), Error> {
        self.ensure_open()?;
        if self.state == SessionState::Created {
            return Err(Error::StateViolation {
                operation: "set",
                state: self.state,
            });
        }
        let (index, port) = self.resolve(port_ref)?;
        if value.port_type() != port.port_type {
            return Err(Error::PortType {
                port: port_ref.to_string(),
                expected: port.port_type,
                found: value.port_type(),
            });
        }
        let vr = port.value_reference;
        let binding = &mut self.slots[index].binding;
        match value {
            Value::Real(v) => binding.set_real(vr, v),
            Value::Integer(v) => binding.set_integer(vr, v),
            Value::Boolean(v) => binding.set_boolean(vr, v),
            Value::String(v) => binding.set_string(vr, &v),
            Value::Binary(v) => binding.set_binary(vr, &v),
        }
    }

    /// Read any port as a [`Value`].
    pub fn get(&mut self, instance: &str, port: &str) -> Result<Value, Error> {
        self.read(&PortRef::new(instance, port), None)
    }

    /// Write a [`Value`] to a port. The value type must match the port type.
    pub fn set(&mut self, instance: &str, port: &str, value: Value) -> Result<(), Error> {
        self.write(&PortRef::new(instance, port), value)
    }

    pub fn get_real(&mut self, instance: &str, port: &str) -> Result<f64, Error> {
        match self.read(&PortRef::new(instance, port), Some(PortType::Real))? {
            Value::Real(v) => Ok(v),
            other => Err(self.type_error(instance, port, PortType::Real, &other)),
        }
    }

    pub fn get_integer(&mut self, instance: &str, port: &str) -> Result<i32, Error> {
        match self.read(&PortRef::new(instance, port), Some(PortType::Integer))? {
            Value::Integer(v) => Ok(v),
            other => Err(self.type_error(instance, port, PortType::Integer, &other)),
        }
    }

    pub fn get_boolean(&mut self, instance: &str, port: &str) -> Result<bool, Error> {
        match self.read(&PortRef::new(instance, port), Some(PortType::Boolean))? {
            Value::Boolean(v) => Ok(v),
            other => Err(self.type_error(instance, port, PortType::Boolean, &other)),
        }
    }

    pub fn get_string(&mut self, instance: &str, port: &str) -> Result<String, Error> {
        match self.read(&PortRef::new(instance, port), Some(PortType::String))? {
            Value::String(v) => Ok(v),
            other => Err(self.type_error(instance, port, PortType::String, &other)),
        }
    }

    /// Read a binary port. The returned buffer is a copy owned by the caller.
    pub fn get_binary(&mut self, instance: &str, port: &str) -> Result<Vec<u8>, Error> {
        match self.read(&PortRef::new(instance, port), Some(PortType::Binary))? {
            Value::Binary(v) => Ok(v),
            other => Err(self.type_error(instance, port, PortType::Binary, &other)),
        }
    }

    fn type_error(&self, instance: &str, port: &str, expected: PortType, found: &Value) -> Error {
        Error::PortType {
            port: PortRef::new(instance, port).to_string(),
            expected,
            found: found.port_type(),
        }
    }

    pub fn set_real(&mut self, instance: &str, port: &str, value: f64) -> Result<(), Error> {
        self.set(instance, port, Value::Real(value))
    }

    pub fn set_integer(&mut self, instance: &str, port: &str, value: i32) -> Result<(), Error> {
        self.set(instance, port, Value::Integer(value))
    }

    pub fn set_boolean(&mut self, instance: &str, port: &str, value: bool) -> Result<(), Error> {
        self.set(instance, port, Value::Boolean(value))
    }

    pub fn set_string(&mut self, instance: &str, port: &str, value: &str) -> Result<(), Error> {
        self.set(instance, port, Value::String(value.to_owned()))
    }

    /// Write a binary port. The bytes are only borrowed for the duration of the call.
    pub fn set_binary(&mut self, instance: &str, port: &str, value: &[u8]) -> Result<(), Error> {
        self.set(instance, port, Value::Binary(value.to_vec()))
    }

    /// Terminate and free every instance in reverse insertion order.
    ///
    /// Every instance is attempted regardless of earlier failures and the session always ends
    /// up `Terminated` with all libraries unloaded. Failures are reported together afterwards.
    /// `fmi2Terminate` is only issued to instances that entered initialization mode.
    pub fn terminate(&mut self) -> Result<(), Error> {
        self.ensure_open()?;

        let mut failures = Vec::new();
        for mut slot in self.slots.drain(..).rev() {
            if slot.initialized {
                log::trace!("{}: terminate", slot.name);
                if let Err(error) = slot.binding.terminate() {
                    log::warn!("{}: terminate failed: {error}", slot.name);
                    failures.push(InstanceFailure {
                        instance: slot.name.clone(),
                        error,
                    });
                }
            }
            slot.binding.free();
        }
        self.state = SessionState::Terminated;
        log::debug!(
            "Session terminated at t={} after {} steps",
            self.current_time(),
            self.steps
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Termination { failures })
        }
    }
}

impl<L: BindingLoader> Drop for SimulationSession<L> {
    fn drop(&mut self) {
        for mut slot in self.slots.drain(..).rev() {
            slot.binding.free();
        }
    }
}
