//! Scriptable in-memory model used in place of native components.
#![allow(dead_code)]

use std::{
    cell::RefCell,
    collections::HashSet,
    path::{Path, PathBuf},
    rc::Rc,
};

use cosim::{
    binding::Fmi2Error, schema::Fmi2ModelDescription, BindingLoader, Capability, Error,
    ModelBinding, ModelDescriptor, Stage,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Fault {
    /// Keyed by library stem.
    Load,
    /// Keyed by library stem: `write_description` writes nothing.
    Describe,
    /// Keyed by library stem: `write_description` leaves a directory where the file belongs.
    DescribeUnreadable,
    Instantiate,
    Init,
    Exit,
    Step,
    Terminate,
}

/// Loader handing out [`MockBinding`]s. Clones share the journal and the fault table, so faults
/// can be armed after the loader was moved into a session.
#[derive(Clone, Default)]
pub struct MockLoader {
    journal: Rc<RefCell<Vec<String>>>,
    faults: Rc<RefCell<HashSet<(Fault, String)>>>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, fault: Fault, key: &str) {
        self.faults.borrow_mut().insert((fault, key.to_owned()));
    }

    pub fn heal(&self, fault: Fault, key: &str) {
        self.faults.borrow_mut().remove(&(fault, key.to_owned()));
    }

    /// Every recorded call, e.g. `"doStep a 0.01"`.
    pub fn events(&self) -> Vec<String> {
        self.journal.borrow().clone()
    }

    /// Recorded calls starting with `prefix`.
    pub fn events_of(&self, prefix: &str) -> Vec<String> {
        self.journal
            .borrow()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.journal.borrow_mut().clear();
    }
}

impl BindingLoader for MockLoader {
    type Binding = MockBinding;

    fn load(&self, path: &Path) -> Result<MockBinding, Error> {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.journal.borrow_mut().push(format!("load {stem}"));
        if self.faults.borrow().contains(&(Fault::Load, stem.clone())) {
            return Err(Error::Load {
                path: path.to_path_buf(),
                reason: "injected".to_owned(),
            });
        }
        Ok(MockBinding {
            name: stem.clone(),
            stem,
            loader: self.clone(),
            instantiated: false,
            steps: 0,
            u: 0.0,
            seen: 0.0,
            n: 0,
            flag: false,
            flag_out: false,
            label: String::new(),
            label_out: String::new(),
            blob_in: Vec::new(),
            blob_out: Vec::new(),
            last_step: None,
        })
    }
}

/// A counter model. Each `doStep` increments `y`/`count`, records the current input `u` in
/// `seen`, and copies `flag`, `label` and `blob_in` to their outputs.
pub struct MockBinding {
    name: String,
    stem: String,
    loader: MockLoader,
    instantiated: bool,
    steps: i32,
    u: f64,
    seen: f64,
    n: i32,
    flag: bool,
    flag_out: bool,
    label: String,
    label_out: String,
    blob_in: Vec<u8>,
    blob_out: Vec<u8>,
    pub last_step: Option<(f64, f64)>,
}

impl MockBinding {
    fn record(&self, event: String) {
        self.loader.journal.borrow_mut().push(event);
    }

    fn faulty(&self, fault: Fault) -> bool {
        self.loader
            .faults
            .borrow()
            .contains(&(fault, self.name.clone()))
    }

    fn lifecycle(&self, stage: Stage, fault: Fault, event: String) -> Result<(), Error> {
        self.record(event);
        if !self.instantiated {
            return Err(Error::NotInstantiated {
                instance: self.name.clone(),
            });
        }
        if self.faulty(fault) {
            return Err(Error::NativeCall {
                instance: self.name.clone(),
                stage,
                status: Fmi2Error::Error,
            });
        }
        Ok(())
    }

    fn invalid(&self, vr: u32) -> Error {
        Error::InvalidReference {
            instance: self.name.clone(),
            value_reference: vr,
            status: Fmi2Error::Error,
        }
    }

    fn live(&self) -> Result<(), Error> {
        if self.instantiated {
            Ok(())
        } else {
            Err(Error::NotInstantiated {
                instance: self.name.clone(),
            })
        }
    }
}

impl Drop for MockBinding {
    fn drop(&mut self) {
        self.free();
    }
}

impl ModelBinding for MockBinding {
    fn name(&self) -> &str {
        &self.name
    }

    fn types_platform(&self) -> Result<String, Error> {
        Ok("default".to_owned())
    }

    fn version(&self) -> Result<String, Error> {
        Ok("2.0".to_owned())
    }

    fn has_capability(&self, _capability: Capability) -> bool {
        true
    }

    fn write_description(&mut self, location: &Path, model_identifier: &str) -> Result<(), Error> {
        self.record(format!("describe {}", self.stem));
        if self
            .loader
            .faults
            .borrow()
            .contains(&(Fault::Describe, self.stem.clone()))
        {
            return Ok(());
        }
        if self
            .loader
            .faults
            .borrow()
            .contains(&(Fault::DescribeUnreadable, self.stem.clone()))
        {
            std::fs::create_dir(location)?;
            return Ok(());
        }
        std::fs::write(location, description_xml(model_identifier))?;
        Ok(())
    }

    fn instantiate(
        &mut self,
        instance_name: &str,
        guid: &str,
        resource_url: &str,
        _logging_on: bool,
    ) -> Result<(), Error> {
        self.name = instance_name.to_owned();
        self.record(format!("instantiate {instance_name} {guid}"));
        assert!(resource_url.starts_with("file://"), "{resource_url}");
        if self.faulty(Fault::Instantiate) {
            return Err(Error::NativeCall {
                instance: self.name.clone(),
                stage: Stage::Instantiate,
                status: Fmi2Error::Error,
            });
        }
        self.instantiated = true;
        Ok(())
    }

    fn setup_experiment(
        &mut self,
        _tolerance: Option<f64>,
        start_time: f64,
        _stop_time: Option<f64>,
    ) -> Result<(), Error> {
        self.lifecycle(
            Stage::SetupExperiment,
            Fault::Init,
            format!("setup {} {start_time}", self.name),
        )
    }

    fn enter_initialization_mode(&mut self) -> Result<(), Error> {
        self.lifecycle(
            Stage::EnterInitializationMode,
            Fault::Init,
            format!("enter {}", self.name),
        )
    }

    fn exit_initialization_mode(&mut self) -> Result<(), Error> {
        self.lifecycle(
            Stage::ExitInitializationMode,
            Fault::Exit,
            format!("exit {}", self.name),
        )
    }

    fn do_step(&mut self, current_time: f64, step_size: f64) -> Result<(), Error> {
        self.lifecycle(
            Stage::DoStep,
            Fault::Step,
            format!("doStep {} {current_time}", self.name),
        )?;
        self.steps += 1;
        self.seen = self.u;
        self.flag_out = self.flag;
        self.label_out = self.label.clone();
        self.blob_out = self.blob_in.clone();
        self.last_step = Some((current_time, step_size));
        Ok(())
    }

    fn terminate(&mut self) -> Result<(), Error> {
        self.lifecycle(
            Stage::Terminate,
            Fault::Terminate,
            format!("terminate {}", self.name),
        )
    }

    fn reset(&mut self) -> Result<(), Error> {
        self.record(format!("reset {}", self.name));
        self.steps = 0;
        Ok(())
    }

    fn free(&mut self) {
        if self.instantiated {
            self.instantiated = false;
            self.record(format!("free {}", self.name));
        }
    }

    fn get_real(&mut self, vr: u32) -> Result<f64, Error> {
        self.live()?;
        match vr {
            0 => Ok(self.u),
            1 => Ok(self.steps as f64),
            2 => Ok(self.seen),
            _ => Err(self.invalid(vr)),
        }
    }

    fn get_integer(&mut self, vr: u32) -> Result<i32, Error> {
        self.live()?;
        match vr {
            0 => Ok(self.steps),
            1 => Ok(self.n),
            _ => Err(self.invalid(vr)),
        }
    }

    fn get_boolean(&mut self, vr: u32) -> Result<bool, Error> {
        self.live()?;
        match vr {
            0 => Ok(self.flag),
            1 => Ok(self.flag_out),
            _ => Err(self.invalid(vr)),
        }
    }

    fn get_string(&mut self, vr: u32) -> Result<String, Error> {
        self.live()?;
        match vr {
            0 => Ok(self.label.clone()),
            1 => Ok(self.label_out.clone()),
            _ => Err(self.invalid(vr)),
        }
    }

    fn get_binary(&mut self, vr: u32) -> Result<Vec<u8>, Error> {
        self.live()?;
        match vr {
            0 => Ok(self.blob_in.clone()),
            1 => Ok(self.blob_out.clone()),
            _ => Err(self.invalid(vr)),
        }
    }

    fn set_real(&mut self, vr: u32, value: f64) -> Result<(), Error> {
        self.live()?;
        match vr {
            0 => self.u = value,
            _ => return Err(self.invalid(vr)),
        }
        Ok(())
    }

    fn set_integer(&mut self, vr: u32, value: i32) -> Result<(), Error> {
        self.live()?;
        match vr {
            1 => self.n = value,
            _ => return Err(self.invalid(vr)),
        }
        Ok(())
    }

    fn set_boolean(&mut self, vr: u32, value: bool) -> Result<(), Error> {
        self.live()?;
        match vr {
            0 => self.flag = value,
            _ => return Err(self.invalid(vr)),
        }
        Ok(())
    }

    fn set_string(&mut self, vr: u32, value: &str) -> Result<(), Error> {
        self.live()?;
        match vr {
            0 => self.label = value.to_owned(),
            _ => return Err(self.invalid(vr)),
        }
        Ok(())
    }

    fn set_binary(&mut self, vr: u32, value: &[u8]) -> Result<(), Error> {
        self.live()?;
        match vr {
            0 => self.blob_in = value.to_vec(),
            _ => return Err(self.invalid(vr)),
        }
        Ok(())
    }
}

/// The description the mock model writes for itself.
pub fn description_xml(model_identifier: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<fmiModelDescription fmiVersion="2.0" modelName="{model_identifier}" guid="guid-{model_identifier}" generationTool="mock" variableNamingConvention="structured">
  <CoSimulation modelIdentifier="{model_identifier}" canHandleVariableCommunicationStepSize="true"/>
  <DefaultExperiment startTime="0" stepSize="0.01"/>
  <ModelVariables>
    <ScalarVariable name="u" valueReference="0" causality="input" variability="continuous"><Real start="0"/></ScalarVariable>
    <ScalarVariable name="y" valueReference="1" causality="output" variability="continuous" initial="calculated"><Real/></ScalarVariable>
    <ScalarVariable name="seen" valueReference="2" causality="output" variability="continuous" initial="calculated"><Real/></ScalarVariable>
    <ScalarVariable name="count" valueReference="0" causality="output" variability="discrete" initial="calculated"><Integer/></ScalarVariable>
    <ScalarVariable name="n" valueReference="1" causality="input" variability="discrete"><Integer start="0"/></ScalarVariable>
    <ScalarVariable name="flag" valueReference="0" causality="input" variability="discrete"><Boolean start="false"/></ScalarVariable>
    <ScalarVariable name="flag_out" valueReference="1" causality="output" variability="discrete" initial="calculated"><Boolean/></ScalarVariable>
    <ScalarVariable name="label" valueReference="0" causality="input" variability="discrete"><String start=""/></ScalarVariable>
    <ScalarVariable name="label_out" valueReference="1" causality="output" variability="discrete" initial="calculated"><String/></ScalarVariable>
    <ScalarVariable name="blob_in" valueReference="0" causality="input" variability="discrete"><Binary/></ScalarVariable>
    <ScalarVariable name="blob_out" valueReference="1" causality="output" variability="discrete" initial="calculated"><Binary/></ScalarVariable>
    <ScalarVariable name="ghost" valueReference="99" causality="output" variability="continuous" initial="calculated"><Real/></ScalarVariable>
  </ModelVariables>
  <ModelStructure>
    <Outputs><Unknown index="2"/></Outputs>
  </ModelStructure>
</fmiModelDescription>
"#
    )
}

/// Descriptor of the mock model, bound to a library path that only the mock loader understands.
pub fn descriptor(model_identifier: &str) -> ModelDescriptor {
    let xml = description_xml(model_identifier);
    let description: Fmi2ModelDescription = cosim::schema::deserialize(&xml).unwrap();
    ModelDescriptor::from_description(
        &description,
        PathBuf::from("/mock").join(format!("{model_identifier}.so")),
    )
    .unwrap()
}
