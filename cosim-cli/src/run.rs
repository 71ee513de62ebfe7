//! Implements the `run` command: a fixed-step co-simulation of one or more FMUs.

use std::{collections::HashMap, path::PathBuf};

use anyhow::{bail, Context};
use clap::{ArgGroup, Args};
use comfy_table::{presets::UTF8_FULL, Table};
use cosim::{
    schema::DefaultExperiment, Causality, FmuArchive, ModelDescriptor, PortRef, SimulationSession,
    SimulationStructure, Value,
};

use crate::structure_file::StructureFile;

/// Number of steps used to derive a step size when neither the options nor the model give one.
pub const DEFAULT_STEPS: u32 = 500;
/// Stop time used when neither the options nor the model give one.
pub const DEFAULT_STOP_TIME: f64 = 10.0;

#[derive(Args, Debug, Default)]
#[command(group(ArgGroup::new("model").required(true).args(["fmu", "structure"])))]
pub struct RunOptions {
    /// FMU to simulate, instantiated under its file stem. May be given several times
    #[arg(long, value_name = "FMU")]
    pub fmu: Vec<PathBuf>,

    /// JSON file describing instances, connections and experiment settings
    #[arg(long, value_name = "FILE", conflicts_with = "fmu")]
    pub structure: Option<PathBuf>,

    /// Additional connection, written `source.port=target.port`
    #[arg(long = "connect", value_name = "FROM=TO")]
    pub connections: Vec<String>,

    /// Start value, written `instance.port=value`. Binary values are hex encoded
    #[arg(long = "set", value_name = "PORT=VALUE")]
    pub initial_values: Vec<String>,

    /// Communication step size [default: DefaultExperiment stepSize, else (stop - start) / 500]
    #[arg(long)]
    pub step_size: Option<f64>,

    /// Simulation start time [default: DefaultExperiment startTime, else 0]
    #[arg(long)]
    pub start_time: Option<f64>,

    /// Simulation stop time [default: DefaultExperiment stopTime, else 10]
    #[arg(long)]
    pub stop_time: Option<f64>,

    /// Number of steps to take, overriding the stop time
    #[arg(long, short = 'n')]
    pub steps: Option<u64>,

    /// Record a row every N steps
    #[arg(long, default_value_t = 1)]
    pub output_interval: u64,

    /// Enable debug logging inside the model libraries
    #[arg(long)]
    pub logging: bool,
}

/// Experiment times, each of which may come from a different source.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Timing {
    pub start_time: Option<f64>,
    pub stop_time: Option<f64>,
    pub step_size: Option<f64>,
}

impl Timing {
    /// Fill the unset fields of `self` from `fallback`.
    pub fn or(self, fallback: Timing) -> Timing {
        Timing {
            start_time: self.start_time.or(fallback.start_time),
            stop_time: self.stop_time.or(fallback.stop_time),
            step_size: self.step_size.or(fallback.step_size),
        }
    }

    /// Resolve the fixed step grid, running `steps` steps if given and up to the stop time
    /// otherwise.
    pub fn grid(self, steps: Option<u64>) -> anyhow::Result<TimeGrid> {
        let start_time = self.start_time.unwrap_or(0.0);

        let (step_size, steps) = match steps {
            Some(steps) => {
                let step_size = match (self.step_size, self.stop_time) {
                    (Some(step_size), _) => step_size,
                    (None, Some(stop_time)) if steps > 0 => (stop_time - start_time) / steps as f64,
                    _ => (DEFAULT_STOP_TIME - start_time) / f64::from(DEFAULT_STEPS),
                };
                (step_size, steps)
            }
            None => {
                let stop_time = self.stop_time.unwrap_or(DEFAULT_STOP_TIME);
                if stop_time <= start_time {
                    bail!("Stop time {stop_time} is not after start time {start_time}");
                }
                let step_size = self
                    .step_size
                    .unwrap_or((stop_time - start_time) / f64::from(DEFAULT_STEPS));
                let steps = ((stop_time - start_time) / step_size * (1.0 + 1e-9)).floor();
                (step_size, steps as u64)
            }
        };

        if !(step_size.is_finite() && step_size > 0.0) {
            bail!("Invalid step size {step_size}");
        }
        Ok(TimeGrid {
            start_time,
            step_size,
            steps,
        })
    }
}

impl From<&DefaultExperiment> for Timing {
    fn from(experiment: &DefaultExperiment) -> Self {
        Timing {
            start_time: experiment.start_time,
            stop_time: experiment.stop_time,
            step_size: experiment.step_size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeGrid {
    pub start_time: f64,
    pub step_size: f64,
    pub steps: u64,
}

impl TimeGrid {
    pub fn stop_time(&self) -> f64 {
        self.start_time + self.steps as f64 * self.step_size
    }
}

/// Output values recorded during a run.
#[derive(Debug, Default)]
pub struct Trace {
    /// `instance.port` for every recorded output.
    pub columns: Vec<String>,
    pub rows: Vec<(f64, Vec<String>)>,
}

impl Trace {
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL).set_header(
            std::iter::once("time".to_owned()).chain(self.columns.iter().cloned()),
        );
        for (time, values) in &self.rows {
            table.add_row(std::iter::once(time.to_string()).chain(values.iter().cloned()));
        }
        table
    }
}

fn split_assignment<'a>(text: &'a str, what: &str) -> anyhow::Result<(&'a str, &'a str)> {
    text.split_once('=')
        .with_context(|| format!("Expected {what}, found '{text}'"))
}

/// Build the simulation structure, extracting every distinct FMU once.
fn build_structure(file: &StructureFile) -> anyhow::Result<(SimulationStructure, Timing)> {
    let mut extracted: HashMap<PathBuf, ModelDescriptor> = HashMap::new();
    let mut structure = SimulationStructure::new();
    let mut model_timing = Timing::default();

    for instance in &file.instances {
        let descriptor = match extracted.get(&instance.fmu) {
            Some(descriptor) => descriptor.clone(),
            None => {
                let archive = FmuArchive::open(&instance.fmu)
                    .with_context(|| format!("Failed to open {}", instance.fmu.display()))?;
                let descriptor = ModelDescriptor::from_archive(archive)?;
                extracted.insert(instance.fmu.clone(), descriptor.clone());
                descriptor
            }
        };
        if let Some(experiment) = descriptor.default_experiment() {
            model_timing = model_timing.or(experiment.into());
        }
        structure.add_model(&instance.name, descriptor)?;
    }

    for connection in &file.connections {
        structure.connect(&connection.from, &connection.to)?;
    }
    Ok((structure, model_timing))
}

pub fn simulate(options: &RunOptions) -> anyhow::Result<Trace> {
    let mut file = match &options.structure {
        Some(path) => StructureFile::load(path)?,
        None => StructureFile::from_fmus(&options.fmu)?,
    };
    for connection in &options.connections {
        let (from, to) = split_assignment(connection, "FROM=TO")?;
        file.connections.push(crate::structure_file::ConnectionEntry {
            from: from.to_owned(),
            to: to.to_owned(),
        });
    }
    for assignment in &options.initial_values {
        let (port, value) = split_assignment(assignment, "PORT=VALUE")?;
        file.initial_values.push(crate::structure_file::InitialValue {
            port: port.to_owned(),
            value: value.to_owned(),
        });
    }
    if file.instances.is_empty() {
        bail!("Nothing to simulate");
    }

    let (structure, model_timing) = build_structure(&file)?;
    let grid = Timing {
        start_time: options.start_time,
        stop_time: options.stop_time,
        step_size: options.step_size,
    }
    .or(Timing {
        start_time: file.start_time,
        stop_time: file.stop_time,
        step_size: file.step_size,
    })
    .or(model_timing)
    .grid(options.steps)?;
    log::info!(
        "Simulating {} instance(s) from {} to {} with step size {}",
        structure.len(),
        grid.start_time,
        grid.stop_time(),
        grid.step_size
    );

    let mut initial_values = Vec::with_capacity(file.initial_values.len());
    for initial in &file.initial_values {
        let port_ref: PortRef = initial.port.parse()?;
        let port_type = structure.port(&port_ref)?.port_type;
        let value = Value::parse(port_type, &initial.value).with_context(|| {
            format!("Cannot parse '{}' as {port_type} for {port_ref}", initial.value)
        })?;
        initial_values.push((port_ref, value));
    }

    let outputs: Vec<PortRef> = structure
        .instances()
        .flat_map(|(name, descriptor)| {
            descriptor
                .ports()
                .iter()
                .filter(|port| port.causality == Causality::Output)
                .map(move |port| PortRef::new(name, port.name.clone()))
        })
        .collect();

    let mut session = SimulationSession::new(&structure, grid.step_size)?
        .with_start_time(grid.start_time)
        .with_stop_time(grid.stop_time())
        .with_logging(options.logging);

    let result = drive(
        &mut session,
        &grid,
        &initial_values,
        &outputs,
        options.output_interval.max(1),
    );
    if let Err(e) = session.terminate() {
        log::warn!("{e}");
    }
    result
}

fn drive(
    session: &mut SimulationSession,
    grid: &TimeGrid,
    initial_values: &[(PortRef, Value)],
    outputs: &[PortRef],
    output_interval: u64,
) -> anyhow::Result<Trace> {
    let mut trace = Trace {
        columns: outputs.iter().map(ToString::to_string).collect(),
        rows: Vec::new(),
    };

    session.instantiate()?;
    for (port_ref, value) in initial_values {
        session.set(&port_ref.instance, &port_ref.port, value.clone())?;
    }
    session.init()?;
    session.exit_initialization()?;

    let mut record = |session: &mut SimulationSession| -> anyhow::Result<()> {
        let values = outputs
            .iter()
            .map(|port| -> anyhow::Result<String> {
                Ok(session.get(&port.instance, &port.port)?.to_string())
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        trace.rows.push((session.current_time(), values));
        Ok(())
    };

    record(&mut *session)?;
    for step in 1..=grid.steps {
        session.step()?;
        if step % output_interval == 0 || step == grid.steps {
            record(&mut *session)?;
        }
    }
    Ok(trace)
}
