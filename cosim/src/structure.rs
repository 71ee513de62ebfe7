//! The simulation graph: named model instances and directed port connections.

use std::{fmt::Display, str::FromStr};

use crate::{Causality, Error, ModelDescriptor, PortDescriptor};

/// Address of one port, written `instance.port`.
///
/// The instance name ends at the first `.`; the port name may itself contain dots.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub instance: String,
    pub port: String,
}

impl PortRef {
    pub fn new(instance: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            port: port.into(),
        }
    }
}

impl FromStr for PortRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((instance, port)) if !instance.is_empty() && !port.is_empty() => {
                Ok(Self::new(instance, port))
            }
            _ => Err(Error::InvalidPortRef(s.to_owned())),
        }
    }
}

impl Display for PortRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.instance, self.port)
    }
}

/// A directed edge from an output port to an input port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Connection {
    pub source: PortRef,
    pub target: PortRef,
}

impl Display for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

/// Model instances and their wiring, built up with [`add_model`](Self::add_model) and
/// [`connect`](Self::connect).
///
/// Instances keep their insertion order, which is the order sessions instantiate, initialize and
/// step them in. A session takes its own copy of the structure, so changes made afterwards never
/// reach a running session.
#[derive(Clone, Debug, Default)]
pub struct SimulationStructure {
    instances: Vec<(String, ModelDescriptor)>,
    connections: Vec<Connection>,
}

impl SimulationStructure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instance of `descriptor` named `instance_name`.
    ///
    /// Several instances may share one model, but a model identifier can only ever refer to one
    /// library artifact.
    pub fn add_model(
        &mut self,
        instance_name: impl Into<String>,
        descriptor: ModelDescriptor,
    ) -> Result<(), Error> {
        let instance_name = instance_name.into();
        if instance_name.is_empty() || instance_name.contains('.') {
            return Err(Error::InvalidPortRef(instance_name));
        }
        if self.instance(&instance_name).is_some() {
            return Err(Error::DuplicateInstance(instance_name));
        }
        if let Some((_, existing)) = self.instances.iter().find(|(_, existing)| {
            existing.model_identifier() == descriptor.model_identifier()
                && existing.library_path() != descriptor.library_path()
        }) {
            return Err(Error::ModelIdentifierConflict {
                model_identifier: descriptor.model_identifier().to_owned(),
                existing: existing.library_path().to_path_buf(),
            });
        }

        log::debug!(
            "Adding instance '{instance_name}' of '{}'",
            descriptor.model_identifier()
        );
        self.instances.push((instance_name, descriptor));
        Ok(())
    }

    /// Connect two ports given as `instance.port` strings.
    pub fn connect(&mut self, source: &str, target: &str) -> Result<(), Error> {
        self.connect_ports(source.parse()?, target.parse()?)
    }

    /// Connect an output port to an input port.
    ///
    /// Both ports must exist and carry the same type, and the target may not already be driven
    /// by another connection. Fan-out from one output is allowed.
    pub fn connect_ports(&mut self, source: PortRef, target: PortRef) -> Result<(), Error> {
        let source_port = self.port(&source)?;
        let target_port = self.port(&target)?;

        if source_port.causality != Causality::Output {
            return Err(Error::Causality {
                port: source.to_string(),
                expected: Causality::Output,
                found: source_port.causality,
            });
        }
        if target_port.causality != Causality::Input {
            return Err(Error::Causality {
                port: target.to_string(),
                expected: Causality::Input,
                found: target_port.causality,
            });
        }
        if source_port.port_type != target_port.port_type {
            return Err(Error::TypeMismatch {
                source_port: source.to_string(),
                source_type: source_port.port_type,
                target_port: target.to_string(),
                target_type: target_port.port_type,
            });
        }
        if let Some(existing) = self.connections.iter().find(|c| c.target == target) {
            return Err(Error::FanIn {
                target: target.to_string(),
                existing: existing.source.to_string(),
            });
        }

        let connection = Connection { source, target };
        log::debug!("Connecting {connection}");
        self.connections.push(connection);
        Ok(())
    }

    pub fn instance(&self, name: &str) -> Option<&ModelDescriptor> {
        self.instances
            .iter()
            .find(|(instance, _)| instance == name)
            .map(|(_, descriptor)| descriptor)
    }

    /// Instances in insertion order.
    pub fn instances(&self) -> impl Iterator<Item = (&str, &ModelDescriptor)> {
        self.instances
            .iter()
            .map(|(name, descriptor)| (name.as_str(), descriptor))
    }

    pub fn instance_names(&self) -> impl Iterator<Item = &str> {
        self.instances.iter().map(|(name, _)| name.as_str())
    }

    /// Connections in declaration order.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Look up a port, failing with [`Error::UnknownInstance`] or [`Error::UnknownPort`].
    pub fn port(&self, port_ref: &PortRef) -> Result<&PortDescriptor, Error> {
        self.instance(&port_ref.instance)
            .ok_or_else(|| Error::UnknownInstance(port_ref.instance.clone()))?
            .port(&port_ref.port)
            .ok_or_else(|| Error::UnknownPort {
                instance: port_ref.instance.clone(),
                port: port_ref.port.clone(),
            })
    }
}
