//! Model artifacts and the ports they expose.

use std::{
    fmt::Display,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use cosim_schema::{self as schema, ScalarVariableElement};

use crate::{Error, FmuArchive};

/// Direction of a port as far as connections are concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Causality {
    Input,
    Output,
    Parameter,
    Local,
}

impl From<schema::Causality> for Causality {
    fn from(causality: schema::Causality) -> Self {
        match causality {
            schema::Causality::Input => Self::Input,
            schema::Causality::Output => Self::Output,
            schema::Causality::Parameter | schema::Causality::CalculatedParameter => {
                Self::Parameter
            }
            schema::Causality::Local | schema::Causality::Independent => Self::Local,
        }
    }
}

impl Display for Causality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Parameter => "parameter",
            Self::Local => "local",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PortType {
    Real,
    Integer,
    Boolean,
    String,
    /// Opaque byte sequence with explicit length.
    Binary,
}

impl From<&ScalarVariableElement> for PortType {
    fn from(elem: &ScalarVariableElement) -> Self {
        match elem {
            ScalarVariableElement::Real(_) => Self::Real,
            ScalarVariableElement::Integer(_) => Self::Integer,
            ScalarVariableElement::Boolean(_) => Self::Boolean,
            ScalarVariableElement::String(_) => Self::String,
            ScalarVariableElement::Binary(_) => Self::Binary,
        }
    }
}

impl Display for PortType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Real => "real",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Binary => "binary",
        };
        write!(f, "{s}")
    }
}

/// One exchange point on a model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortDescriptor {
    pub name: String,
    /// Passed through verbatim to the native getters and setters.
    pub value_reference: u32,
    pub causality: Causality,
    pub port_type: PortType,
}

impl PortDescriptor {
    pub fn new(
        name: impl Into<String>,
        value_reference: u32,
        causality: Causality,
        port_type: PortType,
    ) -> Self {
        Self {
            name: name.into(),
            value_reference,
            causality,
            port_type,
        }
    }
}

impl From<&schema::ScalarVariable> for PortDescriptor {
    fn from(var: &schema::ScalarVariable) -> Self {
        Self {
            name: var.name.clone(),
            value_reference: var.value_reference,
            causality: var.causality().into(),
            port_type: PortType::from(&var.elem),
        }
    }
}

/// A value read from or written to a port.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Real(f64),
    Integer(i32),
    Boolean(bool),
    String(String),
    Binary(Vec<u8>),
}

impl Value {
    pub fn port_type(&self) -> PortType {
        match self {
            Value::Real(_) => PortType::Real,
            Value::Integer(_) => PortType::Integer,
            Value::Boolean(_) => PortType::Boolean,
            Value::String(_) => PortType::String,
            Value::Binary(_) => PortType::Binary,
        }
    }

    /// Parse a textual value for a port of the given type. Binary values are hex encoded.
    pub fn parse(port_type: PortType, text: &str) -> Option<Self> {
        match port_type {
            PortType::Real => f64::from_str(text).ok().map(Value::Real),
            PortType::Integer => i32::from_str(text).ok().map(Value::Integer),
            PortType::Boolean => match text {
                "true" | "1" => Some(Value::Boolean(true)),
                "false" | "0" => Some(Value::Boolean(false)),
                _ => None,
            },
            PortType::String => Some(Value::String(text.to_owned())),
            PortType::Binary => {
                if text.len() % 2 != 0 {
                    return None;
                }
                (0..text.len())
                    .step_by(2)
                    .map(|i| u8::from_str_radix(text.get(i..i + 2)?, 16).ok())
                    .collect::<Option<Vec<_>>>()
                    .map(Value::Binary)
            }
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Real(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
            Value::Binary(bytes) => {
                for b in bytes {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
        }
    }
}

/// Version assumed for descriptors built without a model description.
pub const FMI_VERSION: &str = "2.0";

/// Identifies one model artifact: its identifier, the native library, and the ports its
/// description declares.
#[derive(Clone, Debug)]
pub struct ModelDescriptor {
    model_identifier: String,
    library_path: PathBuf,
    platform_tag: Option<String>,
    guid: String,
    /// `fmiVersion` the description declares.
    fmi_version: String,
    resource_dir: Option<PathBuf>,
    ports: Vec<PortDescriptor>,
    default_experiment: Option<schema::DefaultExperiment>,
    /// Keeps an extracted archive alive for as long as any descriptor refers to it.
    archive: Option<Arc<FmuArchive>>,
}

impl ModelDescriptor {
    /// A bare descriptor without ports, for libraries that are not packaged yet.
    pub fn new(model_identifier: impl Into<String>, library_path: impl Into<PathBuf>) -> Self {
        Self {
            model_identifier: model_identifier.into(),
            library_path: library_path.into(),
            platform_tag: None,
            guid: String::new(),
            fmi_version: FMI_VERSION.to_owned(),
            resource_dir: None,
            ports: Vec::new(),
            default_experiment: None,
            archive: None,
        }
    }

    /// Build a descriptor from a parsed model description and the library implementing it.
    pub fn from_description(
        description: &schema::Fmi2ModelDescription,
        library_path: impl Into<PathBuf>,
    ) -> Result<Self, Error> {
        let model_identifier = description.model_identifier().ok_or_else(|| {
            Error::ArchiveStructure(format!(
                "model '{}' has no CoSimulation element",
                description.model_name
            ))
        })?;

        let mut descriptor = Self::new(model_identifier, library_path);
        descriptor.guid = description.guid.clone();
        descriptor.fmi_version = description.fmi_version.clone();
        descriptor.ports = description
            .model_variables()
            .map(PortDescriptor::from)
            .collect();
        descriptor.default_experiment = description.default_experiment.clone();
        Ok(descriptor)
    }

    /// Build a descriptor for the host library inside an opened archive.
    pub fn from_archive(archive: FmuArchive) -> Result<Self, Error> {
        let mut descriptor =
            Self::from_description(archive.model_description(), archive.library_path())?;
        descriptor.platform_tag = Some(archive.platform().tag.clone());
        descriptor.resource_dir = Some(archive.resource_dir());
        descriptor.archive = Some(Arc::new(archive));
        Ok(descriptor)
    }

    /// Replace the declared ports.
    pub fn with_ports(mut self, ports: impl IntoIterator<Item = PortDescriptor>) -> Self {
        self.ports = ports.into_iter().collect();
        self
    }

    pub fn with_guid(mut self, guid: impl Into<String>) -> Self {
        self.guid = guid.into();
        self
    }

    pub fn model_identifier(&self) -> &str {
        &self.model_identifier
    }

    pub fn library_path(&self) -> &Path {
        &self.library_path
    }

    /// The platform folder the library was packaged under, if it came from an archive.
    pub fn platform_tag(&self) -> Option<&str> {
        self.platform_tag.as_deref()
    }

    pub fn guid(&self) -> &str {
        &self.guid
    }

    /// The FMI version a loaded library must report, `"2.0"` for bare descriptors.
    pub fn fmi_version(&self) -> &str {
        &self.fmi_version
    }

    pub fn ports(&self) -> &[PortDescriptor] {
        &self.ports
    }

    pub fn port(&self, name: &str) -> Option<&PortDescriptor> {
        self.ports.iter().find(|port| port.name == name)
    }

    pub fn default_experiment(&self) -> Option<&schema::DefaultExperiment> {
        self.default_experiment.as_ref()
    }

    /// `file://` URL of the resources directory handed to `fmi2Instantiate`.
    ///
    /// Falls back to the directory containing the library when the model was not loaded from an
    /// archive.
    pub fn resource_url(&self) -> Result<String, Error> {
        let dir = match (&self.resource_dir, self.library_path.parent()) {
            (Some(dir), _) => dir.clone(),
            (None, Some(parent)) => parent.to_path_buf(),
            (None, None) => PathBuf::from("."),
        };
        let dir = std::path::absolute(&dir)?;
        url::Url::from_directory_path(&dir)
            .map(|url| url.as_str().to_owned())
            .map_err(|_| Error::Load {
                path: self.library_path.clone(),
                reason: format!("cannot form a resource URL from {dir:?}"),
            })
    }
}
