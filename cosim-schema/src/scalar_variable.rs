use std::{fmt::Display, str::FromStr};

/// Enumeration that defines the causality of the variable.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub enum Causality {
    /// Independent parameter, constant during the simulation.
    Parameter,
    /// Parameter computed during initialization.
    CalculatedParameter,
    /// The variable value can be provided from another model or slave.
    Input,
    /// The variable value can be used by another model or slave.
    Output,
    /// Local variable, must not be used in connections.
    #[default]
    Local,
    /// The independent variable (usually time).
    Independent,
}

impl FromStr for Causality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parameter" => Ok(Self::Parameter),
            "calculatedParameter" => Ok(Self::CalculatedParameter),
            "input" => Ok(Self::Input),
            "output" => Ok(Self::Output),
            "local" => Ok(Self::Local),
            "independent" => Ok(Self::Independent),
            _ => Err(format!("Invalid Causality: {s}")),
        }
    }
}

impl Display for Causality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Parameter => "parameter",
            Self::CalculatedParameter => "calculatedParameter",
            Self::Input => "input",
            Self::Output => "output",
            Self::Local => "local",
            Self::Independent => "independent",
        };
        write!(f, "{s}")
    }
}

/// Enumeration that defines the time dependency of the variable.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub enum Variability {
    Constant,
    Fixed,
    Tunable,
    Discrete,
    #[default]
    Continuous,
}

impl FromStr for Variability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "constant" => Ok(Self::Constant),
            "fixed" => Ok(Self::Fixed),
            "tunable" => Ok(Self::Tunable),
            "discrete" => Ok(Self::Discrete),
            "continuous" => Ok(Self::Continuous),
            _ => Err(format!("Invalid Variability: {s}")),
        }
    }
}

impl Display for Variability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Constant => "constant",
            Self::Fixed => "fixed",
            Self::Tunable => "tunable",
            Self::Discrete => "discrete",
            Self::Continuous => "continuous",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub enum Initial {
    #[default]
    Exact,
    Approx,
    Calculated,
}

impl FromStr for Initial {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(Self::Exact),
            "approx" => Ok(Self::Approx),
            "calculated" => Ok(Self::Calculated),
            _ => Err(format!("Invalid Initial: {s}")),
        }
    }
}

impl Display for Initial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Exact => "exact",
            Self::Approx => "approx",
            Self::Calculated => "calculated",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Default, PartialEq, Debug, hard_xml::XmlRead, hard_xml::XmlWrite)]
#[xml(tag = "Real")]
pub struct Real {
    /// Value before initialization, if initial=exact or approx.
    #[xml(attr = "start")]
    pub start: Option<f64>,
    #[xml(attr = "unit")]
    pub unit: Option<String>,
    #[xml(attr = "min")]
    pub min: Option<f64>,
    #[xml(attr = "max")]
    pub max: Option<f64>,
}

#[derive(Clone, Default, PartialEq, Debug, hard_xml::XmlRead, hard_xml::XmlWrite)]
#[xml(tag = "Integer")]
pub struct Integer {
    #[xml(attr = "start")]
    pub start: Option<i32>,
    #[xml(attr = "min")]
    pub min: Option<i32>,
    #[xml(attr = "max")]
    pub max: Option<i32>,
}

#[derive(Clone, Default, PartialEq, Debug, hard_xml::XmlRead, hard_xml::XmlWrite)]
#[xml(tag = "Boolean")]
pub struct Boolean {
    #[xml(attr = "start")]
    pub start: Option<bool>,
}

#[derive(Clone, Default, PartialEq, Debug, hard_xml::XmlRead, hard_xml::XmlWrite)]
#[xml(tag = "String")]
pub struct StringType {
    #[xml(attr = "start")]
    pub start: Option<String>,
}

/// Opaque byte buffer. `start` is hex-encoded when present.
#[derive(Clone, Default, PartialEq, Debug, hard_xml::XmlRead, hard_xml::XmlWrite)]
#[xml(tag = "Binary")]
pub struct Binary {
    #[xml(attr = "start")]
    pub start: Option<String>,
    #[xml(attr = "mimeType")]
    pub mime_type: Option<String>,
}

#[derive(Clone, PartialEq, Debug, hard_xml::XmlRead, hard_xml::XmlWrite)]
pub enum ScalarVariableElement {
    #[xml(tag = "Real")]
    Real(Real),
    #[xml(tag = "Integer")]
    Integer(Integer),
    #[xml(tag = "Boolean")]
    Boolean(Boolean),
    #[xml(tag = "String")]
    String(StringType),
    #[xml(tag = "Binary")]
    Binary(Binary),
}

impl Default for ScalarVariableElement {
    fn default() -> Self {
        Self::Real(Real::default())
    }
}

#[derive(Clone, Default, PartialEq, Debug, hard_xml::XmlRead, hard_xml::XmlWrite)]
#[xml(tag = "ScalarVariable")]
pub struct ScalarVariable {
    /// The full, unique name of the variable.
    #[xml(attr = "name")]
    pub name: String,

    /// A handle of the variable to efficiently identify the variable value in the model interface.
    #[xml(attr = "valueReference")]
    pub value_reference: u32,

    #[xml(attr = "description")]
    pub description: Option<String>,

    #[xml(attr = "causality")]
    pub causality: Option<Causality>,

    #[xml(attr = "variability")]
    pub variability: Option<Variability>,

    #[xml(attr = "initial")]
    pub initial: Option<Initial>,

    #[xml(
        child = "Real",
        child = "Integer",
        child = "Boolean",
        child = "String",
        child = "Binary"
    )]
    pub elem: ScalarVariableElement,
}

impl ScalarVariable {
    /// Causality, defaulting to `local` when the attribute is absent.
    pub fn causality(&self) -> Causality {
        self.causality.unwrap_or_default()
    }

    pub fn variability(&self) -> Variability {
        self.variability.unwrap_or(match self.elem {
            ScalarVariableElement::Real(_) => Variability::Continuous,
            _ => Variability::Discrete,
        })
    }
}

#[derive(Clone, Default, PartialEq, Debug, hard_xml::XmlRead, hard_xml::XmlWrite)]
#[xml(tag = "ModelVariables")]
pub struct ModelVariables {
    #[xml(child = "ScalarVariable")]
    pub variables: Vec<ScalarVariable>,
}
