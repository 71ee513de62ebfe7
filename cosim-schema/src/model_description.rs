use super::{Causality, Error, ModelVariables, ScalarVariable};

#[derive(Clone, Default, PartialEq, Debug, hard_xml::XmlRead, hard_xml::XmlWrite)]
#[xml(tag = "fmiModelDescription")]
pub struct Fmi2ModelDescription {
    /// Version of FMI that was used to generate the XML file.
    #[xml(attr = "fmiVersion")]
    pub fmi_version: String,

    /// The name of the model as used in the modeling environment that generated the XML file.
    #[xml(attr = "modelName")]
    pub model_name: String,

    /// Fingerprint of the xml-file content to verify that xml-file and C-functions are compatible
    /// to each other.
    #[xml(attr = "guid")]
    pub guid: String,

    #[xml(attr = "description")]
    pub description: Option<String>,

    #[xml(attr = "author")]
    pub author: Option<String>,

    /// Version of the model.
    #[xml(attr = "version")]
    pub version: Option<String>,

    #[xml(attr = "generationTool")]
    pub generation_tool: Option<String>,

    /// Date and time when the XML file was generated, e.g. `2009-12-08T14:33:22Z`.
    #[xml(attr = "generationDateAndTime")]
    pub generation_date_and_time: Option<String>,

    #[xml(attr = "variableNamingConvention")]
    pub variable_naming_convention: Option<String>,

    #[xml(child = "CoSimulation")]
    pub co_simulation: Option<CoSimulation>,

    #[xml(child = "DefaultExperiment")]
    pub default_experiment: Option<DefaultExperiment>,

    #[xml(child = "ModelVariables", default)]
    pub model_variables: ModelVariables,
}

#[derive(Clone, Default, PartialEq, Debug, hard_xml::XmlRead, hard_xml::XmlWrite)]
#[xml(tag = "CoSimulation")]
pub struct CoSimulation {
    /// Short class name according to C-syntax; the shared library and every exported function
    /// are named after it.
    #[xml(attr = "modelIdentifier")]
    pub model_identifier: String,

    #[xml(attr = "needsExecutionTool")]
    pub needs_execution_tool: Option<bool>,

    #[xml(attr = "canHandleVariableCommunicationStepSize")]
    pub can_handle_variable_communication_step_size: Option<bool>,

    #[xml(attr = "canInterpolateInputs")]
    pub can_interpolate_inputs: Option<bool>,

    #[xml(attr = "canBeInstantiatedOnlyOncePerProcess")]
    pub can_be_instantiated_only_once_per_process: Option<bool>,

    #[xml(attr = "canGetAndSetFMUstate")]
    pub can_get_and_set_fmu_state: Option<bool>,

    #[xml(attr = "canSerializeFMUstate")]
    pub can_serialize_fmu_state: Option<bool>,
}

#[derive(Clone, Default, PartialEq, Debug, hard_xml::XmlRead, hard_xml::XmlWrite)]
#[xml(tag = "DefaultExperiment")]
pub struct DefaultExperiment {
    #[xml(attr = "startTime")]
    pub start_time: Option<f64>,
    #[xml(attr = "stopTime")]
    pub stop_time: Option<f64>,
    #[xml(attr = "tolerance")]
    pub tolerance: Option<f64>,
    #[xml(attr = "stepSize")]
    pub step_size: Option<f64>,
}

impl Fmi2ModelDescription {
    /// Parse the `fmiVersion` attribute.
    pub fn version(&self) -> Result<semver::Version, Error> {
        lenient_semver::parse(&self.fmi_version).map_err(|e| e.owned().into())
    }

    /// Identifier of the co-simulation implementation, if the model declares one.
    pub fn model_identifier(&self) -> Option<&str> {
        self.co_simulation
            .as_ref()
            .map(|cs| cs.model_identifier.as_str())
    }

    pub fn model_variables(&self) -> impl Iterator<Item = &ScalarVariable> {
        self.model_variables.variables.iter()
    }

    pub fn model_variable_by_name(&self, name: &str) -> Result<&ScalarVariable, Error> {
        self.model_variables()
            .find(|var| var.name == name)
            .ok_or_else(|| Error::VariableNotFound(name.to_owned()))
    }

    /// Variables with the given causality, in declaration order.
    pub fn variables_with_causality(
        &self,
        causality: Causality,
    ) -> impl Iterator<Item = &ScalarVariable> {
        self.model_variables()
            .filter(move |var| var.causality() == causality)
    }

    /// Checks the structural rules the rest of the stack relies on: a co-simulation interface is
    /// present and variable names are unique.
    pub fn validate(&self) -> Result<(), Error> {
        if self.model_identifier().is_none() {
            return Err(Error::Model(format!(
                "model '{}' has no CoSimulation element",
                self.model_name
            )));
        }
        let mut names = std::collections::HashSet::new();
        for var in self.model_variables() {
            if !names.insert(var.name.as_str()) {
                return Err(Error::Model(format!(
                    "duplicate variable name '{}'",
                    var.name
                )));
            }
        }
        Ok(())
    }
}
