//! Produces `modelDescription.xml` by asking the model library to write it.

use std::path::{Path, PathBuf};

use cosim_schema::{Fmi2ModelDescription, MODEL_DESCRIPTION};

use crate::{Capability, Error, ModelBinding};

/// Output of [`ModelDescriptionGenerator::generate`].
#[derive(Debug)]
pub struct GeneratedDescription {
    /// Where the library wrote the document.
    pub path: PathBuf,
    /// The document exactly as written, for byte-identical packaging.
    pub bytes: Vec<u8>,
    pub description: Fmi2ModelDescription,
}

pub struct ModelDescriptionGenerator;

impl ModelDescriptionGenerator {
    /// Invoke the binding's `write_description` entry point with `<dir>/modelDescription.xml` and
    /// read back the result.
    ///
    /// Fails with [`Error::SymbolMissing`] if the library cannot describe itself, and with
    /// [`Error::DescriptionWrite`] if the document is missing, empty or not a valid FMI 2.0
    /// co-simulation description. A document that exists but cannot be read is
    /// [`Error::Packaging`].
    pub fn generate<B: ModelBinding>(
        binding: &mut B,
        model_identifier: &str,
        dir: &Path,
    ) -> Result<GeneratedDescription, Error> {
        if !binding.has_capability(Capability::WriteDescription) {
            return Err(Error::SymbolMissing {
                library: binding.name().to_owned(),
                symbol: "write_description".to_owned(),
            });
        }

        let path = dir.join(MODEL_DESCRIPTION);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        binding.write_description(&path, model_identifier)?;

        let write_error = |reason: String| Error::DescriptionWrite {
            model_identifier: model_identifier.to_owned(),
            reason,
        };

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(write_error(format!("{path:?} was not written")))
            }
            Err(e) => return Err(Error::Packaging(format!("cannot read {path:?}: {e}"))),
        };
        if bytes.is_empty() {
            return Err(write_error(format!("{path:?} is empty")));
        }
        let xml = std::str::from_utf8(&bytes).map_err(|e| write_error(e.to_string()))?;
        let description: Fmi2ModelDescription =
            cosim_schema::deserialize(xml).map_err(|e| write_error(e.to_string()))?;
        description
            .validate()
            .map_err(|e| write_error(e.to_string()))?;

        log::debug!(
            "Generated description of '{}' (FMI {}, {} variables)",
            description.model_name,
            description.fmi_version,
            description.model_variables.variables.len()
        );

        Ok(GeneratedDescription {
            path,
            bytes,
            description,
        })
    }
}
