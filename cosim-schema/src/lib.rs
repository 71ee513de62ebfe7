#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![deny(clippy::all)]

pub use hard_xml::{XmlRead, XmlWrite};
use thiserror::Error;

mod model_description;
mod scalar_variable;

pub use model_description::*;
pub use scalar_variable::*;

/// Name of the metadata document at the root of every FMU archive.
pub const MODEL_DESCRIPTION: &str = "modelDescription.xml";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("Variable {0} not found")]
    VariableNotFound(String),

    #[error(transparent)]
    Semver(#[from] lenient_semver::parser::OwnedError),

    #[error("Error parsing XML: {0}")]
    XmlParse(String),

    #[error("Error in model: {0}")]
    Model(String),
}

/// Serialize a schema element to XML, with the XML declaration unless `fragment` is set.
pub fn serialize<T: XmlWrite>(value: &T, fragment: bool) -> Result<String, Error> {
    let xml = value
        .to_string()
        .map_err(|e| Error::XmlParse(format!("{e:?}")))?;
    if fragment {
        Ok(xml)
    } else {
        Ok(format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{xml}\n"
        ))
    }
}

pub fn deserialize<'a, T: XmlRead<'a>>(xml: &'a str) -> Result<T, Error> {
    T::from_str(xml).map_err(|e| Error::XmlParse(format!("{e:?}")))
}
