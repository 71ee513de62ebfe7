//! JSON description of a connected system for `fmu-cosim run --structure`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureFile {
    pub instances: Vec<InstanceEntry>,
    #[serde(default)]
    pub connections: Vec<ConnectionEntry>,
    #[serde(default)]
    pub step_size: Option<f64>,
    #[serde(default)]
    pub start_time: Option<f64>,
    #[serde(default)]
    pub stop_time: Option<f64>,
    #[serde(default)]
    pub initial_values: Vec<InitialValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceEntry {
    pub name: String,
    /// Relative paths are resolved against the directory of the structure file.
    pub fmu: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEntry {
    pub from: String,
    pub to: String,
}

/// A start value, given as text and parsed against the port type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialValue {
    pub port: String,
    pub value: String,
}

impl StructureFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read structure file {}", path.display()))?;
        let mut file: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse structure file {}", path.display()))?;

        if let Some(base) = path.parent() {
            for instance in &mut file.instances {
                if instance.fmu.is_relative() {
                    instance.fmu = base.join(&instance.fmu);
                }
            }
        }
        Ok(file)
    }

    /// A structure with one instance per FMU, named after the file stem.
    pub fn from_fmus(fmus: &[PathBuf]) -> anyhow::Result<Self> {
        let instances = fmus
            .iter()
            .map(|fmu| {
                let name = fmu
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .with_context(|| format!("Cannot name an instance after {}", fmu.display()))?
                    .replace('.', "_");
                Ok(InstanceEntry {
                    name,
                    fmu: fmu.clone(),
                })
            })
            .collect::<anyhow::Result<_>>()?;
        Ok(Self {
            instances,
            connections: Vec::new(),
            step_size: None,
            start_time: None,
            stop_time: None,
            initial_values: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system.json");
        std::fs::write(
            &path,
            r#"{
                "instances": [
                    { "name": "a", "fmu": "counter.fmu" },
                    { "name": "b", "fmu": "/abs/counter.fmu" }
                ],
                "connections": [{ "from": "a.y", "to": "b.u" }],
                "stop_time": 2.0,
                "initial_values": [{ "port": "a.u", "value": "1.5" }]
            }"#,
        )
        .unwrap();

        let file = StructureFile::load(&path).unwrap();
        assert_eq!(file.instances[0].fmu, dir.path().join("counter.fmu"));
        assert_eq!(file.instances[1].fmu, PathBuf::from("/abs/counter.fmu"));
        assert_eq!(file.connections[0].to, "b.u");
        assert_eq!(file.step_size, None);
        assert_eq!(file.stop_time, Some(2.0));
        assert_eq!(file.initial_values[0].value, "1.5");
    }

    #[test]
    fn test_missing_instances_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system.json");
        std::fs::write(&path, r#"{ "connections": [] }"#).unwrap();
        assert!(StructureFile::load(&path).is_err());
    }

    #[test]
    fn test_from_fmus() {
        let file =
            StructureFile::from_fmus(&[PathBuf::from("out/gain.fmu"), PathBuf::from("my.model.fmu")])
                .unwrap();
        let names: Vec<_> = file.instances.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["gain", "my_model"]);
    }
}
