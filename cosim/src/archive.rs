//! Building `.fmu` archives and opening existing ones.
//!
//! An archive carries exactly two entries:
//!
//! ```text
//! modelDescription.xml
//! binaries/<platform>/<modelIdentifier>.<ext>
//! ```

use std::{
    io::{Read, Seek, Write},
    path::{Path, PathBuf},
};

use cosim_schema::{Fmi2ModelDescription, MODEL_DESCRIPTION};

use crate::{
    BindingLoader, Error, ModelBinding, ModelDescriptionGenerator, NativeLoader, Platform,
};

/// Assembles an FMU from a built model library.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    model_identifier: String,
    library_path: PathBuf,
    platform: Platform,
}

impl ArchiveBuilder {
    /// Package `library_path` as `model_identifier` for the host platform.
    pub fn new(model_identifier: impl Into<String>, library_path: impl Into<PathBuf>) -> Self {
        Self {
            model_identifier: model_identifier.into(),
            library_path: library_path.into(),
            platform: Platform::host(),
        }
    }

    /// Override the platform folder the library is placed under.
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// The archive path of the library entry.
    pub fn library_entry(&self) -> String {
        self.platform.library_entry(&self.model_identifier)
    }

    /// Build the archive at `output`, loading the library with [`NativeLoader`].
    pub fn build(&self, output: &Path) -> Result<Fmi2ModelDescription, Error> {
        self.build_with(&NativeLoader, output)
    }

    /// Build the archive at `output` using `loader` to obtain the description writer.
    ///
    /// The archive is written to a temporary file next to `output` and moved into place once
    /// complete, so a failed build never leaves a partial archive behind.
    pub fn build_with<L: BindingLoader>(
        &self,
        loader: &L,
        output: &Path,
    ) -> Result<Fmi2ModelDescription, Error> {
        if !self.platform.is_known() {
            return Err(Error::Packaging(format!(
                "no library extension for platform '{}'",
                self.platform
            )));
        }

        let mut library = std::fs::File::open(&self.library_path).map_err(|e| {
            Error::Packaging(format!("cannot read {:?}: {e}", self.library_path))
        })?;

        let mut binding = loader.load(&self.library_path)?;
        match binding.types_platform() {
            Ok(types_platform) if types_platform != "default" => log::warn!(
                "{} reports types platform '{types_platform}'",
                self.model_identifier
            ),
            Ok(types_platform) => log::debug!("Types platform: {types_platform}"),
            Err(e) => log::warn!("Cannot query types platform: {e}"),
        }

        let scratch = tempfile::Builder::new().prefix("cosim-").tempdir()?;
        let generated =
            ModelDescriptionGenerator::generate(&mut binding, &self.model_identifier, scratch.path())?;
        drop(binding);

        match generated.description.model_identifier() {
            Some(id) if id != self.model_identifier => log::warn!(
                "Description declares modelIdentifier '{id}', packaging as '{}'",
                self.model_identifier
            ),
            _ => {}
        }

        let parent = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;
        let mut staging = tempfile::NamedTempFile::new_in(&parent)?;

        log::debug!("Creating FMU package at: {}", output.display());
        {
            let mut zw = zip::ZipWriter::new(staging.as_file_mut());
            zw.set_comment("Created by cosim");

            zw.start_file(MODEL_DESCRIPTION, zip::write::SimpleFileOptions::default())?;
            zw.write_all(&generated.bytes)?;

            let entry = self.library_entry();
            log::trace!("  - {entry}");
            zw.start_file(entry, zip::write::SimpleFileOptions::default())?;
            std::io::copy(&mut library, &mut zw).map_err(|e| {
                Error::Packaging(format!("cannot read {:?}: {e}", self.library_path))
            })?;

            zw.finish()?;
        }
        staging.persist(output).map_err(|e| Error::Io(e.error))?;

        log::info!(
            "Packaged '{}' for {} into {}",
            self.model_identifier,
            self.platform,
            output.display()
        );
        Ok(generated.description)
    }
}

/// An FMU extracted into a private temporary directory.
///
/// The directory is removed when the archive is dropped.
#[derive(Debug)]
pub struct FmuArchive {
    /// Path to the unzipped FMU on disk
    dir: tempfile::TempDir,
    source: PathBuf,
    description_xml: String,
    /// Parsed raw-schema model description
    model_description: Fmi2ModelDescription,
    platform: Platform,
}

impl FmuArchive {
    /// Extract the archive at `path` and locate the library for the host platform.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::open_for(path, Platform::host())
    }

    /// Extract the archive at `path` and locate the library for `platform`.
    pub fn open_for(path: impl AsRef<Path>, platform: Platform) -> Result<Self, Error> {
        let path = path.as_ref();
        log::debug!("Opening FMU file {path:?}");
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, path.to_path_buf(), platform)
    }

    fn from_reader<R: Read + Seek>(
        reader: R,
        source: PathBuf,
        platform: Platform,
    ) -> Result<Self, Error> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let dir = tempfile::Builder::new().prefix("cosim-").tempdir()?;
        log::debug!("Extracting into {dir:?}");
        archive.extract(&dir)?;

        for fname in archive.file_names() {
            log::trace!("  - {fname}");
        }

        let description_path = dir.path().join(MODEL_DESCRIPTION);
        if !description_path.is_file() {
            return Err(Error::ArchiveStructure(format!(
                "{source:?} has no {MODEL_DESCRIPTION}"
            )));
        }
        let description_xml = std::fs::read_to_string(&description_path)?;
        let model_description: Fmi2ModelDescription =
            cosim_schema::deserialize(&description_xml)?;
        log::debug!(
            "Found FMI {} named '{}'",
            model_description.fmi_version,
            model_description.model_name
        );

        if model_description.version()?.major != 2 {
            return Err(Error::UnsupportedFmiVersion(
                model_description.fmi_version.clone(),
            ));
        }

        let fmu = Self {
            dir,
            source,
            description_xml,
            model_description,
            platform,
        };

        let library = fmu.library_path();
        if !library.is_file() {
            return Err(Error::ArchiveStructure(format!(
                "{:?} has no binary for {} (expected {:?})",
                fmu.source, fmu.platform, library
            )));
        }
        Ok(fmu)
    }

    /// Entry names of the archive at `path`, in archive order.
    pub fn entries(path: impl AsRef<Path>) -> Result<Vec<String>, Error> {
        let archive = zip::ZipArchive::new(std::fs::File::open(path)?)?;
        Ok(archive.file_names().map(str::to_owned).collect())
    }

    /// Parse the description of the archive at `path` without extracting it.
    pub fn read_description(path: impl AsRef<Path>) -> Result<Fmi2ModelDescription, Error> {
        let path = path.as_ref();
        let mut archive = zip::ZipArchive::new(std::fs::File::open(path)?)?;
        let mut xml = String::new();
        match archive.by_name(MODEL_DESCRIPTION) {
            Ok(mut file) => {
                file.read_to_string(&mut xml)?;
            }
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(Error::ArchiveStructure(format!(
                    "{path:?} has no {MODEL_DESCRIPTION}"
                )))
            }
            Err(e) => return Err(e.into()),
        }
        Ok(cosim_schema::deserialize(&xml)?)
    }

    /// The archive this was extracted from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Return the path to the extracted FMU
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn model_description(&self) -> &Fmi2ModelDescription {
        &self.model_description
    }

    /// The description document as stored in the archive.
    pub fn description_xml(&self) -> &str {
        &self.description_xml
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn model_identifier(&self) -> &str {
        self.model_description.model_identifier().unwrap_or_default()
    }

    /// Path of the extracted library for the selected platform.
    pub fn library_path(&self) -> PathBuf {
        let entry = self.platform.library_entry(self.model_identifier());
        entry
            .split('/')
            .fold(self.dir.path().to_path_buf(), |path, part| path.join(part))
    }

    /// Return the path to the resources directory
    pub fn resource_dir(&self) -> PathBuf {
        self.dir.path().join("resources")
    }
}
