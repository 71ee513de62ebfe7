//! Host platform naming for the `binaries/` folder of an FMU.

/// Tag used for operating systems outside the FMI 2.0 platform table.
pub const UNKNOWN: &str = "unknown";

/// FMI 2.0 platform folder and native library extension for one host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Platform {
    /// Folder name under `binaries/`, e.g. `linux64`.
    pub tag: String,
    /// Shared-library extension without the leading dot. Empty for unknown systems.
    pub lib_extension: String,
}

impl Platform {
    /// Resolve the platform for an OS name (`Windows`, `Linux` or `Darwin`, case-insensitive) and
    /// pointer width.
    ///
    /// Unrecognized systems resolve to `unknown32`/`unknown64` with an empty extension.
    pub fn resolve(os_name: &str, is_64bit: bool) -> Self {
        let (os_tag, lib_extension) = match os_name.to_ascii_lowercase().as_str() {
            "windows" => ("win", "dll"),
            "linux" => ("linux", "so"),
            "darwin" | "macos" => ("darwin", "dylib"),
            _ => (UNKNOWN, ""),
        };
        let bits = if is_64bit { "64" } else { "32" };
        Self {
            tag: format!("{os_tag}{bits}"),
            lib_extension: lib_extension.to_owned(),
        }
    }

    /// The platform this process runs on.
    pub fn host() -> Self {
        Self::resolve(
            std::env::consts::OS,
            cfg!(target_pointer_width = "64"),
        )
    }

    /// `false` when packaging for this platform would produce a malformed archive.
    pub fn is_known(&self) -> bool {
        !self.lib_extension.is_empty()
    }

    /// File name of the model library, `<model_identifier>.<ext>`.
    pub fn library_file_name(&self, model_identifier: &str) -> String {
        format!("{model_identifier}.{}", self.lib_extension)
    }

    /// Archive path of the model library, always with forward slashes.
    pub fn library_entry(&self, model_identifier: &str) -> String {
        format!(
            "binaries/{}/{}",
            self.tag,
            self.library_file_name(model_identifier)
        )
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("Windows", true, "win64", "dll")]
    #[case("Windows", false, "win32", "dll")]
    #[case("Linux", true, "linux64", "so")]
    #[case("Linux", false, "linux32", "so")]
    #[case("Darwin", true, "darwin64", "dylib")]
    #[case("Darwin", false, "darwin32", "dylib")]
    #[case("linux", true, "linux64", "so")]
    #[case("macos", true, "darwin64", "dylib")]
    #[case("Plan9", true, "unknown64", "")]
    #[case("Haiku", false, "unknown32", "")]
    fn test_resolve(
        #[case] os_name: &str,
        #[case] is_64bit: bool,
        #[case] tag: &str,
        #[case] ext: &str,
    ) {
        let platform = Platform::resolve(os_name, is_64bit);
        assert_eq!(platform.tag, tag);
        assert_eq!(platform.lib_extension, ext);
        assert_eq!(platform.is_known(), !ext.is_empty());
    }

    #[test]
    fn test_library_entry() {
        let platform = Platform::resolve("Linux", true);
        assert_eq!(platform.library_entry("counter"), "binaries/linux64/counter.so");
        let platform = Platform::resolve("Windows", false);
        assert_eq!(platform.library_entry("counter"), "binaries/win32/counter.dll");
    }

    #[test]
    fn test_host() {
        let host = Platform::host();
        if cfg!(target_os = "linux") {
            assert!(host.tag.starts_with("linux"));
            assert_eq!(host.lib_extension, "so");
        }
        assert_eq!(Platform::host(), host);
    }
}
