use std::{
    env,
    path::{Path, PathBuf},
};

/// Shared libraries built from [`SOURCE`] for the native binding tests, with the
/// preprocessor symbols each one is compiled with.
const COMPONENTS: &[(&str, &[&str])] = &[
    ("counter", &[]),
    // A second copy with its own instance count.
    ("tally", &[]),
    ("stepless", &["COSIM_WITHOUT_STEP"]),
];

const SOURCE: &str = "tests/component/counter.c";

fn main() {
    println!("cargo:rerun-if-changed={SOURCE}");

    // Packaged crates ship without tests.
    if env::var_os("CARGO_CFG_UNIX").is_none() || !Path::new(SOURCE).exists() {
        return;
    }
    let out_path = PathBuf::from(env::var("OUT_DIR").unwrap());
    let extension = match env::var("CARGO_CFG_TARGET_OS").as_deref() {
        Ok("macos") => "dylib",
        _ => "so",
    };

    for (name, defines) in COMPONENTS {
        let library = out_path.join(format!("{name}.{extension}"));
        let mut build = cc::Build::new();
        build.pic(true).warnings(false);
        for define in *defines {
            build.define(define, None);
        }

        let mut command = build.get_compiler().to_command();
        command
            .arg("-shared")
            .arg("-o")
            .arg(&library)
            .arg(SOURCE);
        let status = command
            .status()
            .expect("Unable to run the C compiler for the test component");
        assert!(status.success(), "Building test component {name} failed");

        println!(
            "cargo:rustc-env=COSIM_TEST_{}={}",
            name.to_uppercase(),
            library.display()
        );
    }
}
