use std::{io::Write, path::Path};

use assert_cmd::Command;

const DESCRIPTION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<fmiModelDescription fmiVersion="2.0" modelName="Gain" guid="{8c4e810f-3df3-4a00-8276-176fa3c9f000}" generationTool="handwritten">
  <CoSimulation modelIdentifier="gain"/>
  <DefaultExperiment startTime="0" stopTime="1" stepSize="0.1"/>
  <ModelVariables>
    <ScalarVariable name="k" valueReference="0" causality="parameter" variability="fixed"><Real start="2"/></ScalarVariable>
    <ScalarVariable name="u" valueReference="1" causality="input" variability="continuous"><Real start="0"/></ScalarVariable>
    <ScalarVariable name="y" valueReference="2" causality="output" variability="continuous" initial="calculated"><Real/></ScalarVariable>
  </ModelVariables>
</fmiModelDescription>
"#;

fn fmu_cosim() -> Command {
    Command::cargo_bin("fmu-cosim").unwrap()
}

fn write_fmu(path: &Path) {
    let mut zw = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
    let options = zip::write::SimpleFileOptions::default();
    zw.start_file("modelDescription.xml", options).unwrap();
    zw.write_all(DESCRIPTION.as_bytes()).unwrap();
    zw.start_file("binaries/plan9_64/gain.so", options).unwrap();
    zw.write_all(b"not a library").unwrap();
    zw.finish().unwrap();
}

#[test]
fn test_help() {
    fmu_cosim().arg("--help").assert().success();
}

#[test]
fn test_inspect() {
    let dir = tempfile::tempdir().unwrap();
    let fmu = dir.path().join("gain.fmu");
    write_fmu(&fmu);

    let output = fmu_cosim().arg("inspect").arg(&fmu).output().unwrap();
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("modelDescription.xml"), "{stdout}");
    assert!(stdout.contains("binaries/plan9_64/gain.so"), "{stdout}");
    assert!(stdout.contains("Gain"), "{stdout}");
    assert!(stdout.contains("parameter"), "{stdout}");
    assert!(stdout.contains("output"), "{stdout}");
}

#[test]
fn test_inspect_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    fmu_cosim()
        .arg("inspect")
        .arg(dir.path().join("nothing.fmu"))
        .assert()
        .failure();
}

#[test]
fn test_bundle_rejects_non_library() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("gain.so"), b"plain text").unwrap();

    fmu_cosim()
        .current_dir(dir.path())
        .args(["bundle", "gain", "gain.so"])
        .assert()
        .failure();
    assert!(!dir.path().join("gain.fmu").exists());
}

#[test]
fn test_bundle_missing_library() {
    let dir = tempfile::tempdir().unwrap();
    fmu_cosim()
        .current_dir(dir.path())
        .args(["bundle", "gain", "missing.so"])
        .assert()
        .failure();
    assert!(!dir.path().join("gain.fmu").exists());
}

#[test]
fn test_run_needs_a_model() {
    fmu_cosim().arg("run").assert().failure();
}

#[test]
fn test_run_without_host_binary() {
    let dir = tempfile::tempdir().unwrap();
    let fmu = dir.path().join("gain.fmu");
    write_fmu(&fmu);

    let output = fmu_cosim().arg("run").arg("--fmu").arg(&fmu).output().unwrap();
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn test_run_bad_structure_file() {
    let dir = tempfile::tempdir().unwrap();
    let structure = dir.path().join("system.json");
    std::fs::write(&structure, "{ not json").unwrap();
    fmu_cosim()
        .arg("run")
        .arg("--structure")
        .arg(&structure)
        .assert()
        .failure();
}
