//! Native bindings against the C component in `tests/component`, built by `build.rs`.
#![cfg(unix)]

use std::path::Path;

use cosim::{
    binding::Fmi2Error, ArchiveBuilder, BindingLoader, Capability, Error, FmuArchive,
    ModelBinding, ModelDescriptionGenerator, ModelDescriptor, NativeBinding, NativeLoader,
    Platform, SessionState, SimulationSession, SimulationStructure, Stage,
};
use float_cmp::assert_approx_eq;

const COUNTER: &str = env!("COSIM_TEST_COUNTER");
const TALLY: &str = env!("COSIM_TEST_TALLY");
const STEPLESS: &str = env!("COSIM_TEST_STEPLESS");

const GUID: &str = "{5f1c0e9a-7d43-4c1b-9a55-c05130c0e7e2}";

fn load(path: &str) -> NativeBinding {
    NativeLoader.load(Path::new(path)).unwrap()
}

fn resource_url() -> String {
    ModelDescriptor::new("counter", COUNTER)
        .resource_url()
        .unwrap()
}

#[test_log::test]
fn test_missing_required_symbol() {
    let err = NativeLoader.load(Path::new(STEPLESS)).unwrap_err();
    match err {
        Error::SymbolMissing { library, symbol } => {
            assert_eq!(library, "stepless");
            assert_eq!(symbol, "fmi2DoStep");
        }
        other => panic!("unexpected {other}"),
    }
}

#[test_log::test]
fn test_identity() {
    let binding = load(COUNTER);
    assert_eq!(binding.name(), "counter");
    assert_eq!(binding.types_platform().unwrap(), "default");
    assert_eq!(binding.version().unwrap(), "2.0");
    assert!(binding.has_capability(Capability::WriteDescription));
    assert!(binding.has_capability(Capability::Binary));
    binding.check_consistency("2.0").unwrap();
    assert!(!binding.is_instantiated());
}

#[test_log::test]
fn test_generate_description() {
    let dir = tempfile::tempdir().unwrap();
    let mut binding = load(COUNTER);
    let generated = ModelDescriptionGenerator::generate(&mut binding, "renamed", dir.path()).unwrap();

    assert_eq!(generated.path, dir.path().join("modelDescription.xml"));
    assert_eq!(generated.bytes, std::fs::read(&generated.path).unwrap());
    let description = generated.description;
    assert_eq!(description.model_identifier(), Some("renamed"));
    assert_eq!(description.guid, GUID);
    assert_eq!(description.model_variables.variables.len(), 11);
}

#[test_log::test]
fn test_instantiate_with_wrong_guid() {
    let mut binding = load(COUNTER);
    let err = binding
        .instantiate("m", "{not-the-guid}", &resource_url(), false)
        .unwrap_err();
    assert!(
        matches!(
            err,
            Error::NativeCall {
                stage: Stage::Instantiate,
                ..
            }
        ),
        "{err}"
    );
    assert!(!binding.is_instantiated());
    assert!(matches!(
        binding.get_real(0),
        Err(Error::NotInstantiated { .. })
    ));
}

#[test_log::test]
fn test_lifecycle() {
    let mut binding = load(COUNTER);
    binding
        .instantiate("m", GUID, &resource_url(), true)
        .unwrap();
    assert!(binding.is_instantiated());
    assert_eq!(binding.name(), "m");

    binding.setup_experiment(None, 0.0, Some(1.0)).unwrap();
    binding.enter_initialization_mode().unwrap();
    binding.set_real(0, 2.0).unwrap();
    binding.set_boolean(0, true).unwrap();
    binding.set_string(0, "hello").unwrap();
    binding.exit_initialization_mode().unwrap();

    for n in 0..5 {
        binding.do_step(f64::from(n) * 0.1, 0.1).unwrap();
    }
    assert_approx_eq!(f64, binding.get_real(1).unwrap(), 1.0, epsilon = 1e-12);
    assert_approx_eq!(f64, binding.get_real(2).unwrap(), 0.5, epsilon = 1e-12);
    assert_eq!(binding.get_integer(0).unwrap(), 5);
    assert!(binding.get_boolean(1).unwrap());
    assert_eq!(binding.get_string(1).unwrap(), "hello");

    let err = binding.get_real(42).unwrap_err();
    assert!(
        matches!(
            err,
            Error::InvalidReference {
                value_reference: 42,
                status: Fmi2Error::Error,
                ..
            }
        ),
        "{err}"
    );
    let err = binding.do_step(0.5, -0.1).unwrap_err();
    assert!(
        matches!(
            err,
            Error::NativeCall {
                stage: Stage::DoStep,
                status: Fmi2Error::Error,
                ..
            }
        ),
        "{err}"
    );

    binding.reset().unwrap();
    assert_eq!(binding.get_integer(0).unwrap(), 0);
    assert_eq!(binding.get_real(1).unwrap(), 0.0);

    binding.terminate().unwrap();
    binding.free();
    binding.free();
    assert!(!binding.is_instantiated());
    assert!(matches!(
        binding.terminate(),
        Err(Error::NotInstantiated { .. })
    ));
}

#[test_log::test]
fn test_binary_round_trip() {
    let mut binding = load(COUNTER);
    binding
        .instantiate("m", GUID, &resource_url(), false)
        .unwrap();
    binding.setup_experiment(None, 0.0, None).unwrap();
    binding.enter_initialization_mode().unwrap();
    binding.exit_initialization_mode().unwrap();

    // Embedded zero bytes must survive: the length is passed explicitly.
    let frame: [u8; 5] = [0x00, 0x01, 0x00, 0xff, 0x7f];
    binding.set_binary(0, &frame).unwrap();
    assert_eq!(binding.get_binary(0).unwrap(), frame);
    binding.do_step(0.0, 0.1).unwrap();
    assert_eq!(binding.get_binary(1).unwrap(), frame);

    binding.set_binary(0, &[]).unwrap();
    assert!(binding.get_binary(0).unwrap().is_empty());
    assert_eq!(binding.get_binary(1).unwrap(), frame);

    assert!(matches!(
        binding.set_binary(7, &frame),
        Err(Error::InvalidReference {
            value_reference: 7,
            ..
        })
    ));
}

#[test_log::test]
fn test_drop_frees_component() {
    let url = resource_url();
    let mut a = load(TALLY);
    let mut b = load(TALLY);
    a.instantiate("a", GUID, &url, false).unwrap();
    b.instantiate("b", GUID, &url, false).unwrap();
    assert_eq!(b.get_integer(1).unwrap(), 2);

    drop(a);
    assert_eq!(b.get_integer(1).unwrap(), 1);

    // Instantiating again replaces the old component instead of leaking it.
    b.instantiate("b", GUID, &url, false).unwrap();
    assert_eq!(b.get_integer(1).unwrap(), 1);
}

#[test_log::test]
fn test_package_native_component() {
    let dir = tempfile::tempdir().unwrap();
    let fmu = dir.path().join("counter.fmu");
    let description = ArchiveBuilder::new("counter", COUNTER).build(&fmu).unwrap();
    assert_eq!(description.guid, GUID);

    let mut entries = FmuArchive::entries(&fmu).unwrap();
    entries.sort();
    assert_eq!(
        entries,
        [
            Platform::host().library_entry("counter"),
            "modelDescription.xml".to_owned()
        ]
    );
    let archive = FmuArchive::open(&fmu).unwrap();
    assert_eq!(
        std::fs::read(archive.library_path()).unwrap(),
        std::fs::read(COUNTER).unwrap()
    );
    assert!(archive.description_xml().contains(GUID));
}

#[test_log::test]
fn test_session_over_native_components() {
    let dir = tempfile::tempdir().unwrap();
    let fmu = dir.path().join("counter.fmu");
    ArchiveBuilder::new("counter", COUNTER).build(&fmu).unwrap();
    let description = FmuArchive::read_description(&fmu).unwrap();
    let counter = ModelDescriptor::from_description(&description, COUNTER).unwrap();

    let mut structure = SimulationStructure::new();
    structure.add_model("a", counter.clone()).unwrap();
    structure.add_model("b", counter).unwrap();
    structure.connect("a.y", "b.u").unwrap();
    structure.connect("a.frame_out", "b.frame_in").unwrap();
    structure.connect("a.label_out", "b.label").unwrap();

    let mut session = SimulationSession::new(&structure, 0.1)
        .unwrap()
        .with_logging(true);
    session.init().unwrap();
    session.set_real("a", "u", 1.0).unwrap();
    session.set_binary("a", "frame_in", &[0xde, 0x00, 0xad]).unwrap();
    session.set_string("a", "label", "hi").unwrap();

    for _ in 0..3 {
        session.step().unwrap();
    }
    assert_approx_eq!(f64, session.current_time(), 0.3, ulps = 2);
    assert_eq!(session.get_integer("a", "count").unwrap(), 3);
    assert_approx_eq!(f64, session.get_real("a", "y").unwrap(), 0.3, epsilon = 1e-12);
    assert_approx_eq!(f64, session.get_real("b", "u").unwrap(), 0.3, epsilon = 1e-12);
    // b sees a's output one step late: 0.1 * (0.0 + 0.1 + 0.2)
    assert_approx_eq!(f64, session.get_real("b", "y").unwrap(), 0.03, epsilon = 1e-12);
    assert_eq!(
        session.get_binary("b", "frame_out").unwrap(),
        [0xde, 0x00, 0xad]
    );
    assert_eq!(session.get_string("b", "label_out").unwrap(), "hi");

    session.terminate().unwrap();
    assert_eq!(session.state(), SessionState::Terminated);
}

#[test_log::test]
fn test_session_rejects_incomplete_component() {
    let mut structure = SimulationStructure::new();
    structure
        .add_model("ok", ModelDescriptor::new("counter", COUNTER).with_guid(GUID))
        .unwrap();
    structure
        .add_model("broken", ModelDescriptor::new("stepless", STEPLESS))
        .unwrap();

    let mut session = SimulationSession::new(&structure, 0.1).unwrap();
    assert!(matches!(
        session.init(),
        Err(Error::SymbolMissing { .. })
    ));
    assert_eq!(session.state(), SessionState::Created);
}
