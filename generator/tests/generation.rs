mod common;

use codegen_cpu::Preferences;
use common::*;
use generator::{generate, write_sources, GenerateError, NEURON_FILE, SYNAPSE_FILE};
use net_model::{MatrixConnectivity, WeightKind};

fn prefs() -> Preferences {
    Preferences {
        auto_refractory: false,
    }
}

fn full_net() -> net_model::Network {
    let mut net = two_pop_net();
    net.synapse_groups.push(static_pulse_synapse(
        MatrixConnectivity::SparseYale,
        WeightKind::Individual,
    ));
    net
}

#[test]
fn write_sources_produces_both_files_with_digests() {
    let dir = tempfile::tempdir().expect("tempdir");
    let net = full_net();
    let report = write_sources(&net, &prefs(), dir.path()).expect("write");

    assert_eq!(report.files.len(), 2);
    assert_eq!(report.files[0].name, NEURON_FILE);
    assert_eq!(report.files[1].name, SYNAPSE_FILE);
    for file in &report.files {
        assert_eq!(file.digest.len(), 64);
        assert!(dir.path().join(&file.name).exists());
    }

    let sources = generate(&net, &prefs()).expect("generate");
    let on_disk = std::fs::read_to_string(dir.path().join(NEURON_FILE)).expect("read");
    assert_eq!(on_disk, sources.neuron);
}

#[test]
fn two_runs_emit_byte_identical_files() {
    let net = full_net();
    let dir_a = tempfile::tempdir().expect("tempdir");
    let dir_b = tempfile::tempdir().expect("tempdir");
    let report_a = write_sources(&net, &prefs(), dir_a.path()).expect("write");
    let report_b = write_sources(&net, &prefs(), dir_b.path()).expect("write");
    assert_eq!(report_a, report_b);

    for name in [NEURON_FILE, SYNAPSE_FILE] {
        let a = std::fs::read(dir_a.path().join(name)).expect("read");
        let b = std::fs::read(dir_b.path().join(name)).expect("read");
        assert_eq!(a, b);
    }
}

#[test]
fn emitted_files_have_balanced_braces_and_guards() {
    let sources = generate(&full_net(), &prefs()).expect("generate");
    for out in [&sources.neuron, &sources.synapse] {
        assert_eq!(out.matches('{').count(), out.matches('}').count());
    }
    assert!(sources.neuron.contains("#ifndef _model_neuronFnct_cc"));
    assert!(sources.synapse.contains("#ifndef _model_synapseFnct_cc"));
    assert!(sources.neuron.trim_end().ends_with("#endif"));
    assert!(sources.synapse.trim_end().ends_with("#endif"));
}

#[test]
fn invalid_model_fails_before_touching_the_filesystem() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut net = full_net();
    net.synapse_groups[0].connectivity = MatrixConnectivity::SparseRagged;
    net.synapse_groups[0].max_connections = 0;

    let err = write_sources(&net, &prefs(), dir.path()).expect_err("must fail");
    assert!(matches!(err, GenerateError::Model(_)));
    assert!(!dir.path().join(NEURON_FILE).exists());
    assert!(!dir.path().join(SYNAPSE_FILE).exists());
}

#[test]
fn io_failure_reports_the_path_and_removes_partial_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    // make the second write fail by occupying its name with a directory
    std::fs::create_dir(dir.path().join(SYNAPSE_FILE)).expect("blocker");

    let err = write_sources(&full_net(), &prefs(), dir.path()).expect_err("must fail");
    match err {
        GenerateError::Io { path, .. } => {
            assert!(path.ends_with(SYNAPSE_FILE));
        }
        other => panic!("expected io error, got {:?}", other),
    }
    // the neuron file had already been written; it must be cleaned up
    assert!(!dir.path().join(NEURON_FILE).exists());
}

#[test]
fn warnings_surface_in_the_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut net = full_net();
    net.neuron_groups[0].model.threshold_condition_code.clear();

    let report = write_sources(&net, &prefs(), dir.path()).expect("write");
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("pre"));
}
