#![forbid(unsafe_code)]

//! File boundary around the CPU code generator: validate the network,
//! render both source files, write them under the output directory, and
//! report per-file digests plus any generation-time warnings.

use codegen_cpu::{generate_neuron_file, generate_synapse_file, Diagnostics, Preferences};
use net_model::{ModelError, Network};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const NEURON_FILE: &str = "neuronFnct.cc";
pub const SYNAPSE_FILE: &str = "synapseFnct.cc";

const FILE_DIGEST_DOMAIN: &str = "NETGEN:CPU:FILE";

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("invalid network model: {0}")]
    Model(#[from] ModelError),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Both generated sources, before anything touches the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSources {
    pub neuron: String,
    pub synapse: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub name: String,
    pub digest: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateReport {
    pub files: Vec<GeneratedFile>,
    pub warnings: Vec<String>,
}

/// Validate the model and render both files. No filesystem side effects;
/// a model error here means no output file was created or truncated.
pub fn generate(net: &Network, prefs: &Preferences) -> Result<GeneratedSources, GenerateError> {
    net.validate()?;
    let mut diags = Diagnostics::new();
    let neuron = generate_neuron_file(net, prefs, &mut diags);
    let synapse = generate_synapse_file(net);
    Ok(GeneratedSources {
        neuron,
        synapse,
        warnings: diags.warnings,
    })
}

/// Generate and write `neuronFnct.cc` and `synapseFnct.cc` into `out_dir`.
/// On an I/O failure the partially written outputs are removed before the
/// error is returned; the whole set is regenerated wholesale on retry.
pub fn write_sources(
    net: &Network,
    prefs: &Preferences,
    out_dir: impl AsRef<Path>,
) -> Result<GenerateReport, GenerateError> {
    let out_dir = out_dir.as_ref();
    let sources = generate(net, prefs)?;

    let mut report = GenerateReport {
        files: Vec::new(),
        warnings: sources.warnings,
    };
    for (name, text) in [(NEURON_FILE, &sources.neuron), (SYNAPSE_FILE, &sources.synapse)] {
        let path = out_dir.join(name);
        if let Err(source) = fs::write(&path, text) {
            remove_partial_outputs(out_dir);
            return Err(GenerateError::Io { path, source });
        }
        report.files.push(GeneratedFile {
            name: name.to_string(),
            digest: file_digest(text),
        });
    }
    Ok(report)
}

/// Domain-separated digest of one generated file, hex-encoded. Two runs
/// over the same model must agree on these byte for byte.
pub fn file_digest(text: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(FILE_DIGEST_DOMAIN.as_bytes());
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize().as_bytes())
}

fn remove_partial_outputs(out_dir: &Path) {
    for name in [NEURON_FILE, SYNAPSE_FILE] {
        let _ = fs::remove_file(out_dir.join(name));
    }
}

/// Load generation preferences from a YAML file.
pub fn load_preferences(path: impl AsRef<Path>) -> Result<Preferences, GenerateError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| GenerateError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&text).map_err(|source| GenerateError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
