#![forbid(unsafe_code)]

//! CPU simulation-step code generator. Consumes a finalized
//! [`net_model::Network`] and produces the text of the two per-timestep
//! update functions; it never executes anything it emits.

mod delay;
mod indexing;
mod neuron;
mod subs;
mod synapse;

pub use delay::{current_queue_offset, prev_queue_offset};

use code_stream::CodeStream;
use net_model::Network;
use serde::{Deserialize, Serialize};

/// Tag for the event / bitmask guard bracket, which opens before the user
/// fragment is emitted and closes after it.
pub const GUARD_BRACKET: u32 = 2041;
/// Tag for the post-synaptic support-code namespace bracket.
pub const SUPPORT_CODE_BRACKET: u32 = 29;

/// Process-wide generation preferences, fixed before generation starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Preferences {
    /// Suppress a spike when the threshold condition already held before
    /// the state update. Note this evaluates the threshold twice per
    /// neuron per step, which user code with side effects can observe.
    pub auto_refractory: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            auto_refractory: true,
        }
    }
}

/// Generation-time diagnostics. Warnings are logged as they arise and
/// collected for the caller's report; nothing here is fatal.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub warnings: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, message: String) {
        log::warn!("{}", message);
        self.warnings.push(message);
    }
}

/// Generate the complete neuron update file (`neuronFnct.cc`).
pub fn generate_neuron_file(net: &Network, prefs: &Preferences, diags: &mut Diagnostics) -> String {
    let mut cs = CodeStream::new();
    file_banner(&mut cs, net, "neuronFnct.cc", "neuron update function");
    cs.line(&format!("#ifndef _{}_neuronFnct_cc", net.name));
    cs.line(&format!("#define _{}_neuronFnct_cc", net.name));
    cs.blank();
    cs.line("#include \"support_code.h\"");
    cs.blank();

    neuron::emit_calc_neurons(net, prefs, diags, &mut cs);

    cs.blank();
    cs.line("#endif");
    cs.finish()
}

/// Generate the complete synapse update file (`synapseFnct.cc`): the
/// optional synapse-dynamics pass, spike propagation, and the optional
/// post-learning pass, in that order. Preferences do not influence this
/// file; only the neuron pass consumes them.
pub fn generate_synapse_file(net: &Network) -> String {
    let mut cs = CodeStream::new();
    file_banner(&mut cs, net, "synapseFnct.cc", "synapse and learning update functions");
    cs.line(&format!("#ifndef _{}_synapseFnct_cc", net.name));
    cs.line(&format!("#define _{}_synapseFnct_cc", net.name));
    cs.blank();
    cs.line("#include \"support_code.h\"");
    cs.blank();

    if !net.synapse_dynamics_groups.is_empty() {
        synapse::emit_synapse_dynamics(net, &mut cs);
        cs.blank();
    }

    synapse::emit_calc_synapses(net, &mut cs);

    if !net.post_learn_groups.is_empty() {
        cs.blank();
        synapse::emit_post_learning(net, &mut cs);
    }

    cs.blank();
    cs.line("#endif");
    cs.finish()
}

fn file_banner(cs: &mut CodeStream, net: &Network, file: &str, role: &str) {
    cs.line("//-------------------------------------------------------------------------");
    cs.line(&format!("// {}", file));
    cs.line("//");
    cs.line(&format!(
        "// Generated from the network model {}; contains the {}",
        net.name, role
    ));
    cs.line("// for the CPU-only build. Do not edit by hand.");
    cs.line("//-------------------------------------------------------------------------");
    cs.blank();
}
