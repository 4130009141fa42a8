#![cfg(test)]

use net_model::{
    MatrixConnectivity, NeuronGroup, NeuronGroupId, NeuronModel, Network, PostSynapticModel,
    SynapseGroup, Var, WeightKind, WeightUpdateModel,
};

/// A neuron that tracks the time and spikes above 0.5.
pub fn tracking_model() -> NeuronModel {
    NeuronModel {
        sim_code: "$(x) = $(t);".to_string(),
        threshold_condition_code: "$(x) > 0.5".to_string(),
        vars: vec![Var::new("x", "scalar")],
        ..Default::default()
    }
}

/// "pre" (10 neurons) feeding "post" (4 neurons), no synapses yet.
pub fn two_pop_net() -> Network {
    let mut net = Network::new("model");
    net.neuron_groups
        .push(NeuronGroup::new("pre", 10, tracking_model()));
    net.neuron_groups
        .push(NeuronGroup::new("post", 4, tracking_model()));
    net
}

/// A static-pulse synapse group "syn" from "pre" to "post" with a single
/// weight `w`, delivered through `addToInSyn`.
pub fn static_pulse_synapse(
    connectivity: MatrixConnectivity,
    weight_kind: WeightKind,
) -> SynapseGroup {
    let wu = WeightUpdateModel {
        sim_code: "$(addToInSyn, $(w));".to_string(),
        vars: vec![Var::new("w", "scalar")],
        ..Default::default()
    };
    let mut sg = SynapseGroup::new(
        "syn",
        NeuronGroupId(0),
        NeuronGroupId(1),
        connectivity,
        weight_kind,
        wu,
        PostSynapticModel::default(),
    );
    sg.max_connections = 3;
    sg.max_source_connections = 5;
    if weight_kind == WeightKind::Global {
        sg.wu_global_var_values = vec![0.05];
    }
    sg
}

/// Index of `needle` in `haystack`, failing the test with context if absent.
pub fn find(haystack: &str, needle: &str) -> usize {
    match haystack.find(needle) {
        Some(pos) => pos,
        None => panic!("expected to find {:?} in generated code:\n{}", needle, haystack),
    }
}

/// Assert that each needle occurs, in the given order.
pub fn assert_ordered(haystack: &str, needles: &[&str]) {
    let mut last = 0;
    for needle in needles {
        let pos = match haystack[last..].find(needle) {
            Some(pos) => last + pos,
            None => panic!(
                "expected {:?} after byte {} of generated code:\n{}",
                needle, last, haystack
            ),
        };
        last = pos + needle.len();
    }
}
