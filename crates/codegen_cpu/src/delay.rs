//! Slot and offset expressions for the circular spike and state queues.

use net_model::{Network, NeuronGroup, SynapseGroup};

/// Offset of the slot written one step ago: `((p + D - 1) % D) * N`.
pub fn prev_queue_offset(ng: &NeuronGroup) -> String {
    format!(
        "(((spkQuePtr{} + {}) % {}) * {})",
        ng.name,
        ng.num_delay_slots - 1,
        ng.num_delay_slots,
        ng.num_neurons
    )
}

/// Offset of the slot written this step: `p * N`.
pub fn current_queue_offset(ng: &NeuronGroup) -> String {
    format!("(spkQuePtr{} * {})", ng.name, ng.num_neurons)
}

/// Slot holding the source group's spikes as seen through the axonal delay.
pub fn axonal_delay_slot(net: &Network, sg: &SynapseGroup) -> String {
    let src = net.neuron_group(sg.src);
    if sg.axonal_delay_steps == 0 {
        format!("spkQuePtr{}", src.name)
    } else {
        format!(
            "((spkQuePtr{} + {}) % {})",
            src.name,
            src.num_delay_slots - sg.axonal_delay_steps,
            src.num_delay_slots
        )
    }
}

/// Slot holding the target group's spikes as seen through the back-prop delay.
pub fn back_prop_delay_slot(net: &Network, sg: &SynapseGroup) -> String {
    let trg = net.neuron_group(sg.trg);
    if sg.back_prop_delay_steps == 0 {
        format!("spkQuePtr{}", trg.name)
    } else {
        format!(
            "((spkQuePtr{} + {}) % {})",
            trg.name,
            trg.num_delay_slots - sg.back_prop_delay_steps,
            trg.num_delay_slots
        )
    }
}

/// Leading offset term for the dendritic-delay buffer of `sg`, with a
/// trailing `+` so callers can append the post-neuron index. An empty
/// `delay` addresses the current front slot; otherwise the slot `delay`
/// timesteps ahead of it.
pub fn dendritic_delay_offset(net: &Network, sg: &SynapseGroup, delay: &str) -> String {
    let trg = net.neuron_group(sg.trg);
    let psm = &sg.ps_model_target_name;
    if delay.is_empty() {
        format!("(denDelayPtr{} * {}) + ", psm, trg.num_neurons)
    } else {
        format!(
            "(((denDelayPtr{} + {}) % {}) * {}) + ",
            psm, delay, sg.max_dendritic_delay_slots, trg.num_neurons
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use net_model::{
        MatrixConnectivity, NeuronGroup, NeuronGroupId, NeuronModel, Network, PostSynapticModel,
        SynapseGroup, WeightKind, WeightUpdateModel,
    };

    fn delayed_net() -> Network {
        let mut net = Network::new("m");
        let mut pre = NeuronGroup::new("pre", 8, NeuronModel::default());
        pre.delay_required = true;
        pre.num_delay_slots = 7;
        net.neuron_groups.push(pre);
        net.neuron_groups
            .push(NeuronGroup::new("post", 4, NeuronModel::default()));
        let mut sg = SynapseGroup::new(
            "syn",
            NeuronGroupId(0),
            NeuronGroupId(1),
            MatrixConnectivity::Dense,
            WeightKind::Individual,
            WeightUpdateModel::default(),
            PostSynapticModel::default(),
        );
        sg.axonal_delay_steps = 3;
        sg.max_dendritic_delay_slots = 10;
        net.synapse_groups.push(sg);
        net
    }

    #[test]
    fn queue_offsets() {
        let net = delayed_net();
        let pre = &net.neuron_groups[0];
        assert_eq!(prev_queue_offset(pre), "(((spkQuePtrpre + 6) % 7) * 8)");
        assert_eq!(current_queue_offset(pre), "(spkQuePtrpre * 8)");
    }

    #[test]
    fn axonal_slot_wraps_by_remaining_slots() {
        let net = delayed_net();
        let sg = &net.synapse_groups[0];
        assert_eq!(axonal_delay_slot(&net, sg), "((spkQuePtrpre + 4) % 7)");
    }

    #[test]
    fn zero_axonal_delay_reads_current_slot() {
        let mut net = delayed_net();
        net.synapse_groups[0].axonal_delay_steps = 0;
        let sg = &net.synapse_groups[0];
        assert_eq!(axonal_delay_slot(&net, sg), "spkQuePtrpre");
    }

    #[test]
    fn dendritic_offsets() {
        let net = delayed_net();
        let sg = &net.synapse_groups[0];
        assert_eq!(
            dendritic_delay_offset(&net, sg, ""),
            "(denDelayPtrsyn * 4) + "
        );
        assert_eq!(
            dendritic_delay_offset(&net, sg, "$(1)"),
            "(((denDelayPtrsyn + $(1)) % 10) * 4) + "
        );
    }
}
