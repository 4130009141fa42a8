//! Address expressions over the four synapse matrix representations.
//!
//! Each function returns the text appended to a weight-update variable name
//! (the arrays are laid out `<var><group>[..]`), or a complete index line.
//! Post-learning walks the reverse structures; its presynaptic index comes
//! from `revInd` (YALE) or from dividing the `remap` entry by the row
//! stride (RAGGED).

use code_stream::CodeStream;
use net_model::{MatrixConnectivity, Network, SynapseGroup};

/// Var-name postfix for the forward passes, where `ipre` is the source
/// index, `j` the neighbour slot, and `ipost` the resolved target index.
pub fn forward_weight_postfix(net: &Network, sg: &SynapseGroup) -> String {
    match sg.connectivity {
        MatrixConnectivity::SparseYale => {
            format!("{0}[C{0}.indInG[ipre] + j]", sg.name)
        }
        MatrixConnectivity::SparseRagged => {
            format!("{0}[(ipre * {1}) + j]", sg.name, sg.max_connections)
        }
        MatrixConnectivity::Dense | MatrixConnectivity::Bitmask => {
            let trg = net.neuron_group(sg.trg);
            format!("{0}[ipre * {1} + ipost]", sg.name, trg.num_neurons)
        }
    }
}

/// Var-name postfix for the post-learning pass, where `ipre` walks the
/// target neuron's column and `lSpk` is the spiking target index.
pub fn post_learn_weight_postfix(net: &Network, sg: &SynapseGroup) -> String {
    if sg.connectivity.is_sparse() {
        format!("{0}[C{0}.remap[ipre]]", sg.name)
    } else {
        let trg = net.neuron_group(sg.trg);
        format!("{0}[lSpk + {1} * ipre]", sg.name, trg.num_neurons)
    }
}

/// Expression for the presynaptic neuron index inside the post-learning
/// column walk.
pub fn post_learn_pre_index(sg: &SynapseGroup) -> String {
    match sg.connectivity {
        MatrixConnectivity::SparseYale => format!("C{0}.revInd[ipre]", sg.name),
        MatrixConnectivity::SparseRagged => {
            format!("(C{0}.remap[ipre] / {1})", sg.name, sg.max_connections)
        }
        MatrixConnectivity::Dense | MatrixConnectivity::Bitmask => "ipre".to_string(),
    }
}

/// Bit test over the packed connectivity words of a BITMASK group.
pub fn bitmask_test(sg: &SynapseGroup) -> String {
    format!("B(gp{}[gid / 32], gid & 31)", sg.name)
}

/// Emit the inner loop over the row of `ipre`, resolving `ipost` (and the
/// bitmask `gid`) before handing off to `body`. The loop bound is the row
/// length for sparse kinds and the full target population otherwise.
pub fn emit_row_loop(
    cs: &mut CodeStream,
    net: &Network,
    sg: &SynapseGroup,
    body: impl FnOnce(&mut CodeStream),
) {
    let trg = net.neuron_group(sg.trg);
    match sg.connectivity {
        MatrixConnectivity::SparseYale => {
            cs.line(&format!(
                "const unsigned int npost = C{0}.indInG[ipre + 1] - C{0}.indInG[ipre];",
                sg.name
            ));
            cs.scope("for (unsigned int j = 0; j < npost; j++)", |cs| {
                cs.line(&format!(
                    "const unsigned int ipost = C{0}.ind[C{0}.indInG[ipre] + j];",
                    sg.name
                ));
                body(cs);
            });
        }
        MatrixConnectivity::SparseRagged => {
            cs.line(&format!(
                "const unsigned int npost = C{0}.rowLength[ipre];",
                sg.name
            ));
            cs.scope("for (unsigned int j = 0; j < npost; j++)", |cs| {
                cs.line(&format!(
                    "const unsigned int ipost = C{0}.ind[(ipre * {1}) + j];",
                    sg.name, sg.max_connections
                ));
                body(cs);
            });
        }
        MatrixConnectivity::Dense => {
            let header = format!(
                "for (unsigned int ipost = 0; ipost < {}; ipost++)",
                trg.num_neurons
            );
            cs.scope(&header, body);
        }
        MatrixConnectivity::Bitmask => {
            let header = format!(
                "for (unsigned int ipost = 0; ipost < {}; ipost++)",
                trg.num_neurons
            );
            cs.scope(&header, |cs| {
                cs.line(&format!(
                    "const uint64_t gid = (ipre * {}ull + ipost);",
                    trg.num_neurons
                ));
                body(cs);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use net_model::{
        NeuronGroup, NeuronGroupId, NeuronModel, PostSynapticModel, WeightKind, WeightUpdateModel,
    };

    fn net_with(connectivity: MatrixConnectivity) -> Network {
        let mut net = Network::new("m");
        net.neuron_groups
            .push(NeuronGroup::new("pre", 6, NeuronModel::default()));
        net.neuron_groups
            .push(NeuronGroup::new("post", 10, NeuronModel::default()));
        let mut sg = SynapseGroup::new(
            "syn",
            NeuronGroupId(0),
            NeuronGroupId(1),
            connectivity,
            WeightKind::Individual,
            WeightUpdateModel::default(),
            PostSynapticModel::default(),
        );
        sg.max_connections = 3;
        net.synapse_groups.push(sg);
        net
    }

    #[test]
    fn yale_forward_addressing() {
        let net = net_with(MatrixConnectivity::SparseYale);
        assert_eq!(
            forward_weight_postfix(&net, &net.synapse_groups[0]),
            "syn[Csyn.indInG[ipre] + j]"
        );
    }

    #[test]
    fn ragged_forward_addressing_uses_row_stride() {
        let net = net_with(MatrixConnectivity::SparseRagged);
        assert_eq!(
            forward_weight_postfix(&net, &net.synapse_groups[0]),
            "syn[(ipre * 3) + j]"
        );
    }

    #[test]
    fn dense_forward_addressing() {
        let net = net_with(MatrixConnectivity::Dense);
        assert_eq!(
            forward_weight_postfix(&net, &net.synapse_groups[0]),
            "syn[ipre * 10 + ipost]"
        );
    }

    #[test]
    fn post_learn_reverse_addressing() {
        let net = net_with(MatrixConnectivity::SparseRagged);
        let sg = &net.synapse_groups[0];
        assert_eq!(post_learn_weight_postfix(&net, sg), "syn[Csyn.remap[ipre]]");
        assert_eq!(post_learn_pre_index(sg), "(Csyn.remap[ipre] / 3)");
    }

    #[test]
    fn yale_row_loop_bound_is_row_length_difference() {
        let net = net_with(MatrixConnectivity::SparseYale);
        let mut cs = CodeStream::new();
        emit_row_loop(&mut cs, &net, &net.synapse_groups[0], |cs| {
            cs.line("body();");
        });
        let out = cs.finish();
        assert!(out.contains("const unsigned int npost = Csyn.indInG[ipre + 1] - Csyn.indInG[ipre];"));
        assert!(out.contains("const unsigned int ipost = Csyn.ind[Csyn.indInG[ipre] + j];"));
    }

    #[test]
    fn bitmask_row_loop_declares_gid() {
        let net = net_with(MatrixConnectivity::Bitmask);
        let mut cs = CodeStream::new();
        emit_row_loop(&mut cs, &net, &net.synapse_groups[0], |_| {});
        let out = cs.finish();
        assert!(out.contains("const uint64_t gid = (ipre * 10ull + ipost);"));
    }
}
