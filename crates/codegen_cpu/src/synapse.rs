//! Synapse pass emitters: per-step synapse dynamics, presynaptic spike and
//! spike-like-event propagation, and post-spike learning over the reverse
//! connectivity structures.

use code_stream::CodeStream;
use code_subst::{function_substitute, name_substitutions, substitute};
use net_model::{MatrixConnectivity, Network, SynapseGroup, WeightKind};

use crate::delay;
use crate::indexing;
use crate::subs;
use crate::GUARD_BRACKET;

/// Spike propagation comes in two flavours per group; events run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpikeKind {
    Event,
    True,
}

impl SpikeKind {
    /// Name suffix on the spike queue globals (`glbSpkEvnt` / `glbSpk`).
    fn postfix(self) -> &'static str {
        match self {
            SpikeKind::Event => "Evnt",
            SpikeKind::True => "",
        }
    }
}

pub fn emit_synapse_dynamics(net: &Network, cs: &mut CodeStream) {
    let header = format!(
        "void calcSynapseDynamicsCPU({} t)",
        net.time_precision.scalar_type()
    );
    cs.scope(&header, |cs| {
        cs.line(&format!("{} addtoinSyn;", net.precision.scalar_type()));
        cs.blank();
        cs.line("// execute internal synapse dynamics if any");
        for id in &net.synapse_dynamics_groups {
            let sg = net.synapse_group(*id);
            cs.line(&format!("// synapse group {}", sg.name));
            cs.scope("", |cs| {
                emit_dynamics_group(net, sg, cs);
            });
        }
    });
}

fn emit_dynamics_group(net: &Network, sg: &SynapseGroup, cs: &mut CodeStream) {
    let src = net.neuron_group(sg.src);
    let trg = net.neuron_group(sg.trg);

    if src.delay_required {
        cs.line(&format!(
            "const unsigned int preReadDelayOffset = {} * {};",
            delay::axonal_delay_slot(net, sg),
            src.num_neurons
        ));
    }
    if trg.delay_required {
        cs.line(&format!(
            "const unsigned int postReadDelayOffset = {} * {};",
            delay::back_prop_delay_slot(net, sg),
            trg.num_neurons
        ));
    }
    if !sg.wu_model.synapse_dynamics_support_code.is_empty() {
        cs.line(&format!(
            "using namespace {}_weightupdate_synapseDynamics;",
            sg.name
        ));
    }

    let base = substitute(&sg.wu_model.synapse_dynamics_code, "$(t)", "t");

    match sg.connectivity {
        MatrixConnectivity::SparseYale => {
            cs.scope(
                &format!("for (int n = 0; n < C{}.connN; n++)", sg.name),
                |cs| {
                    let mut code = base.clone();
                    if sg.weight_kind == WeightKind::Individual {
                        code = name_substitutions(
                            &code,
                            "",
                            subs::var_names(&sg.wu_model.vars),
                            &format!("{}[n]", sg.name),
                            "",
                        );
                    }
                    let post_idx = format!("C{}.ind[n]", sg.name);
                    code = accumulator_substitutions(net, sg, &code, &post_idx);
                    let pre_idx = format!("C{}.preInd[n]", sg.name);
                    code = subs::wu_code_subs(&code, net, sg, &pre_idx, &post_idx, true);
                    cs.fragment(&code);
                },
            );
        }
        MatrixConnectivity::SparseRagged => {
            cs.scope(
                &format!("for (int i = 0; i < {}; i++)", src.num_neurons),
                |cs| {
                    cs.scope(
                        &format!("for (int j = 0; j < C{}.rowLength[i]; j++)", sg.name),
                        |cs| {
                            cs.line(&format!(
                                "const int n = (i * {}) + j;",
                                sg.max_connections
                            ));
                            let mut code = base.clone();
                            if sg.weight_kind == WeightKind::Individual {
                                code = name_substitutions(
                                    &code,
                                    "",
                                    subs::var_names(&sg.wu_model.vars),
                                    &format!("{}[n]", sg.name),
                                    "",
                                );
                            }
                            let post_idx = format!("C{}.ind[n]", sg.name);
                            code = accumulator_substitutions(net, sg, &code, &post_idx);
                            code = subs::wu_code_subs(&code, net, sg, "i", &post_idx, true);
                            cs.fragment(&code);
                        },
                    );
                },
            );
        }
        MatrixConnectivity::Dense | MatrixConnectivity::Bitmask => {
            cs.scope(
                &format!("for (int i = 0; i < {}; i++)", src.num_neurons),
                |cs| {
                    cs.scope(
                        &format!("for (int j = 0; j < {}; j++)", trg.num_neurons),
                        |cs| {
                            let mut code = base.clone();
                            if sg.weight_kind == WeightKind::Individual {
                                code = name_substitutions(
                                    &code,
                                    "",
                                    subs::var_names(&sg.wu_model.vars),
                                    &format!("{}[(i * {}) + j]", sg.name, trg.num_neurons),
                                    "",
                                );
                            }
                            // j is the postsynaptic index in this loop shape
                            code = accumulator_substitutions(net, sg, &code, "j");
                            code = subs::wu_code_subs(&code, net, sg, "i", "j", true);
                            cs.fragment(&code);
                        },
                    );
                },
            );
        }
    }
}

/// Rewrite the input-accumulation pseudo-calls for a known postsynaptic
/// index. The deprecated `$(updatelinsyn)` / `$(inSyn)` / `$(addtoinSyn)`
/// aliases stay in the non-dendritic path for compatibility with old
/// model code.
fn accumulator_substitutions(
    net: &Network,
    sg: &SynapseGroup,
    code: &str,
    post_idx: &str,
) -> String {
    let psm_target = &sg.ps_model_target_name;
    if sg.dendritic_delay_required {
        function_substitute(
            code,
            "addToInSynDelay",
            2,
            &format!(
                "denDelay{}[{}{}] += $(0)",
                psm_target,
                delay::dendritic_delay_offset(net, sg, "$(1)"),
                post_idx
            ),
        )
    } else {
        let code = function_substitute(
            code,
            "addToInSyn",
            1,
            &format!("inSyn{}[{}] += $(0)", psm_target, post_idx),
        );
        let code = substitute(&code, "$(updatelinsyn)", "$(inSyn) += $(addtoinSyn)");
        let code = substitute(&code, "$(inSyn)", &format!("inSyn{}[{}]", psm_target, post_idx));
        substitute(&code, "$(addtoinSyn)", "addtoinSyn")
    }
}

pub fn emit_calc_synapses(net: &Network, cs: &mut CodeStream) {
    let header = format!("void calcSynapsesCPU({} t)", net.time_precision.scalar_type());
    cs.scope(&header, |cs| {
        cs.blank();
        for sg in &net.synapse_groups {
            cs.line(&format!("// synapse group {}", sg.name));
            cs.scope("", |cs| {
                let src = net.neuron_group(sg.src);
                let trg = net.neuron_group(sg.trg);
                if src.delay_required {
                    cs.line(&format!(
                        "const unsigned int preReadDelaySlot = {};",
                        delay::axonal_delay_slot(net, sg)
                    ));
                    cs.line(&format!(
                        "const unsigned int preReadDelayOffset = preReadDelaySlot * {};",
                        src.num_neurons
                    ));
                }
                if trg.delay_required {
                    cs.line(&format!(
                        "const unsigned int postReadDelayOffset = {} * {};",
                        delay::back_prop_delay_slot(net, sg),
                        trg.num_neurons
                    ));
                }

                if sg.is_spike_event_required() {
                    emit_presynaptic_events(net, sg, SpikeKind::Event, cs);
                }
                if sg.is_true_spike_required() {
                    emit_presynaptic_events(net, sg, SpikeKind::True, cs);
                }
            });
            cs.blank();
        }
    });
}

fn emit_presynaptic_events(net: &Network, sg: &SynapseGroup, kind: SpikeKind, cs: &mut CodeStream) {
    let src = net.neuron_group(sg.src);
    let postfix = kind.postfix();

    cs.line(&format!(
        "// process presynaptic events: {}",
        match kind {
            SpikeKind::Event => "Spike type events",
            SpikeKind::True => "True Spikes",
        }
    ));

    let count_slot = if src.delay_required {
        "preReadDelaySlot"
    } else {
        "0"
    };
    let outer = format!(
        "for (unsigned int i = 0; i < glbSpkCnt{}{}[{}]; i++)",
        postfix, src.name, count_slot
    );
    cs.scope(&outer, |cs| {
        let queue_offset = if src.delay_required {
            "preReadDelayOffset + "
        } else {
            ""
        };
        cs.line(&format!(
            "const unsigned int ipre = glbSpk{}{}[{}i];",
            postfix, src.name, queue_offset
        ));

        indexing::emit_row_loop(cs, net, sg, |cs| {
            if !sg.wu_model.sim_support_code.is_empty() {
                cs.line(&format!("using namespace {}_weightupdate_simCode;", sg.name));
            }
            emit_propagation_body(net, sg, kind, cs);
        });
    });
}

/// The guarded body at one (ipre, ipost) site: event-threshold and/or
/// bitmask guard, accumulator rewrite, weight addressing, and the user
/// fragment. The guard opens inside control flow that the user fragment
/// cannot see, so it is bracketed by tag rather than closure.
fn emit_propagation_body(net: &Network, sg: &SynapseGroup, kind: SpikeKind, cs: &mut CodeStream) {
    let bitmask = sg.connectivity == MatrixConnectivity::Bitmask;
    let mut guarded = false;

    if kind == SpikeKind::Event {
        let e_code = substitute(&sg.wu_model.event_threshold_condition_code, "$(id)", "n");
        let e_code = substitute(&e_code, "$(t)", "t");
        let e_code = subs::wu_threshold_subs(&e_code, net, sg);

        let header = if bitmask {
            format!("if (({}) && ({}))", indexing::bitmask_test(sg), e_code)
        } else {
            format!("if ({})", e_code)
        };
        cs.open_tagged(&header, GUARD_BRACKET);
        guarded = true;
    } else if bitmask {
        cs.open_tagged(&format!("if ({})", indexing::bitmask_test(sg)), GUARD_BRACKET);
        guarded = true;
    }

    let mut code = match kind {
        SpikeKind::Event => sg.wu_model.event_code.clone(),
        SpikeKind::True => sg.wu_model.sim_code.clone(),
    };

    if sg.dendritic_delay_required {
        code = function_substitute(
            &code,
            "addToInSynDelay",
            2,
            &format!(
                "denDelay{}[{}ipost] += $(0)",
                sg.ps_model_target_name,
                delay::dendritic_delay_offset(net, sg, "$(1)")
            ),
        );
    } else {
        code = function_substitute(
            &code,
            "addToInSyn",
            1,
            &format!("inSyn{}[ipost] += $(0)", sg.ps_model_target_name),
        );
        cs.line(&format!("{} addtoinSyn;", net.precision.scalar_type()));
        code = substitute(&code, "$(updatelinsyn)", "$(inSyn) += $(addtoinSyn)");
        code = substitute(
            &code,
            "$(inSyn)",
            &format!("inSyn{}[ipost]", sg.ps_model_target_name),
        );
        code = substitute(&code, "$(addtoinSyn)", "addtoinSyn");
    }

    code = substitute(&code, "$(t)", "t");
    if sg.weight_kind == WeightKind::Individual {
        code = name_substitutions(
            &code,
            "",
            subs::var_names(&sg.wu_model.vars),
            &indexing::forward_weight_postfix(net, sg),
            "",
        );
    }
    code = subs::wu_code_subs(&code, net, sg, "ipre", "ipost", true);
    cs.fragment(&code);

    if guarded {
        cs.close_tagged(GUARD_BRACKET);
    }
}

pub fn emit_post_learning(net: &Network, cs: &mut CodeStream) {
    let header = format!(
        "void learnSynapsesPostHost({} t)",
        net.time_precision.scalar_type()
    );
    cs.scope(&header, |cs| {
        cs.line("unsigned int ipost;");
        cs.line("unsigned int ipre;");
        cs.line("unsigned int lSpk;");
        if net
            .synapse_groups
            .iter()
            .any(|sg| sg.connectivity.is_sparse())
        {
            cs.line("unsigned int npre;");
        }
        cs.blank();

        for id in &net.post_learn_groups {
            let sg = net.synapse_group(*id);
            cs.line(&format!("// synapse group {}", sg.name));
            cs.scope("", |cs| {
                emit_post_learn_group(net, sg, cs);
            });
        }
    });
}

// Backward propagation deliberately ignores the axonal delay; only the
// back-prop slot selects which post spikes are learned from.
fn emit_post_learn_group(net: &Network, sg: &SynapseGroup, cs: &mut CodeStream) {
    let src = net.neuron_group(sg.src);
    let trg = net.neuron_group(sg.trg);
    let sparse = sg.connectivity.is_sparse();

    if src.delay_required {
        cs.line(&format!(
            "const unsigned int preReadDelayOffset = {} * {};",
            delay::axonal_delay_slot(net, sg),
            src.num_neurons
        ));
    }
    if trg.delay_required {
        cs.line(&format!(
            "const unsigned int postReadDelaySlot = {};",
            delay::back_prop_delay_slot(net, sg)
        ));
        cs.line(&format!(
            "const unsigned int postReadDelayOffset = postReadDelaySlot * {};",
            trg.num_neurons
        ));
    }
    if !sg.wu_model.learn_post_support_code.is_empty() {
        cs.line(&format!(
            "using namespace {}_weightupdate_simLearnPost;",
            sg.name
        ));
    }

    let count_slot = if trg.delay_required && trg.true_spike_required {
        "postReadDelaySlot"
    } else {
        "0"
    };
    let outer = format!(
        "for (ipost = 0; ipost < glbSpkCnt{}[{}]; ipost++)",
        trg.name, count_slot
    );
    cs.scope(&outer, |cs| {
        let spk_offset = if trg.true_spike_required && trg.delay_required {
            "postReadDelayOffset + "
        } else {
            ""
        };
        cs.line(&format!(
            "lSpk = glbSpk{}[{}ipost];",
            trg.name, spk_offset
        ));

        let inner = if sparse {
            match sg.connectivity {
                MatrixConnectivity::SparseYale => {
                    cs.line(&format!(
                        "npre = C{0}.revIndInG[lSpk + 1] - C{0}.revIndInG[lSpk];",
                        sg.name
                    ));
                }
                _ => {
                    cs.line(&format!("npre = C{}.colLength[lSpk];", sg.name));
                }
            }
            "for (int l = 0; l < npre; l++)".to_string()
        } else {
            format!("for (ipre = 0; ipre < {}; ipre++)", src.num_neurons)
        };
        cs.scope(&inner, |cs| {
            if sparse {
                match sg.connectivity {
                    MatrixConnectivity::SparseYale => {
                        cs.line(&format!("ipre = C{}.revIndInG[lSpk] + l;", sg.name));
                    }
                    _ => {
                        cs.line(&format!(
                            "ipre = (lSpk * {}) + l;",
                            sg.max_source_connections
                        ));
                    }
                }
            }

            let code = substitute(&sg.wu_model.learn_post_code, "$(t)", "t");
            let code = name_substitutions(
                &code,
                "",
                subs::var_names(&sg.wu_model.vars),
                &indexing::post_learn_weight_postfix(net, sg),
                "",
            );
            let pre_index = indexing::post_learn_pre_index(sg);
            let code = subs::wu_code_subs(&code, net, sg, &pre_index, "lSpk", false);
            cs.fragment(&code);
        });
    });
}
