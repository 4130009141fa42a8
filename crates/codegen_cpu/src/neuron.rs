//! Per-timestep neuron update emitter: one scoped block per group, with
//! queue maintenance, merged post-synaptic input, the user sim fragment,
//! spike and event registration, reset, and state write-back.

use code_stream::CodeStream;
use code_subst::substitute;
use net_model::{Network, NeuronGroup, SynapseGroup};

use crate::delay;
use crate::subs;
use crate::{Diagnostics, Preferences, SUPPORT_CODE_BRACKET};

pub fn emit_calc_neurons(
    net: &Network,
    prefs: &Preferences,
    diags: &mut Diagnostics,
    cs: &mut CodeStream,
) {
    let header = format!("void calcNeuronsCPU({} t)", net.time_precision.scalar_type());
    cs.scope(&header, |cs| {
        for ng in &net.neuron_groups {
            cs.line(&format!("// neuron group {}", ng.name));
            cs.scope("", |cs| {
                emit_group(net, prefs, diags, ng, cs);
            });
            cs.blank();
        }
    });
}

fn emit_group(
    net: &Network,
    prefs: &Preferences,
    diags: &mut Diagnostics,
    ng: &NeuronGroup,
    cs: &mut CodeStream,
) {
    emit_output_init(ng, cs);

    if ng.delay_required {
        cs.line(&format!(
            "const unsigned int readDelayOffset = {};",
            delay::prev_queue_offset(ng)
        ));
        cs.line(&format!(
            "const unsigned int writeDelayOffset = {};",
            delay::current_queue_offset(ng)
        ));
    }
    cs.blank();

    let loop_header = format!("for (int n = 0; n < {}; n++)", ng.num_neurons);
    cs.scope(&loop_header, |cs| {
        emit_body(net, prefs, diags, ng, cs);
    });
}

/// Reset this step's spike counts and advance the queue pointer.
fn emit_output_init(ng: &NeuronGroup, cs: &mut CodeStream) {
    if ng.delay_required {
        cs.line(&format!(
            "spkQuePtr{0} = (spkQuePtr{0} + 1) % {1};",
            ng.name, ng.num_delay_slots
        ));
        if ng.spike_event_required {
            cs.line(&format!("glbSpkCntEvnt{0}[spkQuePtr{0}] = 0;", ng.name));
        }
        if ng.true_spike_required {
            cs.line(&format!("glbSpkCnt{0}[spkQuePtr{0}] = 0;", ng.name));
        } else {
            cs.line(&format!("glbSpkCnt{}[0] = 0;", ng.name));
        }
    } else {
        if ng.spike_event_required {
            cs.line(&format!("glbSpkCntEvnt{}[0] = 0;", ng.name));
        }
        cs.line(&format!("glbSpkCnt{}[0] = 0;", ng.name));
    }
}

fn emit_body(
    net: &Network,
    prefs: &Preferences,
    diags: &mut Diagnostics,
    ng: &NeuronGroup,
    cs: &mut CodeStream,
) {
    let nm = &ng.model;
    let read_offset = |queued: bool| {
        if ng.delay_required && queued {
            "readDelayOffset + "
        } else {
            ""
        }
    };
    let write_offset = |queued: bool| {
        if ng.delay_required && queued {
            "writeDelayOffset + "
        } else {
            ""
        }
    };

    // local copies of the neuron state
    for v in &nm.vars {
        cs.line(&format!(
            "{0} l{1} = {1}{2}[{3}n];",
            v.ty,
            v.name,
            ng.name,
            read_offset(ng.is_var_queue_required(&v.name))
        ));
    }

    if !ng.merged_in_syn.is_empty() || nm.sim_code.contains("Isyn") {
        cs.line(&format!("{} Isyn = 0;", net.precision.scalar_type()));
    }
    for a in &nm.additional_input_vars {
        cs.line(&format!("{} {} = {};", a.ty, a.name, a.init));
    }

    for id in &ng.merged_in_syn {
        emit_apply_in_syn(net, ng, net.synapse_group(*id), cs);
    }

    if !nm.support_code.is_empty() {
        cs.line(&format!("using namespace {}_neuron;", ng.name));
    }

    // Threshold prepared before the sim fragment so auto-refractory can
    // snapshot the pre-update value.
    let th_code = if nm.threshold_condition_code.is_empty() {
        diags.warn(format!(
            "no threshold condition code for neuron group \"{}\"; no spikes will be detected in this population",
            ng.name
        ));
        String::new()
    } else {
        let code = substitute(&nm.threshold_condition_code, "$(id)", "n");
        let code = substitute(&code, "$(t)", "t");
        subs::neuron_code_subs(&code, net, ng, read_offset(true))
    };
    if !th_code.is_empty() && prefs.auto_refractory {
        cs.line("// test whether spike condition was fulfilled previously");
        cs.line(&format!("bool oldSpike = ({});", th_code));
    }

    cs.line("// calculate membrane potential");
    let s_code = substitute(&nm.sim_code, "$(id)", "n");
    let s_code = substitute(&s_code, "$(t)", "t");
    let mut s_code = subs::neuron_code_subs(&s_code, net, ng, read_offset(true));
    if ng.poisson {
        s_code = substitute(
            &s_code,
            "lrate",
            &format!("rates{0}[n + offset{0}]", ng.name),
        );
    }
    cs.fragment(&s_code);

    if ng.spike_event_required {
        emit_spike_event_test(net, ng, cs, write_offset(true));
    }

    if !th_code.is_empty() {
        emit_true_spike(net, prefs, ng, cs, &th_code, write_offset(true));
    }

    // write the locals back into the global state
    for v in &nm.vars {
        cs.line(&format!(
            "{0}{1}[{2}n] = l{0};",
            v.name,
            ng.name,
            write_offset(ng.is_var_queue_required(&v.name))
        ));
    }

    for id in &ng.merged_in_syn {
        emit_in_syn_decay(net, ng, net.synapse_group(*id), cs);
    }
}

/// Accumulate one merged incoming synapse group into `Isyn`.
fn emit_apply_in_syn(net: &Network, ng: &NeuronGroup, sg: &SynapseGroup, cs: &mut CodeStream) {
    let psm_target = &sg.ps_model_target_name;
    let psm = &sg.ps_model;

    if sg.dendritic_delay_required {
        // consume the current front slot, then zero it
        cs.line(&format!(
            "{0} &denDelayFront{1} = denDelay{1}[{2}n];",
            net.precision.scalar_type(),
            psm_target,
            delay::dendritic_delay_offset(net, sg, "")
        ));
        cs.line(&format!("inSyn{0}[n] += denDelayFront{0};", psm_target));
        cs.line(&format!(
            "denDelayFront{} = {};",
            psm_target,
            net.scalar_expr(0.0)
        ));
    }

    if sg.individual_psm_vars {
        for v in &psm.vars {
            cs.line(&format!(
                "{0} lps{1}{2} = {1}{2}[n];",
                v.ty, v.name, psm_target
            ));
        }
    }

    let code = substitute(&psm.apply_input_code, "$(id)", "n");
    let code = substitute(&code, "$(t)", "t");
    let code = substitute(&code, "$(inSyn)", &format!("inSyn{}[n]", psm_target));
    let code = subs::psm_code_subs(&code, net, ng, sg);

    if psm.support_code.is_empty() {
        cs.fragment(&code);
    } else {
        cs.open_tagged("", SUPPORT_CODE_BRACKET);
        cs.line(&format!("using namespace {}_postsyn;", sg.name));
        cs.fragment(&code);
        cs.close_tagged(SUPPORT_CODE_BRACKET);
    }
}

fn emit_spike_event_test(net: &Network, ng: &NeuronGroup, cs: &mut CodeStream, offset: &str) {
    cs.line("bool spikeLikeEvent = false;");
    for cond in &ng.spike_event_conditions {
        let e_code = subs::neuron_event_condition_subs(cond, net, ng);
        cs.scope(&format!("if ({})", e_code), |cs| {
            cs.line("spikeLikeEvent = true;");
        });
    }

    cs.line("// register a spike-like event");
    cs.scope("if (spikeLikeEvent)", |cs| {
        let slot = if ng.delay_required {
            format!("spkQuePtr{}", ng.name)
        } else {
            "0".to_string()
        };
        cs.line(&format!(
            "glbSpkEvnt{0}[{1}glbSpkCntEvnt{0}[{2}]++] = n;",
            ng.name, offset, slot
        ));
    });
}

fn emit_true_spike(
    net: &Network,
    prefs: &Preferences,
    ng: &NeuronGroup,
    cs: &mut CodeStream,
    th_code: &str,
    offset: &str,
) {
    cs.line("// test for and register a true spike");
    let header = if prefs.auto_refractory {
        format!("if (({}) && !(oldSpike))", th_code)
    } else {
        format!("if ({})", th_code)
    };
    cs.scope(&header, |cs| {
        let offset_true_spk = if ng.true_spike_required { offset } else { "" };
        let slot = if ng.delay_required && ng.true_spike_required {
            format!("spkQuePtr{}", ng.name)
        } else {
            "0".to_string()
        };
        cs.line(&format!(
            "glbSpk{0}[{1}glbSpkCnt{0}[{2}]++] = n;",
            ng.name, offset_true_spk, slot
        ));

        // spike-triggered weight-update variables on outgoing and
        // incoming connections
        for id in &ng.out_syn {
            let sg = net.synapse_group(*id);
            if !sg.wu_model.pre_spike_code.is_empty() {
                let code =
                    subs::wu_spike_update_subs(&sg.wu_model.pre_spike_code, net, sg, &sg.wu_model.pre_vars);
                cs.scope("", |cs| cs.fragment(&code));
            }
        }
        for id in &ng.in_syn {
            let sg = net.synapse_group(*id);
            if !sg.wu_model.post_spike_code.is_empty() {
                let code = subs::wu_spike_update_subs(
                    &sg.wu_model.post_spike_code,
                    net,
                    sg,
                    &sg.wu_model.post_vars,
                );
                cs.scope("", |cs| cs.fragment(&code));
            }
        }

        if ng.spike_time_required {
            cs.line(&format!("sT{}[{}n] = t;", ng.name, offset));
        }

        if !ng.model.reset_code.is_empty() {
            let code = substitute(&ng.model.reset_code, "$(id)", "n");
            let code = substitute(&code, "$(t)", "t");
            let code = subs::neuron_code_subs(&code, net, ng, offset);
            cs.line("// spike reset code");
            cs.fragment(&code);
        }
    });
}

/// Post-synaptic decay and write-back of individual PSM variables.
fn emit_in_syn_decay(net: &Network, ng: &NeuronGroup, sg: &SynapseGroup, cs: &mut CodeStream) {
    let psm_target = &sg.ps_model_target_name;
    let psm = &sg.ps_model;

    let code = substitute(&psm.decay_code, "$(id)", "n");
    let code = substitute(&code, "$(t)", "t");
    let code = substitute(&code, "$(inSyn)", &format!("inSyn{}[n]", psm_target));
    let code = subs::psm_code_subs(&code, net, ng, sg);

    cs.line("// the post-synaptic dynamics");
    if psm.support_code.is_empty() {
        cs.fragment(&code);
    } else {
        cs.open_tagged("", SUPPORT_CODE_BRACKET);
        cs.line(&format!("using namespace {}_postsyn;", sg.name));
        cs.fragment(&code);
        cs.close_tagged(SUPPORT_CODE_BRACKET);
    }

    if sg.individual_psm_vars {
        for v in &psm.vars {
            cs.line(&format!("{0}{1}[n] = lps{0}{1};", v.name, psm_target));
        }
    }
}
