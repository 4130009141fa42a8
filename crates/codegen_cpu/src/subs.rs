//! The fixed substitution compositions shared by all fragment kinds:
//! parameters and derived parameters become literal constants, variables
//! become addressed array references, extra global parameters become
//! top-level array names, and the RNG pseudo-calls become host
//! distribution calls.

use code_subst::{function_substitute, name_substitutions, substitute, value_substitutions};
use net_model::{NeuronGroup, Network, Param, Precision, SynapseGroup, Var, WeightKind};

pub(crate) fn var_names(vars: &[Var]) -> impl Iterator<Item = &str> {
    vars.iter().map(|v| v.name.as_str())
}

fn param_pairs(params: &[Param], precision: Precision) -> impl Iterator<Item = (&str, String)> {
    params
        .iter()
        .map(move |p| (p.name.as_str(), precision.scalar_expr(p.value)))
}

fn const_var_pairs<'a>(
    vars: &'a [Var],
    values: &'a [f64],
    precision: Precision,
) -> impl Iterator<Item = (&'a str, String)> {
    vars.iter()
        .zip(values)
        .map(move |(v, value)| (v.name.as_str(), precision.scalar_expr(*value)))
}

/// Expand the RNG pseudo-calls into host `<random>` draws on the `rng`
/// handle the runtime provides.
pub fn host_function_substitutions(code: &str, precision: Precision) -> String {
    let code = function_substitute(code, "rng_uniform", 0, "standardUniformDistribution(rng)");
    let code = function_substitute(&code, "rng_normal", 0, "standardNormalDistribution(rng)");
    let code = function_substitute(
        &code,
        "rng_exponential",
        0,
        "standardExponentialDistribution(rng)",
    );
    let log_normal = format!(
        "std::lognormal_distribution<{}>($(0), $(1))(rng)",
        precision.scalar_type()
    );
    function_substitute(&code, "rng_log_normal", 2, &log_normal)
}

/// Substitutions for neuron sim, threshold, and reset fragments. State
/// variables resolve to the `l`-prefixed locals; `st_offset` is the queue
/// offset prefix for the group's own spike-time array.
pub fn neuron_code_subs(code: &str, net: &Network, ng: &NeuronGroup, st_offset: &str) -> String {
    let m = &ng.model;
    let code = name_substitutions(code, "l", var_names(&m.vars), "", "");
    let code = value_substitutions(&code, param_pairs(&m.params, net.precision), "");
    let code = value_substitutions(&code, param_pairs(&m.derived_params, net.precision), "");
    let code = name_substitutions(&code, "", var_names(&m.extra_global_params), &ng.name, "");
    let code = substitute(&code, "$(Isyn)", "Isyn");
    let code = substitute(&code, "$(sT)", &format!("sT{}[{}n]", ng.name, st_offset));
    host_function_substitutions(&code, net.precision)
}

/// Substitutions for post-synaptic apply-input and decay fragments, which
/// see both the post-synaptic model's variables and the neuron's locals.
pub fn psm_code_subs(code: &str, net: &Network, ng: &NeuronGroup, sg: &SynapseGroup) -> String {
    let psm = &sg.ps_model;
    let code = if sg.individual_psm_vars {
        name_substitutions(code, "lps", var_names(&psm.vars), &sg.ps_model_target_name, "")
    } else {
        value_substitutions(
            code,
            const_var_pairs(&psm.vars, &sg.ps_global_var_values, net.precision),
            "",
        )
    };
    let code = value_substitutions(&code, param_pairs(&psm.params, net.precision), "");
    let code = value_substitutions(&code, param_pairs(&psm.derived_params, net.precision), "");
    let nm = &ng.model;
    let code = name_substitutions(&code, "l", var_names(&nm.vars), "", "");
    let code = value_substitutions(&code, param_pairs(&nm.params, net.precision), "");
    let code = value_substitutions(&code, param_pairs(&nm.derived_params, net.precision), "");
    let code = name_substitutions(&code, "", var_names(&nm.extra_global_params), &ng.name, "");
    let code = substitute(&code, "$(Isyn)", "Isyn");
    host_function_substitutions(&code, net.precision)
}

/// Substitutions for the spike-like-event conditions re-emitted inside the
/// neuron pass. The conditions are written against the presynaptic side
/// (`$(V_pre)`), which in this context is the group's own local state; the
/// model builder has already resolved weight-update parameters into them.
pub fn neuron_event_condition_subs(code: &str, net: &Network, ng: &NeuronGroup) -> String {
    let code = substitute(code, "$(id)", "n");
    let code = substitute(&code, "$(t)", "t");
    let code = name_substitutions(&code, "l", var_names(&ng.model.vars), "", "_pre");
    let code = name_substitutions(
        &code,
        "",
        var_names(&ng.model.extra_global_params),
        &ng.name,
        "",
    );
    host_function_substitutions(&code, net.precision)
}

/// References to the source and target neuron state from synaptic code:
/// `$(x_pre)` / `$(sT_pre)` / parameter names with `_pre`, and the `_post`
/// mirror. Queued variables and spike times read through the declared
/// `preReadDelayOffset` / `postReadDelayOffset` when the group is delayed.
pub fn synaptic_neuron_subs(
    code: &str,
    net: &Network,
    sg: &SynapseGroup,
    pre_idx: &str,
    post_idx: &str,
) -> String {
    let code = substitute(code, "$(id_pre)", pre_idx);
    let code = substitute(&code, "$(id_post)", post_idx);
    let src = net.neuron_group(sg.src);
    let code = neuron_side_subs(&code, net, src, "preReadDelayOffset + ", pre_idx, "_pre");
    let trg = net.neuron_group(sg.trg);
    neuron_side_subs(&code, net, trg, "postReadDelayOffset + ", post_idx, "_post")
}

fn neuron_side_subs(
    code: &str,
    net: &Network,
    ng: &NeuronGroup,
    offset: &str,
    idx: &str,
    ext: &str,
) -> String {
    let queue_offset = if ng.delay_required { offset } else { "" };
    let mut code = substitute(
        code,
        &format!("$(sT{})", ext),
        &format!("sT{}[{}{}]", ng.name, queue_offset, idx),
    );
    for v in &ng.model.vars {
        let var_offset = if ng.delay_required && ng.is_var_queue_required(&v.name) {
            offset
        } else {
            ""
        };
        code = substitute(
            &code,
            &format!("$({}{})", v.name, ext),
            &format!("{}{}[{}{}]", v.name, ng.name, var_offset, idx),
        );
    }
    let code = value_substitutions(&code, param_pairs(&ng.model.params, net.precision), ext);
    value_substitutions(&code, param_pairs(&ng.model.derived_params, net.precision), ext)
}

/// The tail of every weight-update fragment rewrite: global weight
/// constants, pre/post weight-update variables, parameters, extra globals,
/// neuron-state references, host functions. Per-synapse variable
/// addressing happens at the call site (it depends on the loop shape), so
/// `sub_global_vars` is off for the post-learning pass, which addresses
/// variables unconditionally.
pub fn wu_code_subs(
    code: &str,
    net: &Network,
    sg: &SynapseGroup,
    pre_idx: &str,
    post_idx: &str,
    sub_global_vars: bool,
) -> String {
    let wu = &sg.wu_model;
    let mut code = code.to_string();
    if sub_global_vars && sg.weight_kind == WeightKind::Global {
        code = value_substitutions(
            &code,
            const_var_pairs(&wu.vars, &sg.wu_global_var_values, net.precision),
            "",
        );
    }
    let src = net.neuron_group(sg.src);
    let pre_offset = if src.delay_required {
        "preReadDelayOffset + "
    } else {
        ""
    };
    code = name_substitutions(
        &code,
        "",
        var_names(&wu.pre_vars),
        &format!("{}[{}{}]", sg.name, pre_offset, pre_idx),
        "",
    );
    let trg = net.neuron_group(sg.trg);
    let post_offset = if trg.delay_required {
        "postReadDelayOffset + "
    } else {
        ""
    };
    code = name_substitutions(
        &code,
        "",
        var_names(&wu.post_vars),
        &format!("{}[{}{}]", sg.name, post_offset, post_idx),
        "",
    );
    let code = value_substitutions(&code, param_pairs(&wu.params, net.precision), "");
    let code = value_substitutions(&code, param_pairs(&wu.derived_params, net.precision), "");
    let code = name_substitutions(&code, "", var_names(&wu.extra_global_params), &sg.name, "");
    let code = synaptic_neuron_subs(&code, net, sg, pre_idx, post_idx);
    host_function_substitutions(&code, net.precision)
}

/// Substitutions for the event-threshold condition in the synapse pass.
pub fn wu_threshold_subs(code: &str, net: &Network, sg: &SynapseGroup) -> String {
    let wu = &sg.wu_model;
    let code = value_substitutions(code, param_pairs(&wu.params, net.precision), "");
    let code = value_substitutions(&code, param_pairs(&wu.derived_params, net.precision), "");
    let code = name_substitutions(&code, "", var_names(&wu.extra_global_params), &sg.name, "");
    let code = synaptic_neuron_subs(&code, net, sg, "ipre", "ipost");
    host_function_substitutions(&code, net.precision)
}

/// Substitutions for the pre/post spike-triggered variable updates run in
/// the neuron pass; `vars` selects the pre or post variable set, both of
/// which address `<var><group>[n]` there.
pub fn wu_spike_update_subs(code: &str, net: &Network, sg: &SynapseGroup, vars: &[Var]) -> String {
    let wu = &sg.wu_model;
    let code = substitute(code, "$(id)", "n");
    let code = substitute(&code, "$(t)", "t");
    let code = name_substitutions(&code, "", var_names(vars), &format!("{}[n]", sg.name), "");
    let code = value_substitutions(&code, param_pairs(&wu.params, net.precision), "");
    let code = value_substitutions(&code, param_pairs(&wu.derived_params, net.precision), "");
    let code = name_substitutions(&code, "", var_names(&wu.extra_global_params), &sg.name, "");
    host_function_substitutions(&code, net.precision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use net_model::{
        MatrixConnectivity, NeuronGroup, NeuronGroupId, NeuronModel, PostSynapticModel,
        SynapseGroup, WeightUpdateModel,
    };

    fn test_net() -> Network {
        let mut net = Network::new("m");
        let mut pre = NeuronGroup::new(
            "pre",
            4,
            NeuronModel {
                vars: vec![Var::new("V", "scalar")],
                params: vec![Param::new("tau", 20.0)],
                ..Default::default()
            },
        );
        pre.delay_required = true;
        pre.num_delay_slots = 3;
        pre.queued_vars = vec!["V".to_string()];
        net.neuron_groups.push(pre);
        net.neuron_groups
            .push(NeuronGroup::new("post", 5, NeuronModel::default()));
        let sg = SynapseGroup::new(
            "syn",
            NeuronGroupId(0),
            NeuronGroupId(1),
            MatrixConnectivity::Dense,
            WeightKind::Individual,
            WeightUpdateModel {
                params: vec![Param::new("gmax", 0.5)],
                ..Default::default()
            },
            PostSynapticModel::default(),
        );
        net.synapse_groups.push(sg);
        net
    }

    #[test]
    fn neuron_subs_map_vars_to_locals_and_params_to_constants() {
        let net = test_net();
        let ng = &net.neuron_groups[0];
        let out = neuron_code_subs("$(V) += $(tau) * $(Isyn);", &net, ng, "");
        assert_eq!(out, "lV += (20.0f) * Isyn;");
    }

    #[test]
    fn pre_side_reads_through_delay_offset() {
        let net = test_net();
        let sg = &net.synapse_groups[0];
        let out = synaptic_neuron_subs("$(V_pre) + $(sT_pre)", &net, sg, "ipre", "ipost");
        assert_eq!(
            out,
            "Vpre[preReadDelayOffset + ipre] + sTpre[preReadDelayOffset + ipre]"
        );
    }

    #[test]
    fn post_side_without_delay_indexes_directly() {
        let net = test_net();
        let sg = &net.synapse_groups[0];
        let out = synaptic_neuron_subs("$(sT_post)", &net, sg, "ipre", "ipost");
        assert_eq!(out, "sTpost[ipost]");
    }

    #[test]
    fn wu_params_become_constants() {
        let net = test_net();
        let sg = &net.synapse_groups[0];
        let out = wu_code_subs("$(w) *= $(gmax);", &net, sg, "ipre", "ipost", true);
        assert_eq!(out, "$(w) *= (0.5f);");
    }

    #[test]
    fn global_weights_substitute_as_constants() {
        let mut net = test_net();
        net.synapse_groups[0].weight_kind = WeightKind::Global;
        net.synapse_groups[0].wu_model.vars = vec![Var::new("g", "scalar")];
        net.synapse_groups[0].wu_global_var_values = vec![0.25];
        let sg = &net.synapse_groups[0];
        let out = wu_code_subs("x += $(g);", &net, sg, "ipre", "ipost", true);
        assert_eq!(out, "x += (0.25f);");
    }

    #[test]
    fn rng_calls_expand_to_host_distributions() {
        let out = host_function_substitutions("$(x) = $(rng_uniform);", Precision::Float);
        assert_eq!(out, "$(x) = standardUniformDistribution(rng);");
        let out = host_function_substitutions(
            "v = $(rng_log_normal, 0.0, 1.0);",
            Precision::Double,
        );
        assert_eq!(out, "v = std::lognormal_distribution<double>(0.0, 1.0)(rng);");
    }
}
