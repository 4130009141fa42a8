#![forbid(unsafe_code)]

//! In-memory description of a spiking network, as consumed by the code
//! generators. The model builder constructs and finalizes this IR before
//! generation starts; generation itself only reads it.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NeuronGroupId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SynapseGroupId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    #[default]
    Float,
    Double,
}

impl Precision {
    pub fn scalar_type(self) -> &'static str {
        match self {
            Precision::Float => "float",
            Precision::Double => "double",
        }
    }

    /// A literal of this precision, e.g. `0.0f` / `0.0`.
    pub fn scalar_expr(self, value: f64) -> String {
        match self {
            Precision::Float => format!("{:?}f", value),
            Precision::Double => format!("{:?}", value),
        }
    }
}

/// Synapse matrix connectivity. Four closed variants; every dispatch in the
/// generators is a match over this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixConnectivity {
    Dense,
    Bitmask,
    SparseYale,
    SparseRagged,
}

impl MatrixConnectivity {
    pub fn is_sparse(self) -> bool {
        matches!(self, MatrixConnectivity::SparseYale | MatrixConnectivity::SparseRagged)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightKind {
    /// One shared value per variable; substituted as a literal constant.
    Global,
    /// One value per synapse, addressed through the matrix indexing.
    Individual,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Var {
    pub name: String,
    pub ty: String,
}

impl Var {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

/// A parameter with its resolved numeric value. Derived parameters arrive
/// here already evaluated; the generator only prints constants.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub value: f64,
}

impl Param {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdditionalInputVar {
    pub name: String,
    pub ty: String,
    pub init: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeuronModel {
    pub sim_code: String,
    pub threshold_condition_code: String,
    pub reset_code: String,
    pub support_code: String,
    pub vars: Vec<Var>,
    pub params: Vec<Param>,
    pub derived_params: Vec<Param>,
    pub extra_global_params: Vec<Var>,
    pub additional_input_vars: Vec<AdditionalInputVar>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostSynapticModel {
    pub apply_input_code: String,
    pub decay_code: String,
    pub support_code: String,
    pub vars: Vec<Var>,
    pub params: Vec<Param>,
    pub derived_params: Vec<Param>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightUpdateModel {
    pub sim_code: String,
    pub event_code: String,
    pub event_threshold_condition_code: String,
    pub synapse_dynamics_code: String,
    pub learn_post_code: String,
    pub pre_spike_code: String,
    pub post_spike_code: String,
    pub sim_support_code: String,
    pub event_support_code: String,
    pub synapse_dynamics_support_code: String,
    pub learn_post_support_code: String,
    pub vars: Vec<Var>,
    pub pre_vars: Vec<Var>,
    pub post_vars: Vec<Var>,
    pub params: Vec<Param>,
    pub derived_params: Vec<Param>,
    pub extra_global_params: Vec<Var>,
}

#[derive(Debug, Clone)]
pub struct NeuronGroup {
    pub name: String,
    pub num_neurons: u32,
    pub model: NeuronModel,
    /// Spike (and queued-variable) output is kept in a ring of
    /// `num_delay_slots` slots rather than a single slot.
    pub delay_required: bool,
    pub num_delay_slots: u32,
    pub spike_event_required: bool,
    pub true_spike_required: bool,
    pub spike_time_required: bool,
    pub poisson: bool,
    /// State variables that live in the delay ring. Others index `[n]`
    /// even when the group is delayed.
    pub queued_vars: Vec<String>,
    /// Distinct event-threshold conditions of outgoing synapse groups,
    /// already deduplicated by the model builder.
    pub spike_event_conditions: Vec<String>,
    /// Incoming synapse groups, merged by post-synaptic model target.
    pub merged_in_syn: Vec<SynapseGroupId>,
    pub in_syn: Vec<SynapseGroupId>,
    pub out_syn: Vec<SynapseGroupId>,
}

impl NeuronGroup {
    pub fn new(name: impl Into<String>, num_neurons: u32, model: NeuronModel) -> Self {
        Self {
            name: name.into(),
            num_neurons,
            model,
            delay_required: false,
            num_delay_slots: 1,
            spike_event_required: false,
            true_spike_required: true,
            spike_time_required: false,
            poisson: false,
            queued_vars: Vec::new(),
            spike_event_conditions: Vec::new(),
            merged_in_syn: Vec::new(),
            in_syn: Vec::new(),
            out_syn: Vec::new(),
        }
    }

    pub fn is_var_queue_required(&self, var: &str) -> bool {
        self.queued_vars.iter().any(|v| v == var)
    }
}

#[derive(Debug, Clone)]
pub struct SynapseGroup {
    pub name: String,
    pub src: NeuronGroupId,
    pub trg: NeuronGroupId,
    pub connectivity: MatrixConnectivity,
    pub weight_kind: WeightKind,
    /// Post-synaptic model variables are per-neuron arrays rather than
    /// shared constants.
    pub individual_psm_vars: bool,
    /// Name of the merged post-synaptic accumulator this group feeds
    /// (`inSyn<target>` / `denDelay<target>`).
    pub ps_model_target_name: String,
    pub dendritic_delay_required: bool,
    pub max_dendritic_delay_slots: u32,
    /// Maximum row length; also the row stride for RAGGED matrices.
    pub max_connections: u32,
    /// Maximum column length; the column stride for RAGGED post-learning.
    pub max_source_connections: u32,
    pub axonal_delay_steps: u32,
    pub back_prop_delay_steps: u32,
    pub wu_model: WeightUpdateModel,
    pub ps_model: PostSynapticModel,
    /// Per-variable constant values used when `weight_kind` is `Global`,
    /// parallel to `wu_model.vars`.
    pub wu_global_var_values: Vec<f64>,
    /// Shared constant values for post-synaptic model variables when
    /// `individual_psm_vars` is off, parallel to `ps_model.vars`.
    pub ps_global_var_values: Vec<f64>,
}

impl SynapseGroup {
    pub fn new(
        name: impl Into<String>,
        src: NeuronGroupId,
        trg: NeuronGroupId,
        connectivity: MatrixConnectivity,
        weight_kind: WeightKind,
        wu_model: WeightUpdateModel,
        ps_model: PostSynapticModel,
    ) -> Self {
        let name = name.into();
        Self {
            ps_model_target_name: name.clone(),
            name,
            src,
            trg,
            connectivity,
            weight_kind,
            individual_psm_vars: false,
            dendritic_delay_required: false,
            max_dendritic_delay_slots: 1,
            max_connections: 0,
            max_source_connections: 0,
            axonal_delay_steps: 0,
            back_prop_delay_steps: 0,
            wu_model,
            ps_model,
            wu_global_var_values: Vec::new(),
            ps_global_var_values: Vec::new(),
        }
    }

    pub fn is_spike_event_required(&self) -> bool {
        !self.wu_model.event_code.is_empty()
            && !self.wu_model.event_threshold_condition_code.is_empty()
    }

    pub fn is_true_spike_required(&self) -> bool {
        !self.wu_model.sim_code.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Network {
    pub name: String,
    pub precision: Precision,
    pub time_precision: Precision,
    pub dt: f64,
    pub neuron_groups: Vec<NeuronGroup>,
    pub synapse_groups: Vec<SynapseGroup>,
    /// Groups with a synapse-dynamics pass, in emission order.
    pub synapse_dynamics_groups: Vec<SynapseGroupId>,
    /// Groups with a post-learning pass, in emission order.
    pub post_learn_groups: Vec<SynapseGroupId>,
}

impl Network {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            precision: Precision::Float,
            time_precision: Precision::Float,
            dt: 1.0,
            neuron_groups: Vec::new(),
            synapse_groups: Vec::new(),
            synapse_dynamics_groups: Vec::new(),
            post_learn_groups: Vec::new(),
        }
    }

    pub fn neuron_group(&self, id: NeuronGroupId) -> &NeuronGroup {
        &self.neuron_groups[id.0 as usize]
    }

    pub fn synapse_group(&self, id: SynapseGroupId) -> &SynapseGroup {
        &self.synapse_groups[id.0 as usize]
    }

    pub fn scalar_expr(&self, value: f64) -> String {
        self.precision.scalar_expr(value)
    }

    /// Structural validation. Runs before any output file is created;
    /// every error here is fatal for the whole generation run.
    pub fn validate(&self) -> Result<(), ModelError> {
        for group in &self.neuron_groups {
            if group.num_neurons == 0 {
                return Err(ModelError::EmptyPopulation {
                    group: group.name.clone(),
                });
            }
            if group.model.sim_code.is_empty() {
                return Err(ModelError::MissingSimCode {
                    group: group.name.clone(),
                });
            }
            if group.delay_required && group.num_delay_slots < 2 {
                return Err(ModelError::BadDelaySlots {
                    group: group.name.clone(),
                    slots: group.num_delay_slots,
                });
            }
            if group.spike_event_required && group.spike_event_conditions.is_empty() {
                return Err(ModelError::MissingEventThreshold {
                    group: group.name.clone(),
                });
            }
            for id in group
                .merged_in_syn
                .iter()
                .chain(&group.in_syn)
                .chain(&group.out_syn)
            {
                if id.0 as usize >= self.synapse_groups.len() {
                    return Err(ModelError::DanglingSynapseRef {
                        group: group.name.clone(),
                        id: id.0,
                    });
                }
            }
        }

        for sg in &self.synapse_groups {
            for (which, id) in [("source", sg.src), ("target", sg.trg)] {
                if id.0 as usize >= self.neuron_groups.len() {
                    return Err(ModelError::DanglingNeuronRef {
                        group: sg.name.clone(),
                        which,
                        id: id.0,
                    });
                }
            }
            if sg.connectivity == MatrixConnectivity::SparseRagged && sg.max_connections == 0 {
                return Err(ModelError::RaggedWithoutMaxConnections {
                    group: sg.name.clone(),
                });
            }
            if sg.dendritic_delay_required && sg.max_dendritic_delay_slots < 1 {
                return Err(ModelError::BadDendriticDelaySlots {
                    group: sg.name.clone(),
                });
            }
            if matches!(sg.weight_kind, WeightKind::Global)
                && sg.wu_global_var_values.len() != sg.wu_model.vars.len()
            {
                return Err(ModelError::GlobalWeightValueCount {
                    group: sg.name.clone(),
                    values: sg.wu_global_var_values.len(),
                    vars: sg.wu_model.vars.len(),
                });
            }
            if !sg.individual_psm_vars && sg.ps_global_var_values.len() != sg.ps_model.vars.len() {
                return Err(ModelError::PsmValueCount {
                    group: sg.name.clone(),
                    values: sg.ps_global_var_values.len(),
                    vars: sg.ps_model.vars.len(),
                });
            }
            let src = self.neuron_group(sg.src);
            if sg.axonal_delay_steps > 0 && sg.axonal_delay_steps >= src.num_delay_slots {
                return Err(ModelError::DelayOutOfRange {
                    group: sg.name.clone(),
                    which: "axonal",
                    steps: sg.axonal_delay_steps,
                    slots: src.num_delay_slots,
                });
            }
            let trg = self.neuron_group(sg.trg);
            if sg.back_prop_delay_steps > 0 && sg.back_prop_delay_steps >= trg.num_delay_slots {
                return Err(ModelError::DelayOutOfRange {
                    group: sg.name.clone(),
                    which: "back-prop",
                    steps: sg.back_prop_delay_steps,
                    slots: trg.num_delay_slots,
                });
            }
        }

        for id in &self.synapse_dynamics_groups {
            if id.0 as usize >= self.synapse_groups.len() {
                return Err(ModelError::DanglingPassRef {
                    pass: "synapse-dynamics",
                    id: id.0,
                });
            }
            if self.synapse_group(*id).wu_model.synapse_dynamics_code.is_empty() {
                return Err(ModelError::EmptyPassCode {
                    pass: "synapse-dynamics",
                    group: self.synapse_group(*id).name.clone(),
                });
            }
        }
        for id in &self.post_learn_groups {
            if id.0 as usize >= self.synapse_groups.len() {
                return Err(ModelError::DanglingPassRef {
                    pass: "post-learning",
                    id: id.0,
                });
            }
            if self.synapse_group(*id).wu_model.learn_post_code.is_empty() {
                return Err(ModelError::EmptyPassCode {
                    pass: "post-learning",
                    group: self.synapse_group(*id).name.clone(),
                });
            }
        }

        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("neuron group {group} has no neurons")]
    EmptyPopulation { group: String },
    #[error("neuron group {group} has no simulation code")]
    MissingSimCode { group: String },
    #[error("neuron group {group} requires delay but has {slots} queue slot(s)")]
    BadDelaySlots { group: String, slots: u32 },
    #[error("neuron group {group} emits spike-like events but no outgoing weight-update model provides an event threshold")]
    MissingEventThreshold { group: String },
    #[error("neuron group {group} references missing synapse group {id}")]
    DanglingSynapseRef { group: String, id: u32 },
    #[error("synapse group {group} references missing {which} neuron group {id}")]
    DanglingNeuronRef {
        group: String,
        which: &'static str,
        id: u32,
    },
    #[error("ragged synapse group {group} must declare max row connections")]
    RaggedWithoutMaxConnections { group: String },
    #[error("synapse group {group} requires dendritic delay but declares no buffer slots")]
    BadDendriticDelaySlots { group: String },
    #[error("synapse group {group} has {values} global weight value(s) for {vars} variable(s)")]
    GlobalWeightValueCount {
        group: String,
        values: usize,
        vars: usize,
    },
    #[error("synapse group {group} has {values} shared post-synaptic value(s) for {vars} variable(s)")]
    PsmValueCount {
        group: String,
        values: usize,
        vars: usize,
    },
    #[error("synapse group {group} {which} delay of {steps} step(s) exceeds the {slots}-slot queue")]
    DelayOutOfRange {
        group: String,
        which: &'static str,
        steps: u32,
        slots: u32,
    },
    #[error("{pass} pass references missing synapse group {id}")]
    DanglingPassRef { pass: &'static str, id: u32 },
    #[error("{pass} pass lists synapse group {group} which has no such code")]
    EmptyPassCode { pass: &'static str, group: String },
}
