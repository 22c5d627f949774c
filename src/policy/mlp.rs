//! Multi-Layer Perceptron (MLP) actor-critic
//!
//! Separate networks for the policy and the value function:
//!
//! ```text
//!        Input (observations)
//!          /            \
//!   [Dense(24)]      [Dense(24)]
//!      Tanh             Tanh
//!   [Dense(48)]      [Dense(48)]
//!      Tanh             Tanh
//!   [Dense(n)]       [Dense(1)]
//!       |                |
//!  logits / mean       Value
//! ```
//!
//! Discrete action spaces get a categorical head over the logits, box action
//! spaces a diagonal Gaussian with a learned, state-independent log std.

use std::f64::consts::PI;

use anyhow::{Result, bail};
use tch::{
    Device, Kind, Tensor,
    nn::{self, Init, Module},
};

use super::{ActorCritic, PolicyEvaluation, PolicyStep};
use crate::spaces::{SpaceInfo, SpaceKind};

/// Configuration for the MLP architecture
#[derive(Debug, Clone)]
pub struct MlpConfig {
    /// Hidden layer widths, shared by policy and value networks
    pub hidden_sizes: Vec<i64>,
    /// Hidden layer activation
    pub activation: Activation,
    /// Orthogonal init (gain sqrt(2) hidden, small gain policy output)
    pub use_orthogonal_init: bool,
    /// Initial log std of the Gaussian head
    pub initial_log_std: f64,
    /// Device for both variable stores
    pub device: Device,
}

/// Hidden layer activation
#[derive(Debug, Clone, Copy)]
pub enum Activation {
    /// Rectified linear unit
    ReLU,
    /// Hyperbolic tangent
    Tanh,
}

impl Activation {
    fn apply(self, x: &Tensor) -> Tensor {
        match self {
            Activation::ReLU => x.relu(),
            Activation::Tanh => x.tanh(),
        }
    }
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_sizes: vec![24, 48],
            activation: Activation::Tanh,
            use_orthogonal_init: true,
            initial_log_std: -0.5,
            device: Device::cuda_if_available(),
        }
    }
}

enum Distribution {
    Categorical,
    Gaussian { log_std: Tensor },
}

/// MLP actor-critic for discrete or box action spaces
pub struct MlpActorCritic {
    pi_vs: nn::VarStore,
    v_vs: nn::VarStore,
    actor: nn::Sequential,
    critic: nn::Sequential,
    distribution: Distribution,
    obs_dim: i64,
    act_dim: i64,
    device: Device,
}

impl MlpActorCritic {
    /// Build a model sized from the environment's space descriptors
    ///
    /// # Errors
    ///
    /// Observations must be continuous and non-empty, actions non-empty.
    pub fn new(observation: &SpaceInfo, action: &SpaceInfo, config: MlpConfig) -> Result<Self> {
        if observation.kind != SpaceKind::Continuous {
            bail!("observations must come from a box space, got {:?}", observation.kind);
        }
        let obs_dim = observation.numel() as i64;
        if obs_dim == 0 {
            bail!("observation space is empty");
        }

        let (out_dim, act_dim) = match action.kind {
            SpaceKind::Discrete(n) => (n as i64, 1),
            SpaceKind::Continuous => (action.numel() as i64, action.numel() as i64),
        };
        if out_dim == 0 {
            bail!("action space is empty");
        }

        let device = config.device;
        tracing::info!("MlpActorCritic using device: {:?}", device);
        let pi_vs = nn::VarStore::new(device);
        let v_vs = nn::VarStore::new(device);

        let actor = mlp(&(pi_vs.root() / "pi"), obs_dim, out_dim, 0.01, &config);
        let critic = mlp(&(v_vs.root() / "v"), obs_dim, 1, 1.0, &config);

        let distribution = match action.kind {
            SpaceKind::Discrete(_) => Distribution::Categorical,
            SpaceKind::Continuous => Distribution::Gaussian {
                log_std: (pi_vs.root() / "pi").var(
                    "log_std",
                    &[act_dim],
                    Init::Const(config.initial_log_std),
                ),
            },
        };

        Ok(Self { pi_vs, v_vs, actor, critic, distribution, obs_dim, act_dim, device })
    }

    /// Model for a discrete action space with `n` actions
    pub fn discrete(obs_dim: usize, n: usize, config: MlpConfig) -> Result<Self> {
        Self::new(
            &SpaceInfo { shape: vec![obs_dim], kind: SpaceKind::Continuous },
            &SpaceInfo { shape: vec![], kind: SpaceKind::Discrete(n) },
            config,
        )
    }

    /// Model for a continuous action space of `act_dim` elements
    pub fn continuous(obs_dim: usize, act_dim: usize, config: MlpConfig) -> Result<Self> {
        Self::new(
            &SpaceInfo { shape: vec![obs_dim], kind: SpaceKind::Continuous },
            &SpaceInfo { shape: vec![act_dim], kind: SpaceKind::Continuous },
            config,
        )
    }

    /// Observation width
    pub fn obs_dim(&self) -> i64 {
        self.obs_dim
    }

    /// Action row width
    pub fn act_dim(&self) -> i64 {
        self.act_dim
    }

    fn log_prob_and_entropy(&self, out: &Tensor, act: &Tensor) -> (Tensor, Tensor) {
        match &self.distribution {
            Distribution::Categorical => {
                let log_probs = out.log_softmax(-1, Kind::Float);
                let index = act.to_kind(Kind::Int64);
                let log_prob = log_probs.gather(-1, &index, false).squeeze_dim(-1);
                let entropy =
                    -(log_probs.exp() * &log_probs).sum_dim_intlist(-1, false, Kind::Float);
                (log_prob, entropy)
            }
            Distribution::Gaussian { log_std } => {
                let var = (log_std * 2.0).exp();
                let log_prob = (-(act - out).square() / (var * 2.0)
                    - log_std
                    - 0.5 * (2.0 * PI).ln())
                .sum_dim_intlist(-1, false, Kind::Float);
                let entropy = (log_std + 0.5 + 0.5 * (2.0 * PI).ln())
                    .sum(Kind::Float)
                    .expand([out.size()[0]], false);
                (log_prob, entropy)
            }
        }
    }
}

fn mlp(
    path: &nn::Path,
    input: i64,
    output: i64,
    output_gain: f64,
    config: &MlpConfig,
) -> nn::Sequential {
    let (hidden_init, output_init) = if config.use_orthogonal_init {
        (Init::Orthogonal { gain: 2.0_f64.sqrt() }, Init::Orthogonal { gain: output_gain })
    } else {
        (Init::Randn { mean: 0.0, stdev: 0.01 }, Init::Randn { mean: 0.0, stdev: 0.01 })
    };

    let hidden_config = nn::LinearConfig { ws_init: hidden_init, ..Default::default() };
    let output_config = nn::LinearConfig { ws_init: output_init, ..Default::default() };

    let activation = config.activation;
    let mut seq = nn::seq();
    let mut width = input;
    for (i, &size) in config.hidden_sizes.iter().enumerate() {
        seq = seq
            .add(nn::linear(path / format!("fc{i}"), width, size, hidden_config))
            .add_fn(move |x| activation.apply(x));
        width = size;
    }
    seq.add(nn::linear(path / "out", width, output, output_config))
}

impl ActorCritic for MlpActorCritic {
    fn step(&self, obs: &Tensor) -> PolicyStep {
        tch::no_grad(|| {
            let out = self.actor.forward(obs);
            let action = match &self.distribution {
                Distribution::Categorical => {
                    let probs = out.softmax(-1, Kind::Float);
                    probs.multinomial(1, true).to_kind(Kind::Float)
                }
                Distribution::Gaussian { log_std } => {
                    &out + log_std.exp() * out.randn_like()
                }
            };
            let (log_prob, _) = self.log_prob_and_entropy(&out, &action);
            let value = self.critic.forward(obs).squeeze_dim(-1);
            PolicyStep { action, value, log_prob }
        })
    }

    fn evaluate(&self, obs: &Tensor, act: &Tensor) -> PolicyEvaluation {
        let out = self.actor.forward(obs);
        let (log_prob, entropy) = self.log_prob_and_entropy(&out, act);
        PolicyEvaluation { log_prob, entropy }
    }

    fn value(&self, obs: &Tensor) -> Tensor {
        self.critic.forward(obs).squeeze_dim(-1)
    }

    fn act(&self, obs: &Tensor) -> Tensor {
        tch::no_grad(|| {
            let out = self.actor.forward(obs);
            match self.distribution {
                Distribution::Categorical => out.argmax(-1, true).to_kind(Kind::Float),
                Distribution::Gaussian { .. } => out,
            }
        })
    }

    fn pi_var_store(&self) -> &nn::VarStore {
        &self.pi_vs
    }

    fn v_var_store(&self) -> &nn::VarStore {
        &self.v_vs
    }

    fn device(&self) -> Device {
        self.device
    }
}
