//! Loss computation and the per-epoch update for PPO
//!
//! Policy and value function are optimized separately: first up to
//! `train_pi_iters` steps on the clipped surrogate objective, stopping as
//! soon as the approximate KL exceeds `1.5 * target_kl`, then
//! `train_v_iters` steps of value regression on the rewards-to-go.

use tch::{Kind, Tensor, nn};

use super::stats::UpdateMetrics;
use crate::{buffer::TensorBatch, policy::ActorCritic};

/// Diagnostics of one policy loss evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PiInfo {
    /// Approximate KL divergence, `mean(logp_old - logp)`
    pub approx_kl: f64,

    /// Mean entropy
    pub entropy: f64,

    /// Fraction of ratios outside `[1 - clip, 1 + clip]`
    pub clip_frac: f64,
}

/// Compute PPO policy loss with clipping
///
/// ```text
/// ratio = exp(logp - logp_old)
/// loss  = -mean(min(ratio * adv, clip(ratio, 1 - ε, 1 + ε) * adv))
/// ```
pub fn compute_loss_pi<A: ActorCritic + ?Sized>(
    ac: &A,
    batch: &TensorBatch,
    clip_ratio: f64,
) -> (Tensor, PiInfo) {
    let eval = ac.evaluate(&batch.obs, &batch.act);

    let ratio = (&eval.log_prob - &batch.logp).exp();
    let clip_adv = ratio.clamp(1.0 - clip_ratio, 1.0 + clip_ratio) * &batch.adv;
    let loss = -(&ratio * &batch.adv).minimum(&clip_adv).mean(Kind::Float);

    let approx_kl = (&batch.logp - &eval.log_prob).mean(Kind::Float);
    let entropy = eval.entropy.mean(Kind::Float);
    let clip_frac = (&ratio - 1.0).abs().gt(clip_ratio).to_kind(Kind::Float).mean(Kind::Float);

    let info = PiInfo {
        approx_kl: f64::try_from(&approx_kl).unwrap_or(0.0),
        entropy: f64::try_from(&entropy).unwrap_or(0.0),
        clip_frac: f64::try_from(&clip_frac).unwrap_or(0.0),
    };
    (loss, info)
}

/// Compute value function loss, `mean((V(obs) - ret)^2)`
pub fn compute_loss_v<A: ActorCritic + ?Sized>(ac: &A, batch: &TensorBatch) -> Tensor {
    (ac.value(&batch.obs) - &batch.ret).square().mean(Kind::Float)
}

/// Hyperparameters of one update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateParams {
    /// PPO clipping parameter (epsilon)
    pub clip_ratio: f64,

    /// Target KL divergence
    pub target_kl: f64,

    /// Maximum policy gradient steps
    pub train_pi_iters: usize,

    /// Value function gradient steps
    pub train_v_iters: usize,
}

/// How an update ended
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// Both loops ran
    Completed(UpdateMetrics),

    /// A stop was requested during the value loop
    Stopped,
}

/// Run one epoch's update on `batch`
///
/// `should_stop` is polled before every value function iteration.
pub fn update<A: ActorCritic + ?Sized>(
    ac: &A,
    pi_optimizer: &mut nn::Optimizer,
    vf_optimizer: &mut nn::Optimizer,
    batch: &TensorBatch,
    params: &UpdateParams,
    should_stop: impl Fn() -> bool,
) -> UpdateOutcome {
    let loss_pi_old = tch::no_grad(|| {
        let (loss, _) = compute_loss_pi(ac, batch, params.clip_ratio);
        f64::try_from(&loss).unwrap_or(0.0)
    });
    let loss_v_old =
        tch::no_grad(|| f64::try_from(&compute_loss_v(ac, batch)).unwrap_or(0.0));

    let mut pi_info = PiInfo::default();
    let mut trained_pi_iters = 0;
    for i in 0..params.train_pi_iters {
        let (loss, info) = compute_loss_pi(ac, batch, params.clip_ratio);
        pi_info = info;
        if info.approx_kl > 1.5 * params.target_kl {
            tracing::warn!(
                "Early stopping at policy step {}/{} due to reaching max kl ({:.4} > {:.4})",
                i + 1,
                params.train_pi_iters,
                info.approx_kl,
                1.5 * params.target_kl
            );
            break;
        }

        pi_optimizer.zero_grad();
        loss.backward();
        pi_optimizer.step();
        trained_pi_iters += 1;
    }

    for _ in 0..params.train_v_iters {
        if should_stop() {
            return UpdateOutcome::Stopped;
        }
        vf_optimizer.zero_grad();
        let loss = compute_loss_v(ac, batch);
        loss.backward();
        vf_optimizer.step();
    }

    let (loss_pi_new, loss_v_new) = tch::no_grad(|| {
        let (loss_pi, _) = compute_loss_pi(ac, batch, params.clip_ratio);
        let loss_v = compute_loss_v(ac, batch);
        (f64::try_from(&loss_pi).unwrap_or(0.0), f64::try_from(&loss_v).unwrap_or(0.0))
    });

    UpdateOutcome::Completed(UpdateMetrics {
        loss_pi: loss_pi_old,
        loss_v: loss_v_old,
        kl: pi_info.approx_kl,
        entropy: pi_info.entropy,
        clip_frac: pi_info.clip_frac,
        delta_pi_loss: loss_pi_new - loss_pi_old,
        delta_vf_loss: loss_v_new - loss_v_old,
        trained_pi_iters,
    })
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, io, sync::Arc};

    use parking_lot::Mutex;
    use tch::{Device, nn::OptimizerConfig};
    use tracing_subscriber::fmt::MakeWriter;

    use super::*;
    use crate::policy::{PolicyEvaluation, PolicyStep};

    /// Collects formatted log lines
    #[derive(Clone, Default)]
    struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl LogCapture {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogCapture {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// `logp = w * x` for a scalar observation `x`, `V = b`
    struct LinearMock {
        pi_vs: nn::VarStore,
        v_vs: nn::VarStore,
        w: Tensor,
        b: Tensor,
    }

    impl LinearMock {
        fn new() -> Self {
            let pi_vs = nn::VarStore::new(Device::Cpu);
            let v_vs = nn::VarStore::new(Device::Cpu);
            let w = pi_vs.root().zeros("w", &[1]);
            let b = v_vs.root().zeros("b", &[1]);
            Self { pi_vs, v_vs, w, b }
        }

        fn w(&self) -> f64 {
            f64::try_from(&self.w.get(0)).unwrap()
        }
    }

    impl ActorCritic for LinearMock {
        fn step(&self, obs: &Tensor) -> PolicyStep {
            tch::no_grad(|| {
                let n = obs.size()[0];
                PolicyStep {
                    action: Tensor::zeros([n, 1], (Kind::Float, Device::Cpu)),
                    value: self.value(obs),
                    log_prob: self.evaluate(obs, obs).log_prob,
                }
            })
        }

        fn evaluate(&self, obs: &Tensor, _act: &Tensor) -> PolicyEvaluation {
            let log_prob = (obs * &self.w).sum_dim_intlist(-1, false, Kind::Float);
            let entropy = log_prob.zeros_like();
            PolicyEvaluation { log_prob, entropy }
        }

        fn value(&self, obs: &Tensor) -> Tensor {
            obs.select(-1, 0).zeros_like() + &self.b
        }

        fn act(&self, obs: &Tensor) -> Tensor {
            Tensor::zeros([obs.size()[0], 1], (Kind::Float, Device::Cpu))
        }

        fn pi_var_store(&self) -> &nn::VarStore {
            &self.pi_vs
        }

        fn v_var_store(&self) -> &nn::VarStore {
            &self.v_vs
        }

        fn device(&self) -> Device {
            Device::Cpu
        }
    }

    fn batch() -> TensorBatch {
        TensorBatch {
            obs: Tensor::from_slice(&[1.0f32, -3.0]).view([2, 1]),
            act: Tensor::zeros([2, 1], (Kind::Float, Device::Cpu)),
            adv: Tensor::from_slice(&[1.0f32, -1.0]),
            ret: Tensor::from_slice(&[2.0f32, 2.0]),
            logp: Tensor::zeros([2], (Kind::Float, Device::Cpu)),
        }
    }

    fn optimizers(ac: &LinearMock, lr: f64) -> (nn::Optimizer, nn::Optimizer) {
        (
            nn::Adam::default().build(&ac.pi_vs, lr).unwrap(),
            nn::Adam::default().build(&ac.v_vs, lr).unwrap(),
        )
    }

    #[test]
    fn test_policy_loss_at_identity_ratio() {
        let ac = LinearMock::new();
        let (loss, info) = compute_loss_pi(&ac, &batch(), 0.2);

        // ratio = 1 everywhere: loss = -mean(adv) = 0
        assert!(f64::try_from(&loss).unwrap().abs() < 1e-7);
        assert_eq!(info.approx_kl, 0.0);
        assert_eq!(info.clip_frac, 0.0);
    }

    #[test]
    fn test_policy_loss_clipping() {
        let ac = LinearMock::new();
        tch::no_grad(|| {
            let _ = ac.w.shallow_clone().fill_(0.5);
        });

        // logp = [0.5, -1.5]: ratios e^0.5 and e^-1.5 are both clipped
        let (loss, info) = compute_loss_pi(&ac, &batch(), 0.2);
        assert_eq!(info.clip_frac, 1.0);
        assert!((info.approx_kl - 0.5).abs() < 1e-6);

        // min(1.6487 * 1, 1.2 * 1) = 1.2, min(0.2231 * -1, 0.8 * -1) = -0.8
        let expected = -(1.2 - 0.8) / 2.0;
        assert!((f64::try_from(&loss).unwrap() - expected).abs() < 1e-5);
    }

    #[test]
    fn test_value_loss() {
        let ac = LinearMock::new();
        let loss = compute_loss_v(&ac, &batch());
        assert!((f64::try_from(&loss).unwrap() - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_kl_early_stop_skips_gradients() {
        let ac = LinearMock::new();
        let (mut pi_opt, mut vf_opt) = optimizers(&ac, 0.1);
        let params =
            UpdateParams { clip_ratio: 0.2, target_kl: 0.01, train_pi_iters: 5, train_v_iters: 0 };

        let outcome = update(&ac, &mut pi_opt, &mut vf_opt, &batch(), &params, || false);
        let UpdateOutcome::Completed(metrics) = outcome else {
            panic!("update should complete");
        };

        // First step moves w to ~0.1; the second evaluation sees KL 0.1 and stops
        assert_eq!(metrics.trained_pi_iters, 1);
        assert!((ac.w() - 0.1).abs() < 1e-4, "w = {}", ac.w());
        assert!((metrics.kl - 0.1).abs() < 1e-4, "kl = {}", metrics.kl);
        assert!(metrics.stopped_early(params.train_pi_iters));
    }

    #[test]
    fn test_kl_early_stop_logs_one_based_step() {
        let ac = LinearMock::new();
        let (mut pi_opt, mut vf_opt) = optimizers(&ac, 0.1);
        let params =
            UpdateParams { clip_ratio: 0.2, target_kl: 0.01, train_pi_iters: 5, train_v_iters: 0 };

        let capture = LogCapture::default();
        let subscriber =
            tracing_subscriber::fmt().with_writer(capture.clone()).with_ansi(false).finish();
        tracing::subscriber::with_default(subscriber, || {
            update(&ac, &mut pi_opt, &mut vf_opt, &batch(), &params, || false)
        });

        // One step applied, the second evaluation stops the loop
        let logs = capture.contents();
        assert!(logs.contains("Early stopping at policy step 2/5"), "logs: {logs}");
    }

    #[test]
    fn test_policy_loop_runs_all_iterations_below_target() {
        let ac = LinearMock::new();
        let (mut pi_opt, mut vf_opt) = optimizers(&ac, 1e-4);
        let params =
            UpdateParams { clip_ratio: 0.2, target_kl: 0.01, train_pi_iters: 3, train_v_iters: 0 };

        let UpdateOutcome::Completed(metrics) =
            update(&ac, &mut pi_opt, &mut vf_opt, &batch(), &params, || false)
        else {
            panic!("update should complete");
        };
        assert_eq!(metrics.trained_pi_iters, 3);
        assert!(metrics.delta_pi_loss < 0.0);
    }

    #[test]
    fn test_value_loop_reduces_loss() {
        let ac = LinearMock::new();
        let (mut pi_opt, mut vf_opt) = optimizers(&ac, 0.1);
        let params =
            UpdateParams { clip_ratio: 0.2, target_kl: 0.01, train_pi_iters: 0, train_v_iters: 10 };

        let UpdateOutcome::Completed(metrics) =
            update(&ac, &mut pi_opt, &mut vf_opt, &batch(), &params, || false)
        else {
            panic!("update should complete");
        };
        assert_eq!(metrics.loss_v, 4.0);
        assert!(metrics.delta_vf_loss < 0.0);
        assert_eq!(metrics.trained_pi_iters, 0);

        // Delta is the loss with the updated parameters minus the loss before
        let after = f64::try_from(&compute_loss_v(&ac, &batch())).unwrap();
        assert!((metrics.delta_vf_loss - (after - metrics.loss_v)).abs() < 1e-6);
    }

    #[test]
    fn test_value_loop_observes_stop() {
        let ac = LinearMock::new();
        let (mut pi_opt, mut vf_opt) = optimizers(&ac, 0.1);
        let params =
            UpdateParams { clip_ratio: 0.2, target_kl: 0.01, train_pi_iters: 0, train_v_iters: 10 };

        let polls = Cell::new(0);
        let outcome = update(&ac, &mut pi_opt, &mut vf_opt, &batch(), &params, || {
            polls.set(polls.get() + 1);
            polls.get() > 3
        });

        assert_eq!(outcome, UpdateOutcome::Stopped);
        assert_eq!(polls.get(), 4);
        // Three value steps were applied before the stop
        let b = f64::try_from(&ac.b.get(0)).unwrap();
        assert!(b > 0.25 && b < 0.35, "b = {b}");
    }
}
