//! Generalized Advantage Estimation (GAE) over a single path
//!
//! A path is a contiguous run of transitions closed by a bootstrap value:
//! zero when the episode terminated, the critic's estimate of the next
//! state when it was cut off.
//!
//! # Mathematical Formula
//! ```text
//! δ_t = r_t + γ * V_{t+1} - V_t          (V_T = bootstrap)
//! A_t = Σ_k (γλ)^k δ_{t+k}
//! R_t = Σ_k γ^k r_{t+k} + γ^{T-t} * bootstrap
//! ```

/// Discounted cumulative sum
///
/// `y[t] = x[t] + discount * y[t + 1]`, computed backwards.
///
/// ```rust
/// use drive_rl::buffer::discount_cumsum;
///
/// let y = discount_cumsum(&[1.0, 1.0, 1.0], 0.5);
/// assert_eq!(y, vec![1.75, 1.5, 1.0]);
/// ```
pub fn discount_cumsum(x: &[f32], discount: f32) -> Vec<f32> {
    let mut out = vec![0.0; x.len()];
    let mut running = 0.0;
    for t in (0..x.len()).rev() {
        running = x[t] + discount * running;
        out[t] = running;
    }
    out
}

/// Advantages and rewards-to-go for one path
///
/// `rewards` and `values` cover the path's transitions; `bootstrap` stands in
/// for both the reward and the value after the last one.
pub(super) fn compute_path(
    rewards: &[f32],
    values: &[f32],
    bootstrap: f32,
    gamma: f32,
    lam: f32,
    advantages: &mut [f32],
    returns: &mut [f32],
) {
    let n = rewards.len();
    debug_assert_eq!(values.len(), n);
    debug_assert_eq!(advantages.len(), n);
    debug_assert_eq!(returns.len(), n);

    let deltas: Vec<f32> = (0..n)
        .map(|t| {
            let next_value = if t + 1 < n { values[t + 1] } else { bootstrap };
            rewards[t] + gamma * next_value - values[t]
        })
        .collect();
    advantages.copy_from_slice(&discount_cumsum(&deltas, gamma * lam));

    let mut rews = Vec::with_capacity(n + 1);
    rews.extend_from_slice(rewards);
    rews.push(bootstrap);
    returns.copy_from_slice(&discount_cumsum(&rews, gamma)[..n]);
}
