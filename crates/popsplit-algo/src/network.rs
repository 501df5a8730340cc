//! s-t flow network for the selection energy.
//!
//! For a selection mask `x` the network encodes
//!
//! ```text
//! E(x) = λ Σ_(i,j) (ℓ_ij / ρ) |x_i − x_j|  +  (1 − λ) Σ_i (a_i / ρ²) x_i  −  μ Σ_i p_i x_i
//! ```
//!
//! - source → unit `i`: `μ · p_i` (population reward, paid when `i` is left out)
//! - unit `i` → sink: `(1 − λ) · a_i / ρ²` (area cost, paid when `i` is selected)
//! - unit `i` ↔ unit `j`: `λ · ℓ_ij / ρ` (boundary cost, paid when the edge is cut)
//!
//! Both cost terms are divided by powers of `ρ` so they are unitless and `λ`
//! trades them off on equal footing. A cut therefore costs
//! `E(x) + μ · P_total`.

use popsplit_core::{FlowProblem, GraphAttributes, PopsplitError, PopsplitResult};

/// Reject λ outside `[0, 1)`.
///
/// `λ = 1` zeroes every sink capacity, so selecting everything is optimal for
/// any `μ > 0` and no multiplier can hit a fractional target.
pub fn validate_lambda(lambda: f64) -> PopsplitResult<()> {
    if lambda == 1.0 {
        return Err(PopsplitError::Configuration(
            "lambda = 1 removes the area cost and makes full selection optimal for every mu"
                .into(),
        ));
    }
    if !lambda.is_finite() || !(0.0..1.0).contains(&lambda) {
        return Err(PopsplitError::Configuration(format!(
            "lambda must be in [0, 1), got {lambda}"
        )));
    }
    Ok(())
}

pub fn validate_mu(mu: f64) -> PopsplitResult<()> {
    if !mu.is_finite() || mu < 0.0 {
        return Err(PopsplitError::Configuration(format!(
            "mu must be finite and non-negative, got {mu}"
        )));
    }
    Ok(())
}

/// Capacities of one `(λ, μ)` network. Rebuilt for every solve.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkCapacities {
    pub lambda: f64,
    pub mu: f64,
    pub source: Vec<f64>,
    pub sink: Vec<f64>,
    /// `(a, b, capacity)`; the capacity applies in both directions.
    pub edges: Vec<(usize, usize, f64)>,
}

impl NetworkCapacities {
    pub fn num_nodes(&self) -> usize {
        self.source.len()
    }

    pub fn to_flow_problem(&self) -> FlowProblem {
        let mut problem = FlowProblem::new(self.num_nodes());
        for (node, (&s, &t)) in self.source.iter().zip(&self.sink).enumerate() {
            problem.set_terminal(node, s, t);
        }
        for &(a, b, cap) in &self.edges {
            problem.add_edge(a, b, cap, cap);
        }
        problem
    }

    /// Capacity of the cut induced by `mask` (`true` = source side).
    pub fn cut_value(&self, mask: &[bool]) -> f64 {
        let terminals: f64 = mask
            .iter()
            .enumerate()
            .map(|(i, &selected)| if selected { self.sink[i] } else { self.source[i] })
            .sum();
        let boundary: f64 = self
            .edges
            .iter()
            .filter(|(a, b, _)| mask[*a] != mask[*b])
            .map(|(_, _, cap)| cap)
            .sum();
        terminals + boundary
    }
}

pub fn build_flow_network(
    attrs: &GraphAttributes,
    lambda: f64,
    mu: f64,
) -> PopsplitResult<NetworkCapacities> {
    validate_lambda(lambda)?;
    validate_mu(mu)?;

    let rho = attrs.characteristic_length();
    let rho_sq = rho * rho;
    let source = attrs.population().iter().map(|&p| mu * p as f64).collect();
    let sink = attrs
        .area()
        .iter()
        .map(|&a| (1.0 - lambda) * a / rho_sq)
        .collect();
    let edges = attrs
        .edges()
        .iter()
        .map(|edge| (edge.a, edge.b, lambda * edge.length / rho))
        .collect();

    Ok(NetworkCapacities {
        lambda,
        mu,
        source,
        sink,
        edges,
    })
}

/// The three energy terms evaluated directly against a mask.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyBreakdown {
    pub boundary: f64,
    pub area: f64,
    pub population_reward: f64,
    pub total: f64,
}

pub fn compute_energy(
    attrs: &GraphAttributes,
    mask: &[bool],
    lambda: f64,
    mu: f64,
) -> PopsplitResult<EnergyBreakdown> {
    attrs.check_mask(mask)?;
    let rho = attrs.characteristic_length();
    let boundary = lambda
        * attrs
            .edges()
            .iter()
            .filter(|edge| edge.is_cut(mask))
            .map(|edge| edge.length / rho)
            .sum::<f64>();
    let area = (1.0 - lambda) * attrs.selected_area(mask) / (rho * rho);
    let population_reward = mu * attrs.selected_population(mask) as f64;
    Ok(EnergyBreakdown {
        boundary,
        area,
        population_reward,
        total: boundary + area - population_reward,
    })
}
