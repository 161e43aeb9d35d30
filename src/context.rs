use num_traits::Float;
use totsu_core::LinAlgEx;
use totsu::MatBuild;
use crate::solver::ConicSolve;
use crate::{Rebalance, RebalanceError, RebalanceInput, RebalanceOptimizer};

//

/// Rolling state of a multi-period rebalance.
///
/// Holds the current allocation \\(z_c\\) and growth proxy \\(R\\) on behalf of the caller,
/// since [`RebalanceOptimizer`] keeps nothing between calls.
/// Periods must be stepped strictly in sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceContext<F>
{
    allocation: Vec<F>,
    growth: Vec<F>,
    period: usize,
}

impl<F: Float> RebalanceContext<F>
{
    /// Creates a context at period zero.
    ///
    /// Returns [`RebalanceContext`] instance.
    /// * `allocation` is the initial \\(z_c\\).
    /// * `growth` is the initial \\(R\\).
    pub fn new(allocation: Vec<F>, growth: Vec<F>) -> Self
    {
        RebalanceContext {
            allocation,
            growth,
            period: 0,
        }
    }

    /// Current allocation \\(z_c\\).
    pub fn allocation(&self) -> &[F]
    {
        &self.allocation
    }

    /// Current growth proxy \\(R\\).
    pub fn growth(&self) -> &[F]
    {
        &self.growth
    }

    /// Number of periods advanced so far.
    pub fn period(&self) -> usize
    {
        self.period
    }

    /// Inputs of the next period, borrowing the current state.
    pub fn input<'a, L>(&'a self, mu: &'a [F], sigma: &'a MatBuild<L>, kappa: F, gamma: F) -> RebalanceInput<'a, L>
    where L: LinAlgEx<F=F>
    {
        RebalanceInput {
            mu,
            sigma,
            kappa,
            gamma,
            z_curr: &self.allocation,
            growth: &self.growth,
        }
    }

    /// Rolls the state forward by a decision: \\(z \rightarrow z_c,\ R' \rightarrow R\\).
    ///
    /// * `rslt` is the decision solved from the current state.
    /// * `gamma` is \\(\gamma\\) used for that decision.
    pub fn advance(&mut self, rslt: &Rebalance<F>, gamma: F)
    {
        self.allocation = rslt.new_allocation(&self.allocation);
        self.growth = rslt.new_growth(&self.growth, gamma);
        self.period += 1;
    }

    /// Solves the next period and advances on success.
    ///
    /// Returns `Ok` with the decision, or `Err` leaving the state untouched.
    pub fn step<L, S>(&mut self, opt: &RebalanceOptimizer<L, S>,
        mu: &[F], sigma: &MatBuild<L>, kappa: F, gamma: F) -> Result<Rebalance<F>, RebalanceError>
    where L: LinAlgEx<F=F>, S: ConicSolve<L>, F: core::fmt::LowerExp
    {
        let rslt = opt.solve(&self.input(mu, sigma, kappa, gamma))?;

        self.advance(&rslt, gamma);
        log::debug!("period {} advanced", self.period);

        Ok(rslt)
    }
}

//

#[test]
fn test_context_advance()
{
    use float_eq::assert_float_eq;
    use crate::Status;

    let mut ctx = RebalanceContext::new(vec![1., 1.], vec![1., 1.]);
    let rslt = Rebalance {
        delta: vec![0.5, 0.],
        lam: vec![0., 0.5],
        objective: 0.,
        status: Status::Optimal,
    };

    ctx.advance(&rslt, 2.);

    assert_eq!(ctx.period(), 1);
    assert_float_eq!(ctx.allocation(), [0.5, 1.5].as_ref(), abs_all <= 1e-12);
    assert_float_eq!(ctx.growth(), [2., 0.5].as_ref(), abs_all <= 1e-12);
}
