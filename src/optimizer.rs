use num_traits::{Float, Zero, One};
use totsu_core::LinAlgEx;
use totsu::MatBuild;
use crate::problem::{ProbRebalance, geo_mean};
use crate::solver::{ConicSolve, TotsuSolve};
use crate::validate::{validate, sym_pack};
use crate::{RebalanceInput, RebalanceParam, RebalanceError, Status};

//

/// Quadratic form \\(z^T \Sigma z\\).
pub fn quad_form<L: LinAlgEx>(sigma: &MatBuild<L>, z: &[L::F]) -> L::F
{
    let n = z.len();
    assert_eq!(sigma.size(), (n, n));

    let mut sum = L::F::zero();
    for c in 0.. n {
        for r in 0.. n {
            sum = sum + z[r] * sigma[(r, c)] * z[c];
        }
    }
    sum
}

/// Mean-variance objective \\(z^T \mu - \kappa z^T \Sigma z\\).
pub fn objective_value<L: LinAlgEx>(mu: &[L::F], sigma: &MatBuild<L>, kappa: L::F, z: &[L::F]) -> L::F
{
    assert_eq!(mu.len(), z.len());

    let mut ret = L::F::zero();
    for (m, e) in mu.iter().zip(z) {
        ret = ret + *m * *e;
    }
    ret - kappa * quad_form(sigma, z)
}

/// Objective at \\(\delta = \lambda = 0\\), which is always feasible.
pub fn zero_trade_objective<L: LinAlgEx>(input: &RebalanceInput<L>) -> L::F
{
    objective_value(input.mu, input.sigma, input.kappa, input.z_curr)
}

//

/// Optimal rebalance decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Rebalance<F>
{
    /// \\(\delta\\), subtracted from the allocation and coupled into the growth proxy.
    pub delta: Vec<F>,
    /// \\(\lambda\\), added to the allocation and subtracted from the growth proxy.
    pub lam: Vec<F>,
    /// \\(z^T \mu - \kappa z^T \Sigma z\\) at the decision.
    pub objective: F,
    /// Always [`Status::Optimal`] for a returned decision.
    pub status: Status,
}

impl<F: Float> Rebalance<F>
{
    /// New allocation \\(z = z_c - \delta + \lambda\\).
    pub fn new_allocation(&self, z_curr: &[F]) -> Vec<F>
    {
        assert_eq!(z_curr.len(), self.delta.len());

        z_curr.iter().zip(&self.delta).zip(&self.lam)
        .map(|((&z, &d), &l)| z - d + l)
        .collect()
    }

    /// New growth proxy \\(R' = R + \gamma \delta - \lambda\\).
    pub fn new_growth(&self, growth: &[F], gamma: F) -> Vec<F>
    {
        assert_eq!(growth.len(), self.delta.len());

        growth.iter().zip(&self.delta).zip(&self.lam)
        .map(|((&r, &d), &l)| r + gamma * d - l)
        .collect()
    }

    /// Net change of the allocation \\(\lambda - \delta\\).
    pub fn net_trade(&self) -> Vec<F>
    {
        self.lam.iter().zip(&self.delta)
        .map(|(&l, &d)| l - d)
        .collect()
    }

    /// Expected return \\(z^T \mu\\) of the new allocation.
    pub fn expected_return(&self, mu: &[F], z_curr: &[F]) -> F
    {
        assert_eq!(mu.len(), self.delta.len());

        let z = self.new_allocation(z_curr);
        mu.iter().zip(&z).fold(F::zero(), |acc, (&m, &e)| acc + m * e)
    }

    /// Variance \\(z^T \Sigma z\\) of the new allocation.
    pub fn variance<L>(&self, sigma: &MatBuild<L>, z_curr: &[F]) -> F
    where L: LinAlgEx<F=F>
    {
        quad_form(sigma, &self.new_allocation(z_curr))
    }
}

//

fn clip_noise<F: Float + core::fmt::LowerExp>(name: &str, v: &mut [F], eps_clip: F) -> Result<(), RebalanceError>
{
    for (i, e) in v.iter_mut().enumerate() {
        if *e < F::zero() {
            if -*e > eps_clip {
                log::warn!("{}[{}] = {:.3e} below zero beyond tolerance", name, i, *e);
                return Err(RebalanceError::InvalidSolution);
            }
            log::debug!("{}[{}] = {:.3e} clipped", name, i, *e);
            *e = F::zero();
        }
    }
    Ok(())
}

fn check_growth<F: Float + core::fmt::LowerExp>(growth: &[F], new_growth: &[F], eps_clip: F) -> Result<(), RebalanceError>
{
    if let Some(i) = new_growth.iter().position(|&e| !(e > F::zero())) {
        log::warn!("new growth[{}] = {:.3e} not positive", i, new_growth[i]);
        return Err(RebalanceError::InvalidSolution);
    }

    let g0 = geo_mean(growth);
    let g = geo_mean(new_growth);
    // NaN fails as well
    if !(g >= g0 - eps_clip * F::one().max(g0)) {
        log::warn!("geometric mean of growth decreased: {:.3e} -> {:.3e}", g0, g);
        return Err(RebalanceError::InvalidSolution);
    }
    Ok(())
}

/// Rebalance optimizer
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-svg.js"></script>
///
/// Validates inputs, builds a [`ProbRebalance`] and solves it by a [`ConicSolve`] implementation.
/// It holds no state other than parameters; every call builds and drops its own model.
#[derive(Clone)]
pub struct RebalanceOptimizer<L: LinAlgEx, S = TotsuSolve>
{
    /// rebalance parameters.
    pub par: RebalanceParam<L::F>,
    solver: S,
}

impl<L: LinAlgEx> RebalanceOptimizer<L>
{
    /// Creates an instance solving by `totsu_core`.
    ///
    /// Returns [`RebalanceOptimizer`] instance.
    pub fn new() -> Self
    {
        Self::with_solver(TotsuSolve)
    }
}

impl<L: LinAlgEx, S> RebalanceOptimizer<L, S>
{
    /// Creates an instance solving by a given solver.
    ///
    /// Returns [`RebalanceOptimizer`] instance.
    pub fn with_solver(solver: S) -> Self
    {
        RebalanceOptimizer {
            par: RebalanceParam::default(),
            solver,
        }
    }

    /// Changes rebalance parameters.
    ///
    /// Returns [`RebalanceOptimizer`] with its parameters changed.
    /// * `f` is a function to change parameters given by its argument.
    pub fn par<P>(mut self, f: P) -> Self
    where P: FnOnce(&mut RebalanceParam<L::F>)
    {
        f(&mut self.par);
        self
    }

    /// Solver in use.
    pub fn solver(&self) -> &S
    {
        &self.solver
    }
}

impl<L: LinAlgEx, S: ConicSolve<L>> RebalanceOptimizer<L, S>
where L::F: core::fmt::LowerExp
{
    /// Solves a rebalance.
    ///
    /// Returns `Ok` with the optimal [`Rebalance`] or `Err` with [`RebalanceError`] type.
    /// Invalid inputs are rejected without invoking the solver.
    /// * `input` is the set of inputs.
    pub fn solve(&self, input: &RebalanceInput<L>) -> Result<Rebalance<L::F>, RebalanceError>
    {
        let n = validate(input, &self.par).map_err(|e| {
            log::warn!("rejected: {}", e);
            e
        })?;

        let mut prob = ProbRebalance::new(
            input.mu, sym_pack(input.sigma),
            input.kappa, input.gamma,
            input.z_curr, input.growth,
            self.par.solver.eps_zero
        );

        let x = self.solver.solve_conic(&self.par.solver, prob.problem()).map_err(|e| {
            log::warn!("solver: {}", e);
            RebalanceError::from(e)
        })?;

        let (mut delta, mut lam) = prob.split(&x);
        clip_noise("delta", &mut delta, self.par.eps_clip)?;
        clip_noise("lam", &mut lam, self.par.eps_clip)?;

        let mut rslt = Rebalance {
            delta,
            lam,
            objective: L::F::zero(),
            status: Status::Optimal,
        };
        check_growth(input.growth, &rslt.new_growth(input.growth, input.gamma), self.par.eps_clip)?;
        rslt.objective = objective_value(input.mu, input.sigma, input.kappa, &rslt.new_allocation(input.z_curr));

        log::info!("rebalance of {} assets: {}, objective {:.3e}", n, rslt.status, rslt.objective);

        Ok(rslt)
    }

    /// Solves a rebalance given each input separately.
    ///
    /// Same as [`RebalanceOptimizer::solve`].
    /// * `mu` is \\(\mu\\).
    /// * `sigma` is \\(\Sigma\\).
    /// * `kappa` is \\(\kappa\\).
    /// * `gamma` is \\(\gamma\\).
    /// * `z_curr` is \\(z_c\\).
    /// * `growth` is \\(R\\).
    pub fn solve_with(&self,
        mu: &[L::F], sigma: &MatBuild<L>,
        kappa: L::F, gamma: L::F,
        z_curr: &[L::F], growth: &[L::F]) -> Result<Rebalance<L::F>, RebalanceError>
    {
        self.solve(&RebalanceInput {mu, sigma, kappa, gamma, z_curr, growth})
    }
}

//

#[cfg(test)]
mod tests
{
    use core::cell::Cell;
    use float_eq::assert_float_eq;
    use totsu_core::solver::{SolverError, SolverParam, Operator, Cone};
    use totsu_core::{FloatGeneric, MatType};
    use crate::InputError;
    use super::*;

    type L = FloatGeneric<f64>;
    type AMatBuild = MatBuild<L>;

    struct CountSolve
    {
        calls: Cell<usize>,
        rslt: Result<(), SolverError>,
    }

    impl ConicSolve<L> for CountSolve
    {
        fn solve_conic<OC, OA, OB, C>(&self, _par: &SolverParam<f64>, (_op_c, op_a, _op_b, _cone, _work): (OC, OA, OB, C, &mut[f64])) -> Result<Vec<f64>, SolverError>
        where OC: Operator<L>, OA: Operator<L>, OB: Operator<L>, C: Cone<L>
        {
            self.calls.set(self.calls.get() + 1);
            self.rslt.map(|_| vec![0.; op_a.size().1])
        }
    }

    fn count_solve(rslt: Result<(), SolverError>) -> RebalanceOptimizer<L, CountSolve>
    {
        RebalanceOptimizer::with_solver(CountSolve {calls: Cell::new(0), rslt})
    }

    #[test]
    fn test_quad_form()
    {
        let sigma = AMatBuild::new(MatType::SymPack(2)).iter_colmaj(&[
            2., 1.,
            1., 3.,
        ]);

        assert_float_eq!(quad_form(&sigma, &[1., 2.]), 2. + 2. * 2. + 3. * 4., abs <= 1e-12);
        assert_float_eq!(objective_value(&[0.5, 1.], &sigma, 0.1, &[1., 2.]), 2.5 - 1.8, abs <= 1e-12);
    }

    #[test]
    fn test_rebalance_derived()
    {
        let rslt = Rebalance {
            delta: vec![0.5, 0.],
            lam: vec![0., 0.25],
            objective: 0.,
            status: Status::Optimal,
        };

        assert_float_eq!(rslt.new_allocation(&[1., 1.]).as_slice(), [0.5, 1.25].as_ref(), abs_all <= 1e-12);
        assert_float_eq!(rslt.new_growth(&[1., 1.], 2.).as_slice(), [2., 0.75].as_ref(), abs_all <= 1e-12);
        assert_float_eq!(rslt.net_trade().as_slice(), [-0.5, 0.25].as_ref(), abs_all <= 1e-12);
        assert_float_eq!(rslt.expected_return(&[0.2, 0.4], &[1., 1.]), 0.1 + 0.5, abs <= 1e-12);
    }

    #[test]
    fn test_invalid_skips_solver()
    {
        let _ = env_logger::builder().is_test(true).try_init();

        let opt = count_solve(Ok(()));
        let sigma = AMatBuild::new(MatType::SymPack(2));

        let rslt = opt.solve_with(&[0.1, 0.2], &sigma, 1., 1., &[1., 1.], &[1., 0.]);
        assert_eq!(rslt, Err(RebalanceError::InvalidInput(InputError::NonPositiveGrowth {index: 1})));
        assert_eq!(opt.solver().calls.get(), 0);

        let rslt = opt.solve_with(&[0.1, 0.2], &sigma, 1., 1., &[1., 1.], &[1., 1.]);
        assert!(rslt.is_ok());
        assert_eq!(opt.solver().calls.get(), 1);
    }

    #[test]
    fn test_zero_solution()
    {
        let opt = count_solve(Ok(()));
        let sigma = AMatBuild::new(MatType::SymPack(2)).iter_colmaj(&[
            0.01, 0.,
            0.,   0.01,
        ]);

        let rslt = opt.solve_with(&[0.1, 0.2], &sigma, 1., 1., &[1., 1.], &[1., 1.]).unwrap();
        assert_eq!(rslt.delta, vec![0., 0.]);
        assert_eq!(rslt.lam, vec![0., 0.]);
        assert_eq!(rslt.status, Status::Optimal);
        assert_float_eq!(rslt.objective, 0.3 - 0.02, abs <= 1e-12);
    }

    #[test]
    fn test_solver_error_mapping()
    {
        let sigma = AMatBuild::new(MatType::SymPack(1)).iter_colmaj(&[1.]);

        let opt = count_solve(Err(SolverError::Infeasible));
        assert_eq!(opt.solve_with(&[0.1], &sigma, 1., 1., &[1.], &[1.]), Err(RebalanceError::Infeasible));

        let opt = count_solve(Err(SolverError::Unbounded));
        assert_eq!(opt.solve_with(&[0.1], &sigma, 1., 1., &[1.], &[1.]), Err(RebalanceError::Unbounded));

        let opt = count_solve(Err(SolverError::ExcessIter));
        let e = opt.solve_with(&[0.1], &sigma, 1., 1., &[1.], &[1.]).unwrap_err();
        assert_eq!(e, RebalanceError::SolverFailure(SolverError::ExcessIter));
        assert_eq!(e.status(), Some(Status::SolverError));
    }

    #[test]
    fn test_clip_noise()
    {
        let mut v = [1., -1e-9, -0.5e-4, 0.];
        assert_eq!(clip_noise("v", &mut v, 1e-4), Ok(()));
        assert_eq!(v, [1., 0., 0., 0.]);

        let mut v = [1., -0.5];
        assert_eq!(clip_noise("v", &mut v, 1e-4), Err(RebalanceError::InvalidSolution));
    }

    struct FixedSolve
    {
        delta: Vec<f64>,
        lam: Vec<f64>,
    }

    impl ConicSolve<L> for FixedSolve
    {
        fn solve_conic<OC, OA, OB, C>(&self, _par: &SolverParam<f64>, (_op_c, op_a, _op_b, _cone, _work): (OC, OA, OB, C, &mut[f64])) -> Result<Vec<f64>, SolverError>
        where OC: Operator<L>, OA: Operator<L>, OB: Operator<L>, C: Cone<L>
        {
            let mut x = vec![0.; op_a.size().1];
            let n = self.delta.len();
            x[0.. n].copy_from_slice(&self.delta);
            x[n.. 2 * n].copy_from_slice(&self.lam);
            Ok(x)
        }
    }

    #[test]
    fn test_invalid_solution()
    {
        let _ = env_logger::builder().is_test(true).try_init();

        let sigma = AMatBuild::new(MatType::SymPack(2)).iter_colmaj(&[
            0.01, 0.,
            0.,   0.01,
        ]);
        let fixed = |delta: &[f64], lam: &[f64]| {
            RebalanceOptimizer::<L, _>::with_solver(FixedSolve {delta: delta.to_vec(), lam: lam.to_vec()})
        };

        // negative beyond tolerance
        let opt = fixed(&[-0.5, 3.], &[0., 0.]);
        assert_eq!(opt.solve_with(&[0.1, 0.2], &sigma, 1., -1., &[1., 1.], &[1., 1.]), Err(RebalanceError::InvalidSolution));

        // growth proxy driven below zero
        let opt = fixed(&[0., 3.], &[0., 0.]);
        assert_eq!(opt.solve_with(&[0.1, 0.2], &sigma, 1., -1., &[1., 1.], &[1., 1.]), Err(RebalanceError::InvalidSolution));

        // geometric mean decreased
        let opt = fixed(&[0., 0.], &[0., 0.5]);
        let e = opt.solve_with(&[0.1, 0.2], &sigma, 1., 1., &[1., 1.], &[1., 1.]).unwrap_err();
        assert_eq!(e, RebalanceError::InvalidSolution);
        assert_eq!(e.status(), Some(Status::SolverError));

        // feasible: growth [1.5, 0.75] has geometric mean above 1
        let opt = fixed(&[0.5, -1e-9], &[0., 0.25]);
        let rslt = opt.solve_with(&[0.1, 0.2], &sigma, 1., 1., &[1., 1.], &[1., 1.]).unwrap();
        assert_eq!(rslt.delta, vec![0.5, 0.]);
        assert_eq!(rslt.status, Status::Optimal);
    }
}
