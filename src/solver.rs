//! Conic solver interface

use core::fmt::{Debug, LowerExp};
use num_traits::Float;
use totsu_core::solver::{Solver, SolverError, SolverParam, LinAlg, Operator, Cone};

/// Conic solver trait
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
///
/// Solves a conic linear program
/// \\[
/// \begin{array}{ll}
/// {\rm minimize} & c^T x \\\\
/// {\rm subject \ to} & A x + s = b \\\\
/// & s \in \mathcal{K},
/// \end{array}
/// \\]
/// given in the same tuple form that [`Solver::solve`] accepts.
/// [`crate::RebalanceOptimizer`] talks to its solver only through this trait.
pub trait ConicSolve<L: LinAlg>
{
    /// Solves the program.
    ///
    /// Returns `Ok` with an optimal \\(x\\) or `Err` with [`SolverError`] type.
    /// * `par` is a set of tolerances the solver should respect.
    /// * `prob` is a tuple of \\(c\\), \\(A\\), \\(b\\), \\(\mathcal{K}\\) and a work slice.
    fn solve_conic<OC, OA, OB, C>(&self, par: &SolverParam<L::F>, prob: (OC, OA, OB, C, &mut[L::F])) -> Result<Vec<L::F>, SolverError>
    where OC: Operator<L>, OA: Operator<L>, OB: Operator<L>, C: Cone<L>;
}

//

/// [`ConicSolve`] by the first-order conic solver of `totsu_core`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TotsuSolve;

impl<L: LinAlg> ConicSolve<L> for TotsuSolve
where L::F: Float + Debug + LowerExp
{
    fn solve_conic<OC, OA, OB, C>(&self, par: &SolverParam<L::F>, prob: (OC, OA, OB, C, &mut[L::F])) -> Result<Vec<L::F>, SolverError>
    where OC: Operator<L>, OA: Operator<L>, OB: Operator<L>, C: Cone<L>
    {
        let s = Solver::<L>::new().par(|p| {
            *p = par.clone();
        });

        let (x, _y) = s.solve(prob)?;

        Ok(x.to_vec())
    }
}
