/*!
Portfolio rebalancing as a convex optimization problem that can be solved by [`totsu_core`].

<script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
<script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>

# Problem

Given expected returns \\(\mu\\), a covariance \\(\Sigma\\), a risk aversion \\(\kappa \ge 0\\),
a growth coupling \\(\gamma\\), a current allocation \\(z_c\\) and a positive growth proxy \\(R\\),
a single-period rebalance decides \\(\delta, \lambda \succeq 0\\) that
\\[
\begin{array}{ll}
{\rm maximize} & z^T \mu - \kappa z^T \Sigma z \\\\
{\rm subject \ to} & {\bf GeoMean}(R + \gamma \delta - \lambda) \ge {\bf GeoMean}(R),
\end{array}
\\]
where \\(z = z_c - \delta + \lambda\\).
See [`ProbRebalance`] about its representation as a conic linear program.

# General usage

1. Choose a [`totsu_core::LinAlgEx`] implementation to use, [`prelude::FloatGeneric`] for instance.
1. Construct the covariance with [`prelude::MatBuild`].
1. Create a [`RebalanceOptimizer`] instance and optionally set its parameters.
1. Invoke [`RebalanceOptimizer::solve`] (or [`RebalanceOptimizer::solve_with`]) to get a [`Rebalance`].
1. For a multi-period process, keep the state in a [`RebalanceContext`] and step it period by period.

# Examples

Two assets, the second one with the higher expected return:

```
use totsu_rebalance::prelude::*;
use totsu_rebalance::*;

//env_logger::init(); // Use any logger crate as `totsu_rebalance` uses `log` crate.

type La = FloatGeneric<f64>;
type AMatBuild = MatBuild<La>;
type AOptimizer = RebalanceOptimizer<La>;

let sigma = AMatBuild::new(MatType::SymPack(2)).iter_colmaj(&[
    0.01, 0.,
    0.,   0.01,
]);
let z_curr = [1., 1.];
let growth = [1., 1.];

let opt = AOptimizer::new();
let rslt = opt.solve_with(&[0.1, 0.2], &sigma, 1., 1., &z_curr, &growth).unwrap();

let z = rslt.new_allocation(&z_curr);
assert!(z[1] > z[0]);
assert!(geo_mean(&rslt.new_growth(&growth, 1.)) >= 1. - 1e-3);
```
*/

mod param;

pub use param::*;

//

mod error;

pub use error::*;

//

mod validate;

pub use validate::*;

//

pub mod solver;

//

mod problem;

pub use problem::*;

//

mod optimizer;

pub use optimizer::*;

//

mod context;

pub use context::*;

//

/// Prelude
pub mod prelude
{
   pub use totsu_core::solver::{SolverError, SolverParam};
   pub use totsu_core::{FloatGeneric, MatType};
   pub use totsu::MatBuild;
   pub use crate::solver::{ConicSolve, TotsuSolve};
}
