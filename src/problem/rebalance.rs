use num_traits::{Float, Zero, One};
use totsu_core::solver::{Solver, SliceLike, Operator, Cone};
use totsu_core::{LinAlgEx, MatOp, MatType, ConeRotSOC, ConeRPos, splitm, splitm_mut};
use totsu::MatBuild;
use super::GeoMeanTree;
use super::geo_mean;

//

pub struct ProbRebalanceOpC<'a, L: LinAlgEx>
{
    n_aux: usize,
    vec_mu: MatOp<'a, L>,
}

impl<'a, L: LinAlgEx> ProbRebalanceOpC<'a, L>
{
    fn dim(&self) -> (usize, usize)
    {
        let (n, one) = self.vec_mu.size();
        assert_eq!(one, 1);

        (n, self.n_aux)
    }
}

impl<'a, L: LinAlgEx> Operator<L> for ProbRebalanceOpC<'a, L>
{
    fn size(&self) -> (usize, usize)
    {
        let (n, n_aux) = self.dim();

        (2 * n + n_aux + 1, 1)
    }

    fn op(&self, alpha: L::F, x: &L::Sl, beta: L::F, y: &mut L::Sl)
    {
        let (n, n_aux) = self.dim();

        splitm_mut!(y, (y_d; n), (y_l; n), (y_u; n_aux), (y_t; 1));

        // y_d = a*vec_mu*x + b*y_d
        self.vec_mu.op(alpha, x, beta, &mut y_d);

        // y_l = a*-vec_mu*x + b*y_l
        self.vec_mu.op(-alpha, x, beta, &mut y_l);

        // y_u = 0*x + b*y_u
        L::scale(beta, &mut y_u);

        // y_t = a*1*x + b*y_t
        L::scale(beta, &mut y_t);
        L::add(alpha, x, &mut y_t);
    }

    fn trans_op(&self, alpha: L::F, x: &L::Sl, beta: L::F, y: &mut L::Sl)
    {
        let (n, n_aux) = self.dim();

        splitm!(x, (x_d; n), (x_l; n), (_x_u; n_aux), (x_t; 1));

        let f1 = L::F::one();

        // y = a*vec_mu^T*x_d + a*-vec_mu^T*x_l + 0*x_u + a*1*x_t + b*y
        self.vec_mu.trans_op(alpha, &x_d, beta, y);
        self.vec_mu.trans_op(-alpha, &x_l, f1, y);
        L::add(alpha, &x_t, y);
    }

    fn absadd_cols(&self, tau: &mut L::Sl)
    {
        self.vec_mu.absadd_cols(tau);
        self.vec_mu.absadd_cols(tau);

        let val_tau = tau.get(0) + L::F::one();
        tau.set(0, val_tau);
    }

    fn absadd_rows(&self, sigma: &mut L::Sl)
    {
        let (n, n_aux) = self.dim();

        splitm_mut!(sigma, (sigma_d; n), (sigma_l; n), (_sigma_u; n_aux), (sigma_t; 1));

        self.vec_mu.absadd_rows(&mut sigma_d);
        self.vec_mu.absadd_rows(&mut sigma_l);

        let val_sigma_t = sigma_t.get(0) + L::F::one();
        sigma_t.set(0, val_sigma_t);
    }
}

//

pub struct ProbRebalanceOpA<'a, L: LinAlgEx>
{
    sym_s: MatOp<'a, L>,
    mat_g: MatOp<'a, L>,
}

impl<'a, L: LinAlgEx> ProbRebalanceOpA<'a, L>
{
    fn dim(&self) -> (usize, usize, usize)
    {
        let (n, n_) = self.sym_s.size();
        assert_eq!(n, n_);
        let (ng, nv) = self.mat_g.size();
        assert!(nv >= 2 * n);

        (n, nv - 2 * n, ng)
    }
}

impl<'a, L: LinAlgEx> Operator<L> for ProbRebalanceOpA<'a, L>
{
    fn size(&self) -> (usize, usize)
    {
        let (n, n_aux, ng) = self.dim();

        ((2 + n) + ng + 2 * n, 2 * n + n_aux + 1)
    }

    fn op(&self, alpha: L::F, x: &L::Sl, beta: L::F, y: &mut L::Sl)
    {
        let (n, n_aux, ng) = self.dim();

        splitm!(x, (x_d; n), (x_l; n), (_x_u; n_aux), (x_t; 1));
        splitm!(x, (x_dlu; 2 * n + n_aux));
        splitm_mut!(y, (y_r; 1), (y_s; 1), (y_q; n), (y_g; ng), (y_d; n), (y_l; n));

        let f1 = L::F::one();

        // y_r = 0*x + b*y_r
        L::scale(beta, &mut y_r);

        // y_s = a*-1*x_t + b*y_s
        L::scale(beta, &mut y_s);
        L::add(-alpha, &x_t, &mut y_s);

        // y_q = a*sym_s*x_d + a*-sym_s*x_l + b*y_q
        self.sym_s.op(alpha, &x_d, beta, &mut y_q);
        self.sym_s.op(-alpha, &x_l, f1, &mut y_q);

        // y_g = a*mat_g*x_dlu + b*y_g
        self.mat_g.op(alpha, &x_dlu, beta, &mut y_g);

        // y_d = a*-1*x_d + b*y_d
        L::scale(beta, &mut y_d);
        L::add(-alpha, &x_d, &mut y_d);

        // y_l = a*-1*x_l + b*y_l
        L::scale(beta, &mut y_l);
        L::add(-alpha, &x_l, &mut y_l);
    }

    fn trans_op(&self, alpha: L::F, x: &L::Sl, beta: L::F, y: &mut L::Sl)
    {
        let (n, n_aux, ng) = self.dim();

        splitm!(x, (_x_r; 1), (x_s; 1), (x_q; n), (x_g; ng), (x_d; n), (x_l; n));
        splitm_mut!(y, (y_dlu; 2 * n + n_aux), (y_t; 1));

        let f1 = L::F::one();

        // y_dlu = a*mat_g^T*x_g + b*y_dlu
        self.mat_g.trans_op(alpha, &x_g, beta, &mut y_dlu);

        {
            splitm_mut!(y_dlu, (y_d; n), (y_l; n));

            // y_d += a*sym_s*x_q + a*-1*x_d
            self.sym_s.op(alpha, &x_q, f1, &mut y_d);
            L::add(-alpha, &x_d, &mut y_d);

            // y_l += a*-sym_s*x_q + a*-1*x_l
            self.sym_s.op(-alpha, &x_q, f1, &mut y_l);
            L::add(-alpha, &x_l, &mut y_l);
        }

        // y_t = a*-1*x_s + b*y_t
        L::scale(beta, &mut y_t);
        L::add(-alpha, &x_s, &mut y_t);
    }

    fn absadd_cols(&self, tau: &mut L::Sl)
    {
        let (n, n_aux, _ng) = self.dim();

        let f1 = L::F::one();

        splitm_mut!(tau, (tau_dlu; 2 * n + n_aux), (tau_t; 1));

        self.mat_g.absadd_cols(&mut tau_dlu);

        {
            splitm_mut!(tau_dlu, (tau_d; n), (tau_l; n));

            self.sym_s.absadd_cols(&mut tau_d);
            L::adds(f1, &mut tau_d);

            self.sym_s.absadd_cols(&mut tau_l);
            L::adds(f1, &mut tau_l);
        }

        let val_tau_t = tau_t.get(0) + f1;
        tau_t.set(0, val_tau_t);
    }

    fn absadd_rows(&self, sigma: &mut L::Sl)
    {
        let (n, _n_aux, ng) = self.dim();

        let f1 = L::F::one();

        splitm_mut!(sigma, (_sigma_r; 1), (sigma_s; 1), (sigma_q; n), (sigma_g; ng), (sigma_d; n), (sigma_l; n));

        let val_sigma_s = sigma_s.get(0) + f1;
        sigma_s.set(0, val_sigma_s);

        // sym_s appears twice, for delta and lam
        self.sym_s.absadd_rows(&mut sigma_q);
        self.sym_s.absadd_rows(&mut sigma_q);

        self.mat_g.absadd_rows(&mut sigma_g);

        L::adds(f1, &mut sigma_d);
        L::adds(f1, &mut sigma_l);
    }
}

//

pub struct ProbRebalanceOpB<'a, L: LinAlgEx>
{
    vec_q: MatOp<'a, L>,
    vec_h: MatOp<'a, L>,
}

impl<'a, L: LinAlgEx> ProbRebalanceOpB<'a, L>
{
    fn dim(&self) -> (usize, usize)
    {
        let (n, one) = self.vec_q.size();
        assert_eq!(one, 1);
        let (ng, one) = self.vec_h.size();
        assert_eq!(one, 1);

        (n, ng)
    }
}

impl<'a, L: LinAlgEx> Operator<L> for ProbRebalanceOpB<'a, L>
{
    fn size(&self) -> (usize, usize)
    {
        let (n, ng) = self.dim();

        ((2 + n) + ng + 2 * n, 1)
    }

    fn op(&self, alpha: L::F, x: &L::Sl, beta: L::F, y: &mut L::Sl)
    {
        let (n, ng) = self.dim();

        splitm_mut!(y, (y_r; 1), (y_s; 1), (y_q; n), (y_g; ng), (y_dl; 2 * n));

        // y_r = a*1*x + b*y_r
        L::scale(beta, &mut y_r);
        L::add(alpha, x, &mut y_r);

        // y_s = 0*x + b*y_s
        L::scale(beta, &mut y_s);

        // y_q = a*vec_q*x + b*y_q
        self.vec_q.op(alpha, x, beta, &mut y_q);

        // y_g = a*vec_h*x + b*y_g
        self.vec_h.op(alpha, x, beta, &mut y_g);

        // y_dl = 0*x + b*y_dl
        L::scale(beta, &mut y_dl);
    }

    fn trans_op(&self, alpha: L::F, x: &L::Sl, beta: L::F, y: &mut L::Sl)
    {
        let (n, ng) = self.dim();

        splitm!(x, (x_r; 1), (_x_s; 1), (x_q; n), (x_g; ng), (_x_dl; 2 * n));

        let f1 = L::F::one();

        // y = a*1*x_r + 0*x_s + a*vec_q^T*x_q + a*vec_h^T*x_g + 0*x_dl + b*y
        self.vec_q.trans_op(alpha, &x_q, beta, y);
        self.vec_h.trans_op(alpha, &x_g, f1, y);
        L::add(alpha, &x_r, y);
    }

    fn absadd_cols(&self, tau: &mut L::Sl)
    {
        let val_tau = tau.get(0) + L::F::one();
        tau.set(0, val_tau);
        self.vec_q.absadd_cols(tau);
        self.vec_h.absadd_cols(tau);
    }

    fn absadd_rows(&self, sigma: &mut L::Sl)
    {
        let (n, ng) = self.dim();

        splitm_mut!(sigma, (sigma_r; 1), (_sigma_s; 1), (sigma_q; n), (sigma_g; ng), (_sigma_dl; 2 * n));

        let val_sigma_r = sigma_r.get(0) + L::F::one();
        sigma_r.set(0, val_sigma_r);
        self.vec_q.absadd_rows(&mut sigma_q);
        self.vec_h.absadd_rows(&mut sigma_g);
    }
}

//

pub struct ProbRebalanceCone<L: LinAlgEx>
{
    n: usize,
    n_aux: usize,
    cone_rotsoc: ConeRotSOC<L>,
    cone_rpos: ConeRPos<L>,
}

impl<L: LinAlgEx> Cone<L> for ProbRebalanceCone<L>
{
    fn proj(&mut self, dual_cone: bool, x: &mut L::Sl) -> Result<(), ()>
    {
        let (n, n_aux) = (self.n, self.n_aux);

        splitm_mut!(x, (x_rsq; 2 + n), (x_g; 3 * n_aux), (x_p; 1 + 2 * n));

        self.cone_rotsoc.proj(dual_cone, &mut x_rsq)?;

        for k in 0.. n_aux {
            splitm_mut!(x_g, (_x_done; 3 * k), (x_k; 3));

            self.cone_rotsoc.proj(dual_cone, &mut x_k)?;
        }

        self.cone_rpos.proj(dual_cone, &mut x_p)?;
        Ok(())
    }

    fn product_group<G: Fn(&mut L::Sl) + Copy>(&self, dp_tau: &mut L::Sl, group: G)
    {
        let (n, n_aux) = (self.n, self.n_aux);

        splitm_mut!(dp_tau, (t_rsq; 2 + n), (t_g; 3 * n_aux), (t_p; 1 + 2 * n));

        self.cone_rotsoc.product_group(&mut t_rsq, group);

        for k in 0.. n_aux {
            splitm_mut!(t_g, (_t_done; 3 * k), (t_k; 3));

            self.cone_rotsoc.product_group(&mut t_k, group);
        }

        self.cone_rpos.product_group(&mut t_p, group);
    }
}

//

/// Rebalance program
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-svg.js"></script>
///
/// The problem is
/// \\[
/// \begin{array}{ll}
/// {\rm maximize} & z^T \mu - \kappa z^T \Sigma z \\\\
/// {\rm subject \ to} & \left( \prod_{i=0}^{n-1} R'\_i \right)^{1 \over n} \ge
///                      \left( \prod_{i=0}^{n-1} R_i \right)^{1 \over n} \\\\
/// & \delta \succeq 0, \ \lambda \succeq 0,
/// \end{array}
/// \\]
/// where
/// - variables \\( \delta, \lambda \in \mathbb{R}^n \\)
/// - \\( z = z_c - \delta + \lambda,\ R' = R + \gamma \delta - \lambda \\)
/// - \\( \mu \in \mathbb{R}^n,\ \Sigma \in \mathcal{S}_{+}^n,\ \kappa \ge 0,\ \gamma \in \mathbb{R} \\)
/// - \\( z_c \in \mathbb{R}^n,\ R \in \mathbb{R}\_{++}^n \\).
///
/// The constant \\( \mu^T z_c \\) is dropped and the objective is negated to minimize.
/// With \\( S = \sqrt{2 \kappa} \Sigma^{1 \over 2} \\) and the geometric mean written by
/// [`GeoMeanTree`] as \\( G [\delta; \lambda; u] + s_g = h,\ s_g \in (\mathcal{Q}_r^3)^{N-1} \times \mathbb{R}\_+ \\),
/// the representation as a conic linear program is as follows:
/// \\[
/// \begin{array}{ll}
/// {\rm minimize} & \mu^T \delta - \mu^T \lambda + t \\\\
/// {\rm subject \ to} &
///   \left[ \begin{array}{cccc}
///   0 & 0 & 0 & 0 \\\\
///   0 & 0 & 0 & -1 \\\\
///   S & -S & 0 & 0 \\\\
///   \multicolumn{3}{c}{G} & 0 \\\\
///   -I & 0 & 0 & 0 \\\\
///   0 & -I & 0 & 0
///   \end{array} \right]
///   \left[ \begin{array}{c}
///   \delta \\\\ \lambda \\\\ u \\\\ t
///   \end{array} \right]
///   + s =
///   \left[ \begin{array}{c}
///   1 \\\\ 0 \\\\ S z_c \\\\ h \\\\ 0 \\\\ 0
///   \end{array} \right] \\\\
/// & s \in \mathcal{Q}_r^{2 + n} \times (\mathcal{Q}_r^3)^{N-1} \times \mathbb{R}\_+^{1 + 2n}.
/// \end{array}
/// \\]
///
/// \\( \mathcal{Q}_r \\) is a rotated second-order (or quadratic) cone (see [`ConeRotSOC`]).
pub struct ProbRebalance<L: LinAlgEx>
{
    vec_mu: MatBuild<L>,
    sym_s: MatBuild<L>,
    vec_q: MatBuild<L>,
    mat_g: MatBuild<L>,
    vec_h: MatBuild<L>,
    n_aux: usize,

    w_solver: Vec<L::F>,
}

impl<L: LinAlgEx> ProbRebalance<L>
{
    /// Creates a rebalance program with given data.
    ///
    /// Returns the [`ProbRebalance`] instance.
    /// * `vec_mu` is \\(\mu\\).
    /// * `sym_sigma` is \\(\Sigma\\) which shall belong to [`MatType::SymPack`].
    /// * `kappa` is \\(\kappa\\).
    /// * `gamma` is \\(\gamma\\).
    /// * `z_curr` is \\(z_c\\).
    /// * `growth` is \\(R\\).
    /// * `eps_zero` should be the same value as [`totsu_core::solver::SolverParam::eps_zero`].
    pub fn new(
        vec_mu: &[L::F], sym_sigma: MatBuild<L>,
        kappa: L::F, gamma: L::F,
        z_curr: &[L::F], growth: &[L::F],
        eps_zero: L::F) -> Self
    {
        let n = vec_mu.len();

        assert!(n > 0);
        assert!(sym_sigma.is_sympack());
        assert_eq!(sym_sigma.size(), (n, n));
        assert_eq!(z_curr.len(), n);
        assert_eq!(growth.len(), n);

        let f0 = L::F::zero();
        let f1 = L::F::one();

        let vec_mu = MatBuild::new(MatType::General(n, 1))
                     .iter_colmaj(vec_mu);

        let sym_s = sym_sigma
                    .sqrt(eps_zero)
                    .scale((kappa + kappa).sqrt());

        let mut vec_q = MatBuild::new(MatType::General(n, 1));
        sym_s.as_op().op(f1, &L::Sl::new_ref(z_curr), f0, &mut L::Sl::new_mut(vec_q.as_mut()));

        let tree = GeoMeanTree::new(growth, gamma, geo_mean(growth));
        let n_aux = tree.n_cone();
        let (mat_g, vec_h) = tree.into_parts();

        log::debug!("rebalance: n {}, auxiliaries {}, cone rows {}", n, n_aux, (2 + n) + vec_h.size().0 + 2 * n);

        ProbRebalance {
            vec_mu,
            sym_s,
            vec_q,
            mat_g,
            vec_h,
            n_aux,
            w_solver: Vec::new(),
        }
    }

    /// Number of assets \\(n\\).
    pub fn n(&self) -> usize
    {
        self.vec_mu.size().0
    }

    /// Splits a primal solution of the conic program into \\(\delta\\) and \\(\lambda\\).
    ///
    /// Returns a tuple of \\(\delta\\) and \\(\lambda\\).
    /// * `x` is the primal solution \\([\delta; \lambda; u; t]\\).
    pub fn split(&self, x: &[L::F]) -> (Vec<L::F>, Vec<L::F>)
    {
        let n = self.n();
        assert_eq!(x.len(), 2 * n + self.n_aux + 1);

        let (delta, rest) = x.split_at(n);
        let (lam, _) = rest.split_at(n);

        (delta.to_vec(), lam.to_vec())
    }

    /// Generates the problem data structures to be fed to [`Solver::solve`].
    ///
    /// Returns a tuple of operators, a cone and a work slice.
    pub fn problem(&mut self) -> (ProbRebalanceOpC<'_, L>, ProbRebalanceOpA<'_, L>, ProbRebalanceOpB<'_, L>, ProbRebalanceCone<L>, &mut[L::F])
    {
        let n = self.n();
        let n_aux = self.n_aux;

        let f0 = L::F::zero();

        let op_c = ProbRebalanceOpC {
            n_aux,
            vec_mu: self.vec_mu.as_op(),
        };
        let op_a = ProbRebalanceOpA {
            sym_s: self.sym_s.as_op(),
            mat_g: self.mat_g.as_op(),
        };
        let op_b = ProbRebalanceOpB {
            vec_q: self.vec_q.as_op(),
            vec_h: self.vec_h.as_op(),
        };

        let cone = ProbRebalanceCone {
            n,
            n_aux,
            cone_rotsoc: ConeRotSOC::new(),
            cone_rpos: ConeRPos::new(),
        };

        self.w_solver.resize(Solver::<L>::query_worklen(op_a.size()), f0);

        (op_c, op_a, op_b, cone, self.w_solver.as_mut())
    }
}

//

#[cfg(test)]
mod tests
{
    use float_eq::assert_float_eq;
    use totsu_core::FloatGeneric;
    use super::*;

    type L = FloatGeneric<f64>;

    fn dense<O: Operator<L>>(o: &O) -> Vec<Vec<f64>>
    {
        let (m, n) = o.size();
        let mut x = vec![0.; n];
        let mut cols = Vec::new();
        for c in 0.. n {
            let mut y = vec![0.; m];
            x[c] = 1.;
            o.op(1., &x, 0., &mut y);
            x[c] = 0.;
            cols.push(y);
        }
        cols
    }

    fn sample() -> ProbRebalance<L>
    {
        let sigma = MatBuild::<L>::new(MatType::SymPack(3))
                    .iter_colmaj(&[
                        0.04, 0.01, 0.00,
                        0.01, 0.03, 0.01,
                        0.00, 0.01, 0.02,
                    ]);

        ProbRebalance::new(&[0.1, -0.2, 0.3], sigma, 2., 0.5, &[1., 2., 0.5], &[1., 2., 3.], 1e-12)
    }

    #[test]
    fn test_sizes()
    {
        let mut prob = sample();
        let (op_c, op_a, op_b, _cone, work) = prob.problem();

        // n = 3, N = 4, three auxiliaries
        assert_eq!(op_a.size(), ((2 + 3) + (3 * 3 + 1) + 2 * 3, 2 * 3 + 3 + 1));
        assert_eq!(op_c.size(), (op_a.size().1, 1));
        assert_eq!(op_b.size(), (op_a.size().0, 1));
        assert_eq!(work.len(), Solver::<L>::query_worklen(op_a.size()));
    }

    #[test]
    fn test_trans_op()
    {
        let mut prob = sample();
        let (op_c, op_a, op_b, _cone, _work) = prob.problem();

        fn check<O: Operator<L>>(o: &O)
        {
            let d = dense(o);
            let (m, n) = o.size();
            let mut x = vec![0.; m];
            for r in 0.. m {
                let mut y = vec![0.5; n];
                x[r] = 1.;
                // y = 2*K^T e_r + 3*0.5
                o.trans_op(2., &x, 3., &mut y);
                x[r] = 0.;
                for c in 0.. n {
                    assert_float_eq!(y[c], 2. * d[c][r] + 1.5, abs <= 1e-12);
                }
            }
        }

        check(&op_c);
        check(&op_a);
        check(&op_b);
    }

    #[test]
    fn test_absadd()
    {
        let mut prob = sample();
        let (op_c, op_a, op_b, _cone, _work) = prob.problem();

        fn check<O: Operator<L>>(o: &O)
        {
            let d = dense(o);
            let (m, n) = o.size();

            let mut tau = vec![1.; n];
            o.absadd_cols(&mut tau);
            for c in 0.. n {
                let sum: f64 = d[c].iter().map(|v| v.abs()).sum();
                assert_float_eq!(tau[c], 1. + sum, abs <= 1e-12);
            }

            let mut sigma = vec![1.; m];
            o.absadd_rows(&mut sigma);
            for r in 0.. m {
                let sum: f64 = (0.. n).map(|c| d[c][r].abs()).sum();
                assert_float_eq!(sigma[r], 1. + sum, abs <= 1e-12);
            }
        }

        check(&op_c);
        check(&op_a);
        check(&op_b);
    }

    #[test]
    fn test_zero_trade_slack()
    {
        let mut prob = sample();
        let n = prob.n();
        let z_curr = [1., 2., 0.5];
        let growth = [1., 2., 3.];
        let (_op_c, op_a, op_b, mut cone, _work) = prob.problem();
        let (m, nx) = op_a.size();

        // delta = lam = 0, u tight, t large enough
        let tree = GeoMeanTree::<L>::new(&growth, 0.5, geo_mean(&growth));
        let u = tree.tight_aux(&growth, geo_mean(&growth));
        let mut x = vec![0.; nx];
        x[2 * n.. 2 * n + u.len()].copy_from_slice(&u);
        x[nx - 1] = 10.;

        // s = b - A x
        let mut s = vec![0.; m];
        op_b.op(1., &[1.], 0., &mut s);
        op_a.op(-1., &x, 1., &mut s);

        // the variance row carries sqrt(2 kappa) sigma^(1/2) z_curr
        let var: f64 = s[2.. 2 + n].iter().map(|v| v * v).sum::<f64>() / 2.;
        let z = z_curr;
        let quad = 0.04 * z[0] * z[0] + 0.03 * z[1] * z[1] + 0.02 * z[2] * z[2]
                 + 2. * 0.01 * z[0] * z[1] + 2. * 0.01 * z[1] * z[2];
        assert_float_eq!(var, 2. * quad, abs <= 1e-9);

        // projection leaves a point of the cone unchanged
        let s_ref = s.clone();
        cone.proj(false, &mut s).unwrap();
        assert_float_eq!(s.as_slice(), s_ref.as_slice(), abs_all <= 1e-9);
    }
}
