use num_traits::{Float, Zero, One};
use totsu_core::{LinAlgEx, MatType};
use totsu::MatBuild;

//

/// Geometric mean \\((\prod_{i=0}^{n-1} v_i)^{1 \over n}\\).
///
/// Evaluated as \\(\exp({1 \over n}\sum_i \log v_i)\\).
/// Returns `NaN` for an empty slice or a negative entry, zero if any entry is zero.
pub fn geo_mean<F: Float>(v: &[F]) -> F
{
    if v.is_empty() {
        return F::nan();
    }

    let mut sum_log = F::zero();
    for &e in v {
        sum_log = sum_log + e.ln();
    }

    (sum_log / F::from(v.len()).unwrap_or_else(F::nan)).exp()
}

//

/// Binary tree of rotated second-order cones bounding a geometric mean from below
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-svg.js"></script>
///
/// Represents
/// \\[
/// \left( \prod_{i=0}^{n-1} (R_i + \gamma \delta_i - \lambda_i) \right)^{1 \over n} \ge g_0
/// \\]
/// over the variables \\( \delta, \lambda \in \mathbb{R}^n \\) and auxiliaries \\( u \in \mathbb{R}^{N-1} \\),
/// where \\( N = 2^k \ge n \\).
/// The \\( N \\) leaves are \\( R_i + \gamma \delta_i - \lambda_i \\) for \\( i < n \\)
/// and the constant \\( g_0 \\) for padding.
/// The internal node \\( k \\) with children \\( a, b \\) holds
/// \\( (a, b, \sqrt2 u_k) \in \mathcal{Q}_r^3 \\), that is \\( u_k^2 \le a b \\),
/// and the root is bounded as \\( u_0 - g_0 \ge 0 \\).
///
/// The rows are stacked as \\( s = h - G [\delta; \lambda; u] \\):
/// \\( 3 (N - 1) \\) cone rows followed by one nonnegative root row.
pub struct GeoMeanTree<L: LinAlgEx>
{
    n: usize,
    n_leaf: usize,
    mat_g: MatBuild<L>,
    vec_h: MatBuild<L>,
}

impl<L: LinAlgEx> GeoMeanTree<L>
{
    /// Creates a tree.
    ///
    /// Returns the [`GeoMeanTree`] instance.
    /// * `growth` is \\(R\\), its length is \\(n\\).
    /// * `gamma` is \\(\gamma\\).
    /// * `g0` is the lower bound \\(g_0\\).
    pub fn new(growth: &[L::F], gamma: L::F, g0: L::F) -> Self
    {
        let n = growth.len();
        assert!(n > 0);

        let n_leaf = n.next_power_of_two();
        let n_node = n_leaf - 1;

        let mut tree = GeoMeanTree {
            n,
            n_leaf,
            mat_g: MatBuild::new(MatType::General(3 * n_node + 1, 2 * n + n_node)),
            vec_h: MatBuild::new(MatType::General(3 * n_node + 1, 1)),
        };

        let f1 = L::F::one();
        let fsqrt2 = (f1 + f1).sqrt();

        for k in 0.. n_node {
            tree.set_node_row(3 * k, 2 * k + 1, growth, gamma, g0);
            tree.set_node_row(3 * k + 1, 2 * k + 2, growth, gamma, g0);

            let col_u = 2 * n + k;
            tree.mat_g[(3 * k + 2, col_u)] = -fsqrt2;
        }

        let row_root = 3 * n_node;
        tree.set_node_row(row_root, 0, growth, gamma, g0);
        tree.vec_h[(row_root, 0)] = tree.vec_h[(row_root, 0)] - g0;

        tree
    }

    fn set_node_row(&mut self, row: usize, node: usize, growth: &[L::F], gamma: L::F, g0: L::F)
    {
        let n = self.n;
        let n_node = self.n_leaf - 1;

        if node < n_node {
            // s = u_node
            self.mat_g[(row, 2 * n + node)] = -L::F::one();
        }
        else {
            let i = node - n_node;
            if i < n {
                // s = R_i + gamma*delta_i - lam_i
                self.mat_g[(row, i)] = -gamma;
                self.mat_g[(row, n + i)] = L::F::one();
                self.vec_h[(row, 0)] = growth[i];
            }
            else {
                // s = g0
                self.vec_h[(row, 0)] = g0;
            }
        }
    }

    /// Number of rotated cones, that is \\(N - 1\\).
    pub fn n_cone(&self) -> usize
    {
        self.n_leaf - 1
    }

    /// Number of rows, \\(3 (N - 1) + 1\\).
    pub fn n_row(&self) -> usize
    {
        3 * self.n_cone() + 1
    }

    /// Matrix \\(G\\) over \\([\delta; \lambda; u]\\).
    pub fn mat_g(&self) -> &MatBuild<L>
    {
        &self.mat_g
    }

    /// Vector \\(h\\).
    pub fn vec_h(&self) -> &MatBuild<L>
    {
        &self.vec_h
    }

    /// Consumes the tree into \\(G\\) and \\(h\\).
    pub fn into_parts(self) -> (MatBuild<L>, MatBuild<L>)
    {
        (self.mat_g, self.vec_h)
    }

    /// Tight values of the auxiliaries \\(u\\) for given leaves.
    ///
    /// Each \\(u_k\\) becomes the geometric mean of its children, so the root equals
    /// the geometric mean of all the leaves.
    /// * `leaves` are \\(R_i + \gamma \delta_i - \lambda_i\\), its length is \\(n\\).
    /// * `g0` is the padding value.
    pub fn tight_aux(&self, leaves: &[L::F], g0: L::F) -> Vec<L::F>
    {
        assert_eq!(leaves.len(), self.n);

        let n_node = self.n_cone();
        let mut val = vec![L::F::zero(); n_node + self.n_leaf];

        for i in 0.. self.n_leaf {
            val[n_node + i] = if i < self.n {leaves[i]} else {g0};
        }
        for k in (0.. n_node).rev() {
            val[k] = (val[2 * k + 1] * val[2 * k + 2]).sqrt();
        }

        val.truncate(n_node);
        val
    }
}

//

#[test]
fn test_geo_mean()
{
    use float_eq::assert_float_eq;

    assert_float_eq!(geo_mean(&[1., 1.]), 1., abs <= 1e-12);
    assert_float_eq!(geo_mean(&[2., 8.]), 4., abs <= 1e-12);
    assert_float_eq!(geo_mean(&[1., 3., 9.]), 3., abs <= 1e-12);
    assert_eq!(geo_mean(&[1., 0.]), 0.);
    assert!(geo_mean::<f64>(&[]).is_nan());
    assert!(geo_mean(&[1., -1.]).is_nan());
}

#[test]
fn test_geomean_tree_sizes()
{
    use totsu_core::FloatGeneric;

    type L = FloatGeneric<f64>;

    for (n, n_cone) in [(1, 0), (2, 1), (3, 3), (4, 3), (5, 7)] {
        let growth = vec![1.; n];
        let tree = GeoMeanTree::<L>::new(&growth, 1., 1.);

        assert_eq!(tree.n_cone(), n_cone);
        assert_eq!(tree.mat_g().size(), (3 * n_cone + 1, 2 * n + n_cone));
        assert_eq!(tree.vec_h().size(), (3 * n_cone + 1, 1));
    }
}

#[test]
fn test_geomean_tree_slack()
{
    use float_eq::assert_float_eq;
    use totsu_core::FloatGeneric;

    type L = FloatGeneric<f64>;

    let growth = [1., 2., 4.];
    let gamma = 0.5;
    let g0 = geo_mean(&growth);
    let n = growth.len();

    let tree = GeoMeanTree::<L>::new(&growth, gamma, g0);

    // delta raises asset 0, lam lowers asset 2
    let delta = [2., 0., 0.];
    let lam = [0., 0., 1.];
    let leaves: Vec<f64> = (0.. n).map(|i| growth[i] + gamma * delta[i] - lam[i]).collect();
    let u = tree.tight_aux(&leaves, g0);

    let mut x = Vec::new();
    x.extend_from_slice(&delta);
    x.extend_from_slice(&lam);
    x.extend_from_slice(&u);

    // s = h - G x
    let g = tree.mat_g();
    let h = tree.vec_h();
    let (nr, nc) = g.size();
    let s: Vec<f64> = (0.. nr).map(|r| {
        h[(r, 0)] - (0.. nc).map(|c| g[(r, c)] * x[c]).sum::<f64>()
    }).collect();

    for k in 0.. tree.n_cone() {
        let (a, b, w) = (s[3 * k], s[3 * k + 1], s[3 * k + 2]);
        assert!(a >= 0. && b >= 0.);
        assert_float_eq!(w * w, 2. * a * b, abs <= 1e-9);
    }

    // one padding leaf: u_0 = (prod(leaves) * g0)^(1/4)
    let root = s[nr - 1];
    assert_float_eq!(root, geo_mean(&leaves).powf(0.75) * g0.powf(0.25) - g0, abs <= 1e-9);
}
