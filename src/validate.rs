use core::cell::Cell;
use num_traits::{Float, Zero, One, ToPrimitive};
use totsu_core::solver::SliceLike;
use totsu_core::{LinAlgEx, MatType};
use totsu::MatBuild;
use crate::{InputError, RebalanceParam};

//

/// Inputs of a rebalance, borrowed from the caller.
pub struct RebalanceInput<'a, L: LinAlgEx>
{
    /// Expected return \\(\mu\\).
    pub mu: &'a [L::F],
    /// Covariance \\(\Sigma\\), either [`MatType::General`] or [`MatType::SymPack`].
    pub sigma: &'a MatBuild<L>,
    /// Risk aversion \\(\kappa\\).
    pub kappa: L::F,
    /// Growth coupling \\(\gamma\\).
    pub gamma: L::F,
    /// Current allocation \\(z_c\\).
    pub z_curr: &'a [L::F],
    /// Growth proxy \\(R\\).
    pub growth: &'a [L::F],
}

//

fn check_dim(name: &'static str, expected: (usize, usize), actual: (usize, usize)) -> Result<(), InputError>
{
    if expected == actual {
        Ok(())
    }
    else {
        Err(InputError::DimMismatch {name, expected, actual})
    }
}

fn check_finite<F: Float>(name: &'static str, v: &[F]) -> Result<(), InputError>
{
    if v.iter().all(|e| e.is_finite()) {
        Ok(())
    }
    else {
        Err(InputError::NonFinite {name})
    }
}

/// Covariance in symmetric packed form.
///
/// A [`MatType::General`] matrix is symmetrized by averaging with its transpose.
pub fn sym_pack<L: LinAlgEx>(sigma: &MatBuild<L>) -> MatBuild<L>
{
    if sigma.is_sympack() {
        return sigma.clone();
    }

    let (n, n_) = sigma.size();
    assert_eq!(n, n_);

    let f1 = L::F::one();
    let half = f1 / (f1 + f1);

    MatBuild::new(MatType::SymPack(n))
    .by_fn(|r, c| (sigma[(r, c)] + sigma[(c, r)]) * half)
}

/// Smallest eigenvalue and largest absolute eigenvalue of a symmetric packed matrix.
pub fn eig_range<L: LinAlgEx>(sym: &MatBuild<L>, eps_zero: L::F) -> (L::F, L::F)
{
    assert!(sym.is_sympack());

    let n = sym.size().0;
    let mut array = sym.as_ref().to_vec();
    let mut work_vec = vec![L::F::zero(); L::map_eig_worklen(n)];

    let min = Cell::new(L::F::infinity());
    let max_abs = Cell::new(L::F::zero());

    L::map_eig(&mut L::Sl::new_mut(&mut array), None, eps_zero, &mut L::Sl::new_mut(&mut work_vec), |e| {
        min.set(min.get().min(e));
        max_abs.set(max_abs.get().max(e.abs()));
        None
    });

    (min.get(), max_abs.get())
}

/// Validates inputs before building a model.
///
/// Returns `Ok` with the number of assets \\(n\\), or `Err` with the first violation found.
pub fn validate<L: LinAlgEx>(input: &RebalanceInput<L>, par: &RebalanceParam<L::F>) -> Result<usize, InputError>
{
    let n = input.mu.len();
    if n == 0 {
        return Err(InputError::Empty);
    }

    check_dim("sigma", (n, n), input.sigma.size())?;
    check_dim("z_curr", (n, 1), (input.z_curr.len(), 1))?;
    check_dim("growth", (n, 1), (input.growth.len(), 1))?;

    check_finite("mu", input.mu)?;
    check_finite("sigma", input.sigma.as_ref())?;
    check_finite("kappa", &[input.kappa])?;
    check_finite("gamma", &[input.gamma])?;
    check_finite("z_curr", input.z_curr)?;
    check_finite("growth", input.growth)?;

    if input.kappa < L::F::zero() {
        return Err(InputError::NegativeRiskAversion);
    }

    if let Some(index) = input.growth.iter().position(|&e| e <= L::F::zero()) {
        return Err(InputError::NonPositiveGrowth {index});
    }

    if !input.sigma.is_sympack() {
        let f1 = L::F::one();
        for c in 0.. n {
            for r in 0.. c {
                let (a, b) = (input.sigma[(r, c)], input.sigma[(c, r)]);
                let tol = par.sym_tol * f1.max(a.abs()).max(b.abs());
                if (a - b).abs() > tol {
                    return Err(InputError::NonSymmetric {row: r, col: c});
                }
            }
        }
    }

    let (min_eig, max_abs) = eig_range(&sym_pack(input.sigma), par.solver.eps_zero);
    if min_eig < -par.psd_tol * L::F::one().max(max_abs) {
        return Err(InputError::NotPsd {min_eig: min_eig.to_f64().unwrap_or(f64::NAN)});
    }

    Ok(n)
}

//
