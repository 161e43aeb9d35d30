use num_traits::{Float, Num};
use totsu_core::solver::SolverParam;

//

/// Rebalance parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceParam<F: Float>
{
    /// Parameters forwarded to the conic solver.
    pub solver: SolverParam<F>,
    /// Relative tolerance of asymmetry between \\(\Sigma_{ij}\\) and \\(\Sigma_{ji}\\).
    pub sym_tol: F,
    /// Relative tolerance of a negative eigenvalue of \\(\Sigma\\).
    pub psd_tol: F,
    /// Negative solver noise on the decision vectors below this magnitude is clipped silently.
    pub eps_clip: F,
}

impl<F: Float> Default for RebalanceParam<F>
{
    fn default() -> Self
    {
        let ten = F::from(10).unwrap();

        let mut solver = SolverParam::default();
        solver.max_iter = Some(1_000_000);

        RebalanceParam {
            solver,
            sym_tol: ten.powi(-9),
            psd_tol: ten.powi(-9),
            eps_clip: ten.powi(-4),
        }
    }
}

//

fn num_by_env<N: Num + core::fmt::Display>(key: &str) -> Option<N>
{
    let s = std::env::var(key).ok()?;

    match N::from_str_radix(s.trim(), 10) {
        Ok(v) => {
            log::info!("{} = {} by environment", key, v);
            Some(v)
        },
        Err(_) => {
            log::warn!("{} = {:?} ignored", key, s);
            None
        },
    }
}

/// Overrides parameters by environment variables.
///
/// `MAX_ITER`, `EPS_ACC`, `EPS_INF`, `EPS_ZERO` and `LOG_PERIOD` go to [`RebalanceParam::solver`],
/// `SYM_TOL`, `PSD_TOL` and `EPS_CLIP` to the rest.
/// Unset or unparsable variables leave the parameter as it is.
pub fn set_par_by_env<F: Float + core::fmt::Display>(p: &mut RebalanceParam<F>)
{
    p.solver.max_iter = num_by_env("MAX_ITER").or(p.solver.max_iter);
    p.solver.eps_acc = num_by_env("EPS_ACC").unwrap_or(p.solver.eps_acc);
    p.solver.eps_inf = num_by_env("EPS_INF").unwrap_or(p.solver.eps_inf);
    p.solver.eps_zero = num_by_env("EPS_ZERO").unwrap_or(p.solver.eps_zero);
    p.solver.log_period = num_by_env("LOG_PERIOD").unwrap_or(p.solver.log_period);
    p.sym_tol = num_by_env("SYM_TOL").unwrap_or(p.sym_tol);
    p.psd_tol = num_by_env("PSD_TOL").unwrap_or(p.psd_tol);
    p.eps_clip = num_by_env("EPS_CLIP").unwrap_or(p.eps_clip);
}

//

#[test]
fn test_param_default()
{
    let p = RebalanceParam::<f64>::default();

    assert_eq!(p.solver.max_iter, Some(1_000_000));
    assert!(p.sym_tol > 0.);
    assert!(p.psd_tol > 0.);
    assert!(p.eps_clip > p.solver.eps_acc);
}

#[test]
fn test_num_by_env()
{
    std::env::set_var("TOTSU_REBALANCE_TEST_NUM", "42");
    let v: Option<usize> = num_by_env("TOTSU_REBALANCE_TEST_NUM");
    assert_eq!(v, Some(42));

    std::env::set_var("TOTSU_REBALANCE_TEST_NUM", "forty-two");
    let v: Option<usize> = num_by_env("TOTSU_REBALANCE_TEST_NUM");
    assert_eq!(v, None);

    std::env::remove_var("TOTSU_REBALANCE_TEST_NUM");
}

#[test]
fn test_set_par_by_env()
{
    std::env::set_var("SYM_TOL", "1e-6");
    std::env::set_var("EPS_CLIP", "0.01");
    std::env::set_var("MAX_ITER", "500");
    std::env::set_var("PSD_TOL", "tight");

    let mut p = RebalanceParam::<f64>::default();
    set_par_by_env(&mut p);

    std::env::remove_var("SYM_TOL");
    std::env::remove_var("EPS_CLIP");
    std::env::remove_var("MAX_ITER");
    std::env::remove_var("PSD_TOL");

    let d = RebalanceParam::<f64>::default();
    assert_eq!(p.sym_tol, 1e-6);
    assert_eq!(p.eps_clip, 0.01);
    assert_eq!(p.solver.max_iter, Some(500));
    assert_eq!(p.psd_tol, d.psd_tol);
    assert_eq!(p.solver.eps_acc, d.solver.eps_acc);
}
