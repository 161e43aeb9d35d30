use totsu_core::solver::SolverError;

//

/// Terminal status of a rebalance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status
{
    /// Optimal decision found.
    Optimal,
    /// No nonnegative trade keeps the geometric mean of the growth proxy.
    Infeasible,
    /// The objective has no finite maximum.
    Unbounded,
    /// The solver failed to converge or was fed an inconsistent problem.
    SolverError,
}

impl core::fmt::Display for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", match &self {
            Status::Optimal     => "Optimal",
            Status::Infeasible  => "Infeasible",
            Status::Unbounded   => "Unbounded",
            Status::SolverError => "SolverError",
        })
    }
}

//

/// Reasons to reject an input before invoking the solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputError
{
    /// No assets.
    Empty,
    /// A vector or matrix does not match the number of assets.
    DimMismatch {
        name: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },
    /// NaN or infinity.
    NonFinite {
        name: &'static str,
    },
    /// Risk aversion below zero.
    NegativeRiskAversion,
    /// Covariance differs from its transpose beyond tolerance.
    NonSymmetric {
        row: usize,
        col: usize,
    },
    /// Covariance has a negative eigenvalue beyond tolerance.
    NotPsd {
        min_eig: f64,
    },
    /// Growth proxy entry is zero or negative, outside the domain of the geometric mean.
    NonPositiveGrowth {
        index: usize,
    },
}

impl core::fmt::Display for InputError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self {
            InputError::Empty =>
                write!(f, "no assets"),
            InputError::DimMismatch {name, expected, actual} =>
                write!(f, "{} is {} x {}, expected {} x {}", name, actual.0, actual.1, expected.0, expected.1),
            InputError::NonFinite {name} =>
                write!(f, "{} contains a non-finite value", name),
            InputError::NegativeRiskAversion =>
                write!(f, "risk aversion is negative"),
            InputError::NonSymmetric {row, col} =>
                write!(f, "covariance is not symmetric at ({}, {})", row, col),
            InputError::NotPsd {min_eig} =>
                write!(f, "covariance is not positive semidefinite: min eigenvalue {:.3e}", min_eig),
            InputError::NonPositiveGrowth {index} =>
                write!(f, "growth proxy at {} is not strictly positive", index),
        }
    }
}

//

/// Rebalance errors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RebalanceError
{
    /// Rejected input, the solver has not been invoked.
    InvalidInput(InputError),
    /// Found an infeasibility certificate.
    Infeasible,
    /// Found an unboundedness certificate.
    Unbounded,
    /// Any other failure of the solver.
    SolverFailure(SolverError),
    /// The solver returned a decision out of the feasible set beyond tolerance.
    InvalidSolution,
}

impl RebalanceError
{
    /// Terminal status that the error stands for.
    ///
    /// Returns `None` for [`RebalanceError::InvalidInput`], which is detected before solving.
    pub fn status(&self) -> Option<Status>
    {
        match self {
            RebalanceError::InvalidInput(_) => None,
            RebalanceError::Infeasible => Some(Status::Infeasible),
            RebalanceError::Unbounded => Some(Status::Unbounded),
            RebalanceError::SolverFailure(_) => Some(Status::SolverError),
            RebalanceError::InvalidSolution => Some(Status::SolverError),
        }
    }
}

impl From<InputError> for RebalanceError
{
    fn from(e: InputError) -> Self
    {
        RebalanceError::InvalidInput(e)
    }
}

impl From<SolverError> for RebalanceError
{
    fn from(e: SolverError) -> Self
    {
        match e {
            SolverError::Infeasible => RebalanceError::Infeasible,
            SolverError::Unbounded => RebalanceError::Unbounded,
            _ => RebalanceError::SolverFailure(e),
        }
    }
}

impl core::fmt::Display for RebalanceError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self {
            RebalanceError::InvalidInput(e) =>
                write!(f, "InvalidInput: {}", e),
            RebalanceError::Infeasible =>
                write!(f, "Infeasible: no trade keeps the geometric mean of the growth proxy"),
            RebalanceError::Unbounded =>
                write!(f, "Unbounded: objective has no finite maximum, bound the trade size"),
            RebalanceError::SolverFailure(e) =>
                write!(f, "SolverError: {}", e),
            RebalanceError::InvalidSolution =>
                write!(f, "SolverError: returned decision is negative or decreases the geometric mean of the growth proxy"),
        }
    }
}

impl std::error::Error for RebalanceError {}

//

#[test]
fn test_error_from_solver()
{
    assert_eq!(RebalanceError::from(SolverError::Infeasible), RebalanceError::Infeasible);
    assert_eq!(RebalanceError::from(SolverError::Unbounded), RebalanceError::Unbounded);
    assert_eq!(RebalanceError::from(SolverError::ExcessIter), RebalanceError::SolverFailure(SolverError::ExcessIter));

    assert_eq!(RebalanceError::Infeasible.status(), Some(Status::Infeasible));
    assert_eq!(RebalanceError::Unbounded.status(), Some(Status::Unbounded));
    assert_eq!(RebalanceError::SolverFailure(SolverError::ConeFailure).status(), Some(Status::SolverError));
    assert_eq!(RebalanceError::InvalidSolution.status(), Some(Status::SolverError));
    assert_eq!(RebalanceError::InvalidInput(InputError::Empty).status(), None);
}

#[test]
fn test_error_display()
{
    let e = RebalanceError::from(InputError::NonPositiveGrowth {index: 3});
    assert_eq!(format!("{}", e), "InvalidInput: growth proxy at 3 is not strictly positive");

    let e = RebalanceError::from(SolverError::ExcessIter);
    assert!(format!("{}", e).starts_with("SolverError: "));
}
