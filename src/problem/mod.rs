mod geomean;
mod rebalance;

pub use geomean::*;
pub use rebalance::*;
