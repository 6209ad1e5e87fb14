pub mod linear;
pub mod mlp;
pub mod oblivious;
pub mod regressor;
pub mod stacking;
pub mod tree;

pub use linear::LinearRegression;
pub use mlp::{CpuBackend, MlpConfig, MlpHandle, MlpRegressor};
pub use oblivious::ObliviousTreeEnsemble;
pub use regressor::{FeatureImportances, PriceModel};
pub use stacking::{BaseLearner, Stacking};
pub use tree::{Bagging, GradientBoosting, RegressionTree, TreeNode};
