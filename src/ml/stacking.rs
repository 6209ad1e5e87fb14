//! Stacking 回帰
//!
//! 複数のベース学習器の予測値を線形メタ学習器で合成します。
//! アーティファクトはモデル全体をそのままJSONに落とした
//! `models/stacking.json` です。

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::InferenceError;
use crate::ml::linear::LinearRegression;
use crate::ml::regressor::{check_width, PriceModel};
use crate::ml::tree::RegressionTree;

/// ベース学習器
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BaseLearner {
    Linear(LinearRegression),
    Tree(RegressionTree),
}

impl BaseLearner {
    fn predict_row(&self, row: &[f64]) -> f64 {
        match self {
            BaseLearner::Linear(model) => model.predict_row(row),
            BaseLearner::Tree(tree) => tree.predict_row(row),
        }
    }
}

/// 学習済み Stacking 回帰
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stacking {
    pub num_features: usize,
    pub base_learners: Vec<BaseLearner>,
    /// ベース予測値を合成するメタ学習器
    pub meta: LinearRegression,
}

impl Stacking {
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let base_predictions: Vec<f64> = self
            .base_learners
            .iter()
            .map(|learner| learner.predict_row(row))
            .collect();
        self.meta.predict_row(&base_predictions)
    }

    fn validate(&self) -> Result<()> {
        if self.base_learners.is_empty() {
            bail!("stacking model has no base learners");
        }
        if self.meta.coefficients.len() != self.base_learners.len() {
            bail!(
                "meta learner width {} does not match base learner count {}",
                self.meta.coefficients.len(),
                self.base_learners.len()
            );
        }
        for learner in &self.base_learners {
            match learner {
                BaseLearner::Linear(model) => {
                    if model.coefficients.len() != self.num_features {
                        bail!("base linear learner width mismatch");
                    }
                }
                BaseLearner::Tree(tree) => tree.validate(self.num_features)?,
            }
        }
        Ok(())
    }

    /// JSONファイルから読み込み
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read model file: {:?}", path))?;
        let model: Self =
            serde_json::from_str(&content).context("Failed to deserialize stacking model")?;
        model.validate()?;
        Ok(model)
    }

    /// JSONファイルへ保存
    pub fn save_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create parent directory: {:?}", parent))?;
        }
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize stacking model")?;
        std::fs::write(path, content).context(format!("Failed to write model file: {:?}", path))
    }
}

impl PriceModel for Stacking {
    fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, InferenceError> {
        check_width(rows, self.num_features)?;
        Ok(rows.iter().map(|row| self.predict_row(row)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::tree::tests::stump;

    fn sample_model() -> Stacking {
        Stacking {
            num_features: 2,
            base_learners: vec![
                BaseLearner::Linear(LinearRegression::new(vec![1.0, 0.0], 0.0)),
                BaseLearner::Tree(stump(1, 5.0, 10.0, 20.0)),
            ],
            // 0.5 * base0 + 2.0 * base1 + 3.0
            meta: LinearRegression::new(vec![0.5, 2.0], 3.0),
        }
    }

    #[test]
    fn test_stacking_math() {
        let model = sample_model();
        // base0 = 4.0, base1 = 10.0 -> 0.5*4 + 2*10 + 3 = 25
        assert_eq!(model.predict_row(&[4.0, 5.0]), 25.0);
        // base0 = 4.0, base1 = 20.0 -> 0.5*4 + 2*20 + 3 = 45
        assert_eq!(model.predict_row(&[4.0, 6.0]), 45.0);
    }

    #[test]
    fn test_no_importance_capability() {
        let model = sample_model();
        assert!(model.importance_provider().is_none());
    }

    #[test]
    fn test_validate_meta_width() {
        let mut model = sample_model();
        model.meta = LinearRegression::new(vec![1.0], 0.0);
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let dir = std::env::temp_dir().join("hpd_stacking_test");
        let path = dir.join("stacking.json");
        let model = sample_model();
        model.save_json(&path).unwrap();

        let loaded = Stacking::load_json(&path).unwrap();
        assert_eq!(
            loaded.predict_row(&[4.0, 5.0]),
            model.predict_row(&[4.0, 5.0])
        );

        std::fs::remove_dir_all(&dir).ok();
    }
}
