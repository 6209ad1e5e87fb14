//! 線形回帰モデル
//!
//! 係数と切片をそのままJSONファイルに保存する最も単純なアーティファクト
//! 形式です（`models/linear_regression.json`）。Stackingのメタ学習器
//! としても使います。

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::InferenceError;
use crate::ml::regressor::{check_width, PriceModel};

/// 学習済み線形回帰
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    /// 特徴量ごとの係数（正規順序）
    pub coefficients: Vec<f64>,
    /// 切片
    pub intercept: f64,
}

impl LinearRegression {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
        }
    }

    /// 1行分の予測値 (w・x + b)
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let dot: f64 = self
            .coefficients
            .iter()
            .zip(row.iter())
            .map(|(w, x)| w * x)
            .sum();
        dot + self.intercept
    }

    /// JSONファイルから読み込み
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read model file: {:?}", path))?;
        serde_json::from_str(&content).context("Failed to deserialize linear regression model")
    }

    /// JSONファイルへ保存
    pub fn save_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create parent directory: {:?}", parent))?;
        }
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize linear regression")?;
        std::fs::write(path, content).context(format!("Failed to write model file: {:?}", path))
    }
}

impl PriceModel for LinearRegression {
    fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, InferenceError> {
        check_width(rows, self.coefficients.len())?;
        Ok(rows.iter().map(|row| self.predict_row(row)).collect())
    }
}
