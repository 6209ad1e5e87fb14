//! 決定木ベースのアンサンブル回帰
//!
//! 回帰木はノードのフラット配列で表現します（根はインデックス0、子は
//! 常に親より後ろ）。Gradient Boosting と Bagging はこの木を束ねた
//! もので、どちらも分割ゲインから特徴量重要度を計算できます。
//! アーティファクトは tar.gz バンドル内の `model.json` です。

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::InferenceError;
use crate::ml::regressor::{check_width, normalize_importances, FeatureImportances, PriceModel};
use crate::model::metadata::ModelMetadata;
use crate::model::storage;

/// 回帰木のノード
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        /// 学習時の分散減少量（重要度計算に使用）
        gain: f64,
    },
}

/// 単一の回帰木
///
/// `x[feature] <= threshold` なら左、そうでなければ右に降ります。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// 構造の検証
    ///
    /// 子インデックスが常に親より後ろであることを要求するので、
    /// 検証済みの木の探索は必ず停止します。
    pub fn validate(&self, num_features: usize) -> Result<()> {
        if self.nodes.is_empty() {
            bail!("empty tree");
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                if *feature >= num_features {
                    bail!("split feature {} out of range (node {})", feature, i);
                }
                if *left >= self.nodes.len() || *right >= self.nodes.len() {
                    bail!("child index out of range (node {})", i);
                }
                if *left <= i || *right <= i {
                    bail!("child index must follow parent (node {})", i);
                }
            }
        }
        Ok(())
    }

    /// 1行分の予測値（検証済みの木が前提）
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    index = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// 分割ゲインを特徴量ごとに積算
    fn accumulate_gains(&self, acc: &mut [f64]) {
        for node in &self.nodes {
            if let TreeNode::Split { feature, gain, .. } = node {
                acc[*feature] += gain.max(0.0);
            }
        }
    }
}

/// Gradient Boosting 回帰
///
/// 予測値 = base_score + learning_rate * Σ tree(x)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoosting {
    pub num_features: usize,
    pub base_score: f64,
    pub learning_rate: f64,
    pub trees: Vec<RegressionTree>,
}

impl GradientBoosting {
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let boosted: f64 = self.trees.iter().map(|tree| tree.predict_row(row)).sum();
        self.base_score + self.learning_rate * boosted
    }

    fn validate(&self) -> Result<()> {
        for tree in &self.trees {
            tree.validate(self.num_features)?;
        }
        Ok(())
    }

    /// tar.gz バンドルから読み込み
    pub fn load_bundle(path: &Path) -> Result<(ModelMetadata, Self)> {
        let (metadata, payload) = storage::load_json_payload(path)?;
        let model: Self = serde_json::from_str(&payload)
            .context("Failed to deserialize gradient boosting model")?;
        model.validate()?;
        Ok((metadata, model))
    }

    /// tar.gz バンドルへ保存
    pub fn save_bundle(&self, path: &Path, metadata: &ModelMetadata) -> Result<()> {
        let payload =
            serde_json::to_string_pretty(self).context("Failed to serialize gradient boosting")?;
        storage::save_json_bundle(path, metadata, &payload)
    }
}

impl PriceModel for GradientBoosting {
    fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, InferenceError> {
        check_width(rows, self.num_features)?;
        Ok(rows.iter().map(|row| self.predict_row(row)).collect())
    }

    fn importance_provider(&self) -> Option<&dyn FeatureImportances> {
        Some(self)
    }
}

impl FeatureImportances for GradientBoosting {
    fn feature_importances(&self) -> Vec<f64> {
        let mut acc = vec![0.0; self.num_features];
        for tree in &self.trees {
            tree.accumulate_gains(&mut acc);
        }
        normalize_importances(acc)
    }
}

/// Bagging 回帰（メンバー木の平均）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bagging {
    pub num_features: usize,
    pub trees: Vec<RegressionTree>,
}

impl Bagging {
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let total: f64 = self.trees.iter().map(|tree| tree.predict_row(row)).sum();
        total / self.trees.len() as f64
    }

    fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            bail!("bagging ensemble has no trees");
        }
        for tree in &self.trees {
            tree.validate(self.num_features)?;
        }
        Ok(())
    }

    /// tar.gz バンドルから読み込み
    pub fn load_bundle(path: &Path) -> Result<(ModelMetadata, Self)> {
        let (metadata, payload) = storage::load_json_payload(path)?;
        let model: Self =
            serde_json::from_str(&payload).context("Failed to deserialize bagging model")?;
        model.validate()?;
        Ok((metadata, model))
    }

    /// tar.gz バンドルへ保存
    pub fn save_bundle(&self, path: &Path, metadata: &ModelMetadata) -> Result<()> {
        let payload =
            serde_json::to_string_pretty(self).context("Failed to serialize bagging model")?;
        storage::save_json_bundle(path, metadata, &payload)
    }
}

impl PriceModel for Bagging {
    fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, InferenceError> {
        check_width(rows, self.num_features)?;
        Ok(rows.iter().map(|row| self.predict_row(row)).collect())
    }

    fn importance_provider(&self) -> Option<&dyn FeatureImportances> {
        Some(self)
    }
}

impl FeatureImportances for Bagging {
    fn feature_importances(&self) -> Vec<f64> {
        // 各木の正規化済みゲインを平均してから再正規化
        let mut acc = vec![0.0; self.num_features];
        for tree in &self.trees {
            let mut gains = vec![0.0; self.num_features];
            tree.accumulate_gains(&mut gains);
            for (a, g) in acc.iter_mut().zip(normalize_importances(gains)) {
                *a += g;
            }
        }
        normalize_importances(acc)
    }
}
