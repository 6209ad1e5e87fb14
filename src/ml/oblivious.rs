//! CatBoost系 oblivious tree アンサンブル
//!
//! 各木は深さ分の (特徴量, しきい値) を全レベルで共有する対称木で、
//! 葉値は `2^depth` 個のフラット配列になります。この平坦な構造は
//! テンソルの集まりとして safetensors ファイルにそのまま収まるため、
//! 専用バイナリ形式のアーティファクト（`models/catboost.safetensors`）
//! として扱います。
//!
//! テンソル構成:
//! - split_features  [tree_count * depth]  (I32)
//! - split_borders   [tree_count * depth]  (F32)
//! - leaf_values     [tree_count * 2^depth] (F32)
//! - scale_bias      [2] (F32)
//!
//! ヘッダメタデータ: num_features / depth / tree_count

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use safetensors::tensor::{serialize_to_file, Dtype, SafeTensors, TensorView};

use crate::error::InferenceError;
use crate::ml::regressor::{check_width, normalize_importances, FeatureImportances, PriceModel};

/// 学習済み oblivious tree アンサンブル
#[derive(Debug, Clone)]
pub struct ObliviousTreeEnsemble {
    pub num_features: usize,
    pub depth: usize,
    pub tree_count: usize,
    /// 木ごとのレベル別分割特徴量 [tree_count * depth]
    pub split_features: Vec<usize>,
    /// 木ごとのレベル別しきい値 [tree_count * depth]
    pub split_borders: Vec<f32>,
    /// 葉値 [tree_count * 2^depth]
    pub leaf_values: Vec<f32>,
    pub scale: f32,
    pub bias: f32,
}

impl ObliviousTreeEnsemble {
    fn leaves_per_tree(&self) -> usize {
        1 << self.depth
    }

    fn validate(&self) -> Result<()> {
        if self.tree_count == 0 || self.depth == 0 {
            bail!("ensemble must have at least one tree of depth >= 1");
        }
        if self.split_features.len() != self.tree_count * self.depth {
            bail!("split_features length mismatch");
        }
        if self.split_borders.len() != self.tree_count * self.depth {
            bail!("split_borders length mismatch");
        }
        if self.leaf_values.len() != self.tree_count * self.leaves_per_tree() {
            bail!("leaf_values length mismatch");
        }
        if let Some(f) = self
            .split_features
            .iter()
            .find(|f| **f >= self.num_features)
        {
            bail!("split feature {} out of range", f);
        }
        Ok(())
    }

    /// 1行分の予測値
    ///
    /// 各木で `x[f] > border` のビットを深さ方向に並べた葉インデックスを
    /// 引き、全木の葉値合計に scale/bias を適用します。
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let leaves = self.leaves_per_tree();
        let mut total = 0.0f64;
        for tree in 0..self.tree_count {
            let mut leaf_index = 0usize;
            for level in 0..self.depth {
                let position = tree * self.depth + level;
                let feature = self.split_features[position];
                let border = self.split_borders[position] as f64;
                if row[feature] > border {
                    leaf_index |= 1 << level;
                }
            }
            total += self.leaf_values[tree * leaves + leaf_index] as f64;
        }
        self.scale as f64 * total + self.bias as f64
    }

    /// safetensors ファイルから読み込み
    pub fn load_safetensors(path: &Path) -> Result<Self> {
        let buffer =
            std::fs::read(path).context(format!("Failed to read model file: {:?}", path))?;

        let (_, header) = SafeTensors::read_metadata(&buffer)
            .context("Failed to read safetensors header")?;
        let info = header
            .metadata()
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("safetensors metadata is missing"))?;

        let read_usize = |key: &str| -> Result<usize> {
            info.get(key)
                .ok_or_else(|| anyhow::anyhow!("metadata key {} is missing", key))?
                .parse()
                .context(format!("metadata key {} is not an integer", key))
        };
        let num_features = read_usize("num_features")?;
        let depth = read_usize("depth")?;
        let tree_count = read_usize("tree_count")?;

        let tensors =
            SafeTensors::deserialize(&buffer).context("Failed to deserialize safetensors")?;

        let split_features = read_i32_tensor(&tensors, "split_features")?
            .into_iter()
            .map(|v| v as usize)
            .collect();
        let split_borders = read_f32_tensor(&tensors, "split_borders")?;
        let leaf_values = read_f32_tensor(&tensors, "leaf_values")?;
        let scale_bias = read_f32_tensor(&tensors, "scale_bias")?;
        if scale_bias.len() != 2 {
            bail!("scale_bias must have exactly 2 elements");
        }

        let model = Self {
            num_features,
            depth,
            tree_count,
            split_features,
            split_borders,
            leaf_values,
            scale: scale_bias[0],
            bias: scale_bias[1],
        };
        model.validate()?;
        Ok(model)
    }

    /// safetensors ファイルへ保存
    pub fn save_safetensors(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create parent directory: {:?}", parent))?;
        }

        let features_i32: Vec<i32> = self.split_features.iter().map(|f| *f as i32).collect();
        let features_bytes: Vec<u8> = bytemuck::cast_slice(&features_i32).to_vec();
        let borders_bytes: Vec<u8> = bytemuck::cast_slice(&self.split_borders).to_vec();
        let leaves_bytes: Vec<u8> = bytemuck::cast_slice(&self.leaf_values).to_vec();
        let scale_bias = [self.scale, self.bias];
        let scale_bias_bytes: Vec<u8> = bytemuck::cast_slice(&scale_bias).to_vec();

        let views = vec![
            (
                "split_features".to_string(),
                TensorView::new(Dtype::I32, vec![features_i32.len()], &features_bytes)
                    .context("Failed to build split_features tensor")?,
            ),
            (
                "split_borders".to_string(),
                TensorView::new(Dtype::F32, vec![self.split_borders.len()], &borders_bytes)
                    .context("Failed to build split_borders tensor")?,
            ),
            (
                "leaf_values".to_string(),
                TensorView::new(Dtype::F32, vec![self.leaf_values.len()], &leaves_bytes)
                    .context("Failed to build leaf_values tensor")?,
            ),
            (
                "scale_bias".to_string(),
                TensorView::new(Dtype::F32, vec![2], &scale_bias_bytes)
                    .context("Failed to build scale_bias tensor")?,
            ),
        ];

        let mut info = HashMap::new();
        info.insert("num_features".to_string(), self.num_features.to_string());
        info.insert("depth".to_string(), self.depth.to_string());
        info.insert("tree_count".to_string(), self.tree_count.to_string());

        serialize_to_file(views, &Some(info), path)
            .context(format!("Failed to write safetensors file: {:?}", path))
    }
}

fn read_f32_tensor(tensors: &SafeTensors, name: &str) -> Result<Vec<f32>> {
    let view = tensors
        .tensor(name)
        .context(format!("tensor {} is missing", name))?;
    if view.dtype() != Dtype::F32 {
        bail!("tensor {} must be F32", name);
    }
    Ok(view
        .data()
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn read_i32_tensor(tensors: &SafeTensors, name: &str) -> Result<Vec<i32>> {
    let view = tensors
        .tensor(name)
        .context(format!("tensor {} is missing", name))?;
    if view.dtype() != Dtype::I32 {
        bail!("tensor {} must be I32", name);
    }
    Ok(view
        .data()
        .chunks_exact(4)
        .map(|chunk| i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

impl PriceModel for ObliviousTreeEnsemble {
    fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, InferenceError> {
        check_width(rows, self.num_features)?;
        Ok(rows.iter().map(|row| self.predict_row(row)).collect())
    }

    fn importance_provider(&self) -> Option<&dyn FeatureImportances> {
        Some(self)
    }
}

impl FeatureImportances for ObliviousTreeEnsemble {
    fn feature_importances(&self) -> Vec<f64> {
        // 木ごとの葉値の振れ幅を重みにして、使用特徴量に配る
        let leaves = self.leaves_per_tree();
        let mut acc = vec![0.0; self.num_features];
        for tree in 0..self.tree_count {
            let tree_leaves = &self.leaf_values[tree * leaves..(tree + 1) * leaves];
            let max = tree_leaves.iter().cloned().fold(f32::MIN, f32::max);
            let min = tree_leaves.iter().cloned().fold(f32::MAX, f32::min);
            let spread = (max - min).abs() as f64;
            for level in 0..self.depth {
                acc[self.split_features[tree * self.depth + level]] += spread;
            }
        }
        normalize_importances(acc)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 深さ2・1本の小さなアンサンブル
    ///
    /// レベル0: x[0] > 10、レベル1: x[1] > 5
    pub(crate) fn sample_ensemble() -> ObliviousTreeEnsemble {
        ObliviousTreeEnsemble {
            num_features: 2,
            depth: 2,
            tree_count: 1,
            split_features: vec![0, 1],
            split_borders: vec![10.0, 5.0],
            // 葉順: [00, 01, 10, 11] = [両方以下, x0超過, x1超過, 両方超過]
            leaf_values: vec![1.0, 2.0, 3.0, 4.0],
            scale: 1.0,
            bias: 0.0,
        }
    }

    #[test]
    fn test_leaf_indexing() {
        let model = sample_ensemble();
        assert_eq!(model.predict_row(&[0.0, 0.0]), 1.0); // 00
        assert_eq!(model.predict_row(&[20.0, 0.0]), 2.0); // 01
        assert_eq!(model.predict_row(&[0.0, 9.0]), 3.0); // 10
        assert_eq!(model.predict_row(&[20.0, 9.0]), 4.0); // 11
    }

    #[test]
    fn test_scale_and_bias() {
        let mut model = sample_ensemble();
        model.scale = 2.0;
        model.bias = 100.0;
        assert_eq!(model.predict_row(&[0.0, 0.0]), 102.0);
    }

    #[test]
    fn test_validate_rejects_bad_feature() {
        let mut model = sample_ensemble();
        model.split_features[0] = 7;
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_importances_cover_used_features() {
        let model = sample_ensemble();
        let importances = model.feature_importances();
        assert_eq!(importances.len(), 2);
        assert!(importances[0] > 0.0);
        assert!(importances[1] > 0.0);
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_safetensors_roundtrip() {
        let dir = std::env::temp_dir().join("hpd_oblivious_test");
        let path = dir.join("catboost.safetensors");
        let model = sample_ensemble();
        model.save_safetensors(&path).unwrap();

        let loaded = ObliviousTreeEnsemble::load_safetensors(&path).unwrap();
        assert_eq!(loaded.num_features, 2);
        assert_eq!(loaded.depth, 2);
        assert_eq!(loaded.tree_count, 1);
        for row in [[0.0, 0.0], [20.0, 0.0], [0.0, 9.0], [20.0, 9.0]] {
            assert_eq!(loaded.predict_row(&row), model.predict_row(&row));
        }

        std::fs::remove_dir_all(&dir).ok();
    }
}
