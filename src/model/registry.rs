//! モデルレジストリ
//!
//! 6種類の学習済みモデルをページ初期化時に一括で読み込み、表示名で
//! 引けるようにします。1つでも読めなければレジストリ全体が失敗し、
//! 予測フローには進めません（部分的なレジストリは作らない）。
//! 読み込みはプロセス生存期間で1回だけで、`invalidate` が唯一の
//! 再読み込み経路です。

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::ml::{
    Bagging, GradientBoosting, LinearRegression, MlpHandle, ObliviousTreeEnsemble, PriceModel,
    Stacking,
};
use crate::schema::NUM_FEATURES;

/// 対応アルゴリズム
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    LinearRegression,
    GradientBoosting,
    Bagging,
    Stacking,
    CatBoost,
    NeuralNetwork,
}

impl ModelKind {
    /// 読み込み順（UIの選択肢順もこれに合わせる）
    pub const ALL: [ModelKind; 6] = [
        ModelKind::LinearRegression,
        ModelKind::GradientBoosting,
        ModelKind::Bagging,
        ModelKind::Stacking,
        ModelKind::CatBoost,
        ModelKind::NeuralNetwork,
    ];

    /// レジストリのキーになる表示名
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::LinearRegression => "Linear Regression",
            ModelKind::GradientBoosting => "Gradient Boosting",
            ModelKind::Bagging => "Bagging",
            ModelKind::Stacking => "Stacking",
            ModelKind::CatBoost => "CatBoost",
            ModelKind::NeuralNetwork => "Neural Network",
        }
    }

    /// `models/` ディレクトリ内のアーティファクトファイル名
    pub fn artifact_file(&self) -> &'static str {
        match self {
            ModelKind::LinearRegression => "linear_regression.json",
            ModelKind::GradientBoosting => "gradient_boosting.tar.gz",
            ModelKind::Bagging => "bagging.tar.gz",
            ModelKind::Stacking => "stacking.json",
            ModelKind::CatBoost => "catboost.safetensors",
            ModelKind::NeuralNetwork => "mlp.tar.gz",
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// 読み込み済みモデル1件
pub struct LoadedModel {
    pub kind: ModelKind,
    pub trained_at: Option<String>,
    pub model: Box<dyn PriceModel>,
}

/// フロントエンド向けのモデル情報
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub artifact: String,
    pub supports_importances: bool,
    pub trained_at: Option<String>,
}

/// モデルレジストリ本体
///
/// `initialize` 済みなら `models` が `Some` になります。
#[derive(Default)]
pub struct ModelRegistry {
    models: Option<HashMap<String, LoadedModel>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 全モデルを読み込んで初期化
    ///
    /// すでに初期化済みなら何もせず現在のモデル情報を返します
    /// （load-once セマンティクス）。
    pub fn initialize(&mut self, models_dir: &Path) -> Result<Vec<ModelInfo>, RegistryError> {
        if self.models.is_some() {
            println!("[registry] 既に初期化済みのため再読み込みしません");
            return Ok(self.infos());
        }

        let mut models = HashMap::new();
        for kind in ModelKind::ALL {
            let loaded = load_one(kind, models_dir).map_err(|e| RegistryError::Load {
                name: kind.display_name().to_string(),
                source: e,
            })?;
            models.insert(kind.display_name().to_string(), loaded);
        }

        println!("[registry] {}モデルの読み込みが完了しました", models.len());
        self.models = Some(models);
        Ok(self.infos())
    }

    pub fn is_ready(&self) -> bool {
        self.models.is_some()
    }

    /// 表示名でモデルを引く
    ///
    /// 未初期化・未知の名前はどちらも `None` です。
    pub fn get(&self, name: &str) -> Option<&LoadedModel> {
        self.models.as_ref()?.get(name)
    }

    /// 明示的な無効化フック（次回 `initialize` で再読み込み）
    pub fn invalidate(&mut self) {
        if self.models.take().is_some() {
            println!("[registry] レジストリを無効化しました");
        }
    }

    /// 読み込み済みモデルの情報一覧（読み込み順）
    pub fn infos(&self) -> Vec<ModelInfo> {
        let Some(models) = self.models.as_ref() else {
            return Vec::new();
        };
        ModelKind::ALL
            .iter()
            .filter_map(|kind| models.get(kind.display_name()))
            .map(|loaded| ModelInfo {
                name: loaded.kind.display_name().to_string(),
                artifact: loaded.kind.artifact_file().to_string(),
                supports_importances: loaded.model.importance_provider().is_some(),
                trained_at: loaded.trained_at.clone(),
            })
            .collect()
    }
}

fn load_one(kind: ModelKind, models_dir: &Path) -> Result<LoadedModel> {
    let path = models_dir.join(kind.artifact_file());

    let (model, trained_at): (Box<dyn PriceModel>, Option<String>) = match kind {
        ModelKind::LinearRegression => {
            let model = LinearRegression::load_json(&path)?;
            if model.coefficients.len() != NUM_FEATURES {
                bail!(
                    "coefficient count {} does not match schema width {}",
                    model.coefficients.len(),
                    NUM_FEATURES
                );
            }
            (Box::new(model), None)
        }
        ModelKind::GradientBoosting => {
            let (metadata, model) = GradientBoosting::load_bundle(&path)?;
            check_features(model.num_features)?;
            (Box::new(model), Some(metadata.trained_at))
        }
        ModelKind::Bagging => {
            let (metadata, model) = Bagging::load_bundle(&path)?;
            check_features(model.num_features)?;
            (Box::new(model), Some(metadata.trained_at))
        }
        ModelKind::Stacking => {
            let model = Stacking::load_json(&path)?;
            check_features(model.num_features)?;
            (Box::new(model), None)
        }
        ModelKind::CatBoost => {
            let model = ObliviousTreeEnsemble::load_safetensors(&path)?;
            check_features(model.num_features)?;
            (Box::new(model), None)
        }
        ModelKind::NeuralNetwork => {
            let handle = MlpHandle::load(&path)?;
            let trained_at = handle.metadata().trained_at.clone();
            (Box::new(handle), Some(trained_at))
        }
    };

    Ok(LoadedModel {
        kind,
        trained_at,
        model,
    })
}

fn check_features(actual: usize) -> Result<()> {
    if actual != NUM_FEATURES {
        bail!(
            "model feature count {} does not match schema width {}",
            actual,
            NUM_FEATURES
        );
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ml::mlp::{CpuBackend, MlpConfig};
    use crate::ml::stacking::BaseLearner;
    use crate::ml::tree::{RegressionTree, TreeNode};
    use crate::model::metadata::ModelMetadata;

    fn wide_stump(feature: usize, threshold: f64, low: f64, high: f64) -> RegressionTree {
        RegressionTree {
            nodes: vec![
                TreeNode::Split {
                    feature,
                    threshold,
                    left: 1,
                    right: 2,
                    gain: 1.0,
                },
                TreeNode::Leaf { value: low },
                TreeNode::Leaf { value: high },
            ],
        }
    }

    /// 6モデル分の最小アーティファクトを書き出すテストヘルパー
    pub(crate) fn write_test_artifacts(dir: &Path) {
        LinearRegression::new(vec![1.0; NUM_FEATURES], 1000.0)
            .save_json(&dir.join("linear_regression.json"))
            .unwrap();

        GradientBoosting {
            num_features: NUM_FEATURES,
            base_score: 400_000.0,
            learning_rate: 0.5,
            trees: vec![wide_stump(2, 2000.0, -50_000.0, 80_000.0)],
        }
        .save_bundle(
            &dir.join("gradient_boosting.tar.gz"),
            &ModelMetadata::new("Gradient Boosting"),
        )
        .unwrap();

        Bagging {
            num_features: NUM_FEATURES,
            trees: vec![
                wide_stump(2, 2000.0, 300_000.0, 500_000.0),
                wide_stump(6, 8.0, 350_000.0, 550_000.0),
            ],
        }
        .save_bundle(&dir.join("bagging.tar.gz"), &ModelMetadata::new("Bagging"))
        .unwrap();

        Stacking {
            num_features: NUM_FEATURES,
            base_learners: vec![
                BaseLearner::Linear(LinearRegression::new(vec![100.0; NUM_FEATURES], 0.0)),
                BaseLearner::Tree(wide_stump(0, 3.0, 300_000.0, 450_000.0)),
            ],
            meta: LinearRegression::new(vec![0.5, 0.5], 10_000.0),
        }
        .save_json(&dir.join("stacking.json"))
        .unwrap();

        crate::ml::ObliviousTreeEnsemble {
            num_features: NUM_FEATURES,
            depth: 2,
            tree_count: 1,
            split_features: vec![2, 6],
            split_borders: vec![2000.0, 8.0],
            leaf_values: vec![350_000.0, 420_000.0, 450_000.0, 550_000.0],
            scale: 1.0,
            bias: 0.0,
        }
        .save_safetensors(&dir.join("catboost.safetensors"))
        .unwrap();

        let device = burn::backend::ndarray::NdArrayDevice::default();
        let mlp = MlpConfig::new(NUM_FEATURES).init::<CpuBackend>(&device);
        MlpHandle::save_bundle(
            &mlp,
            &ModelMetadata::new("Neural Network")
                .with_scaler(vec![1000.0; NUM_FEATURES], vec![800.0; NUM_FEATURES]),
            &dir.join("mlp.tar.gz"),
        )
        .unwrap();
    }

    #[test]
    fn test_initialize_loads_all_six() {
        let dir = std::env::temp_dir().join("hpd_registry_full_test");
        std::fs::create_dir_all(&dir).unwrap();
        write_test_artifacts(&dir);

        let mut registry = ModelRegistry::new();
        assert!(!registry.is_ready());

        let infos = registry.initialize(&dir).unwrap();
        assert!(registry.is_ready());
        assert_eq!(infos.len(), 6);
        assert_eq!(infos[0].name, "Linear Regression");

        // 能力の割り当て: 木ベースの3つだけが重要度を持つ
        for info in &infos {
            let expected = matches!(
                info.name.as_str(),
                "Gradient Boosting" | "Bagging" | "CatBoost"
            );
            assert_eq!(info.supports_importances, expected, "{}", info.name);
        }

        assert!(registry.get("CatBoost").is_some());
        assert!(registry.get("存在しないモデル").is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_artifact_fails_whole_load() {
        let dir = std::env::temp_dir().join("hpd_registry_missing_test");
        std::fs::create_dir_all(&dir).unwrap();
        write_test_artifacts(&dir);
        std::fs::remove_file(dir.join("catboost.safetensors")).unwrap();

        let mut registry = ModelRegistry::new();
        let err = registry.initialize(&dir).unwrap_err();
        assert!(err.to_string().contains("CatBoost"));

        // 部分的なレジストリは作られず、予測フローには進めない
        assert!(!registry.is_ready());
        assert!(registry.get("Linear Regression").is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_initialize_is_load_once() {
        let dir = std::env::temp_dir().join("hpd_registry_once_test");
        std::fs::create_dir_all(&dir).unwrap();
        write_test_artifacts(&dir);

        let mut registry = ModelRegistry::new();
        registry.initialize(&dir).unwrap();

        // アーティファクトを消しても初期化済みレジストリはそのまま
        std::fs::remove_dir_all(&dir).ok();
        let infos = registry.initialize(&dir).unwrap();
        assert_eq!(infos.len(), 6);
        assert!(registry.is_ready());
    }

    #[test]
    fn test_invalidate_forces_reload() {
        let dir = std::env::temp_dir().join("hpd_registry_invalidate_test");
        std::fs::create_dir_all(&dir).unwrap();
        write_test_artifacts(&dir);

        let mut registry = ModelRegistry::new();
        registry.initialize(&dir).unwrap();
        registry.invalidate();
        assert!(!registry.is_ready());

        registry.initialize(&dir).unwrap();
        assert!(registry.is_ready());

        std::fs::remove_dir_all(&dir).ok();
    }
}
