//! ニューラルネットワーク回帰（MLP）
//!
//! 16 -> 64 -> 32 -> 1 の全結合ネットワークです。重みは tar.gz バンドル
//! （`models/mlp.tar.gz`）内の `model.bin` に Burn のレコーダ形式で
//! 保存されます。入力はバンドルメタデータの平均・標準偏差で標準化
//! してから順伝播します。

use std::path::Path;

use anyhow::{bail, Result};
use burn::backend::ndarray::NdArrayDevice;
use burn::backend::NdArray;
use burn::{
    config::Config,
    module::Module,
    nn::{Linear, LinearConfig, Relu},
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::{backend::Backend, Tensor},
};

use crate::error::InferenceError;
use crate::ml::regressor::{check_width, PriceModel};
use crate::model::metadata::ModelMetadata;
use crate::model::storage;

/// 推論用のCPUバックエンド
pub type CpuBackend = NdArray<f32>;

/// MLP設定
#[derive(Config, Debug)]
pub struct MlpConfig {
    /// 入力特徴量数
    pub num_features: usize,
    /// 隠れ層1のユニット数
    #[config(default = 64)]
    pub hidden1: usize,
    /// 隠れ層2のユニット数
    #[config(default = 32)]
    pub hidden2: usize,
}

impl MlpConfig {
    /// モデルを初期化
    pub fn init<B: Backend>(&self, device: &B::Device) -> MlpRegressor<B> {
        MlpRegressor {
            fc1: LinearConfig::new(self.num_features, self.hidden1).init(device),
            fc2: LinearConfig::new(self.hidden1, self.hidden2).init(device),
            fc3: LinearConfig::new(self.hidden2, 1).init(device),
            activation: Relu::new(),
        }
    }
}

/// 価格回帰用MLP
#[derive(Module, Debug)]
pub struct MlpRegressor<B: Backend> {
    fc1: Linear<B>, // num_features -> hidden1
    fc2: Linear<B>, // hidden1 -> hidden2
    fc3: Linear<B>, // hidden2 -> 1
    activation: Relu,
}

impl<B: Backend> MlpRegressor<B> {
    /// 順伝播
    ///
    /// # 引数
    /// - `features`: 標準化済み特徴量 [batch_size, num_features]
    ///
    /// # 戻り値
    /// - 予測価格 [batch_size, 1]
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.fc1.forward(features);
        let x = self.activation.forward(x);
        let x = self.fc2.forward(x);
        let x = self.activation.forward(x);
        self.fc3.forward(x)
    }
}

/// 読み込み済みMLPと標準化統計をまとめた推論ハンドル
pub struct MlpHandle {
    model: MlpRegressor<CpuBackend>,
    device: NdArrayDevice,
    metadata: ModelMetadata,
    means: Vec<f64>,
    stds: Vec<f64>,
    num_features: usize,
}

impl MlpHandle {
    /// tar.gz バンドルから読み込み
    pub fn load(path: &Path) -> Result<Self> {
        let (metadata, model_binary) = storage::load_model_binary(path)?;
        let num_features = metadata.feature_names.len();

        let means = metadata
            .feature_means
            .clone()
            .unwrap_or_else(|| vec![0.0; num_features]);
        let stds = metadata
            .feature_stds
            .clone()
            .unwrap_or_else(|| vec![1.0; num_features]);
        if means.len() != num_features || stds.len() != num_features {
            bail!("scaler statistics do not match feature count");
        }
        if stds.iter().any(|s| *s <= 0.0) {
            bail!("scaler standard deviation must be positive");
        }

        let device = NdArrayDevice::default();
        let model = MlpConfig::new(num_features).init::<CpuBackend>(&device);

        // モデルの重みを復元
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let record = recorder
            .load(model_binary, &device)
            .map_err(|e| anyhow::anyhow!("モデル重みの読み込みエラー: {:?}", e))?;
        let model = model.load_record(record);

        Ok(Self {
            model,
            device,
            metadata,
            means,
            stds,
            num_features,
        })
    }

    /// バンドルメタデータへの参照
    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// モデルをレコーダ形式に落としてtar.gzバンドルへ保存
    pub fn save_bundle(
        model: &MlpRegressor<CpuBackend>,
        metadata: &ModelMetadata,
        path: &Path,
    ) -> Result<()> {
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let bytes = recorder
            .record(model.clone().into_record(), ())
            .map_err(|e| anyhow::anyhow!("モデル重みの書き出しエラー: {:?}", e))?;
        storage::save_binary_bundle(path, metadata, &bytes)
    }

    fn forward_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, InferenceError> {
        // 標準化して1次元に並べ、[n, num_features] に整形する
        let mut flat = Vec::with_capacity(rows.len() * self.num_features);
        for row in rows {
            for (i, value) in row.iter().enumerate() {
                flat.push(((value - self.means[i]) / self.stds[i]) as f32);
            }
        }

        let tensor = Tensor::<CpuBackend, 1>::from_floats(flat.as_slice(), &self.device)
            .reshape([rows.len(), self.num_features]);

        let output = self.model.forward(tensor);
        let values = output
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| InferenceError::Backend(format!("推論結果の取得エラー: {:?}", e)))?;

        Ok(values.into_iter().map(|v| v as f64).collect())
    }
}

impl PriceModel for MlpHandle {
    fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, InferenceError> {
        check_width(rows, self.num_features)?;
        self.forward_rows(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::NUM_FEATURES;

    fn write_test_bundle(path: &Path) {
        let device = NdArrayDevice::default();
        let model = MlpConfig::new(NUM_FEATURES).init::<CpuBackend>(&device);
        let metadata = ModelMetadata::new("Neural Network")
            .with_scaler(vec![1000.0; NUM_FEATURES], vec![500.0; NUM_FEATURES]);
        MlpHandle::save_bundle(&model, &metadata, path).unwrap();
    }

    #[test]
    fn test_bundle_roundtrip_and_shape() {
        let dir = std::env::temp_dir().join("hpd_mlp_roundtrip_test");
        let path = dir.join("mlp.tar.gz");
        write_test_bundle(&path);

        let handle = MlpHandle::load(&path).unwrap();
        let rows = vec![vec![1500.0; NUM_FEATURES], vec![200.0; NUM_FEATURES]];
        let predictions = handle.predict_rows(&rows).unwrap();
        assert_eq!(predictions.len(), 2);
        assert!(predictions.iter().all(|p| p.is_finite()));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_same_weights_give_same_predictions() {
        let dir = std::env::temp_dir().join("hpd_mlp_determinism_test");
        let path = dir.join("mlp.tar.gz");
        write_test_bundle(&path);

        let first = MlpHandle::load(&path).unwrap();
        let second = MlpHandle::load(&path).unwrap();
        let row = vec![vec![1234.0; NUM_FEATURES]];
        assert_eq!(
            first.predict_rows(&row).unwrap(),
            second.predict_rows(&row).unwrap()
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_shape_mismatch() {
        let dir = std::env::temp_dir().join("hpd_mlp_shape_test");
        let path = dir.join("mlp.tar.gz");
        write_test_bundle(&path);

        let handle = MlpHandle::load(&path).unwrap();
        assert!(handle.predict_rows(&[vec![1.0; 3]]).is_err());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_no_importance_capability() {
        let dir = std::env::temp_dir().join("hpd_mlp_capability_test");
        let path = dir.join("mlp.tar.gz");
        write_test_bundle(&path);

        let handle = MlpHandle::load(&path).unwrap();
        assert!(handle.importance_provider().is_none());

        std::fs::remove_dir_all(&dir).ok();
    }
}
