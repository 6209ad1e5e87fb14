//! モデルメタデータの定義
//!
//! tar.gz バンドルに `metadata.json` として同梱される情報です。
//! JSON単体アーティファクト（線形回帰・Stacking）はモデル本体が
//! 自己記述的なのでメタデータを持ちません。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::schema::FEATURE_COLUMNS;

/// モデルメタデータ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// アルゴリズム名（レジストリのキーと同じ表示名）
    pub algorithm: String,

    /// 学習時の特徴量列（正規順序）
    pub feature_names: Vec<String>,

    /// 標準化の平均（標準化して学習したモデルのみ）
    #[serde(default)]
    pub feature_means: Option<Vec<f64>>,

    /// 標準化の標準偏差（標準化して学習したモデルのみ）
    #[serde(default)]
    pub feature_stds: Option<Vec<f64>>,

    /// 学習時刻（ISO8601形式）
    pub trained_at: String,
}

impl ModelMetadata {
    /// 正規スキーマの特徴量列で新しいメタデータを作成
    pub fn new(algorithm: &str) -> Self {
        Self {
            algorithm: algorithm.to_string(),
            feature_names: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            feature_means: None,
            feature_stds: None,
            trained_at: chrono::Local::now().to_rfc3339(),
        }
    }

    /// 標準化統計を付与
    pub fn with_scaler(mut self, means: Vec<f64>, stds: Vec<f64>) -> Self {
        self.feature_means = Some(means);
        self.feature_stds = Some(stds);
        self
    }

    /// メタデータをJSON文字列に変換
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize metadata to JSON")
    }

    /// JSON文字列からメタデータを生成
    pub fn from_json_string(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize metadata from JSON")
    }
}
