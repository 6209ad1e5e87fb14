//! 予測ディスパッチャ
//!
//! 検証済みリクエストと選択されたモデルから価格予測を作ります。
//! 負の出力は数値エラーではなく、絶対値を取って大きさで採用します
//! （プロダクト判断であり、エラー扱いにしない）。

use std::time::Instant;

use serde::Serialize;

use crate::error::InferenceError;
use crate::model::ModelRegistry;
use crate::schema::{PredictionRequest, FEATURE_COLUMNS};

/// 重要度の高い順に並べた特徴量1件
#[derive(Debug, Clone, Serialize)]
pub struct RankedImportance {
    pub feature: String,
    pub importance: f64,
}

/// 予測結果
#[derive(Debug, Clone, Serialize)]
pub struct PredictionOutcome {
    pub model_name: String,
    /// 先頭行の予測価格（結果表示のメイン値）
    pub price: f64,
    /// 全行の予測価格
    pub prices: Vec<f64>,
    /// 推論の実時間（秒）
    pub elapsed_seconds: f64,
    /// 特徴量重要度（モデルが能力を持つ場合のみ、降順）
    pub importances: Option<Vec<RankedImportance>>,
}

/// 1回の推論を実行
///
/// # 引数
/// - `registry`: 初期化済みのモデルレジストリ
/// - `model_name`: レジストリの表示名（例: "Gradient Boosting"）
/// - `request`: 検証済みの予測リクエスト
pub fn run_prediction(
    registry: &ModelRegistry,
    model_name: &str,
    request: &PredictionRequest,
) -> Result<PredictionOutcome, InferenceError> {
    let entry = registry
        .get(model_name)
        .ok_or_else(|| InferenceError::UnknownModel(model_name.to_string()))?;

    if request.is_empty() {
        return Err(InferenceError::Backend(
            "リクエストにデータ行がありません".to_string(),
        ));
    }

    let start = Instant::now();
    let raw = entry.model.predict_rows(request.rows())?;
    let elapsed_seconds = start.elapsed().as_secs_f64();

    // 負の予測は大きさで採用する
    let prices: Vec<f64> = raw.into_iter().map(f64::abs).collect();
    let price = prices[0];

    let importances = entry.model.importance_provider().map(|provider| {
        let mut ranked: Vec<RankedImportance> = provider
            .feature_importances()
            .into_iter()
            .zip(FEATURE_COLUMNS.iter())
            .map(|(importance, feature)| RankedImportance {
                feature: feature.to_string(),
                importance,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    });

    Ok(PredictionOutcome {
        model_name: model_name.to_string(),
        price,
        prices,
        elapsed_seconds,
        importances,
    })
}
