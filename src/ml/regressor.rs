//! 回帰モデルの共通インターフェース
//!
//! 6種類のモデルはすべて `PriceModel` を実装します。特徴量重要度は
//! 一部のモデルだけが持つ能力なので、`importance_provider` 経由の
//! 能力照会で取得します（持たないモデルは `None` を返すだけ）。

use crate::error::InferenceError;

/// 価格回帰モデル
pub trait PriceModel: Send + Sync {
    /// 各行（正規順序の特徴量ベクトル）に対する予測値を返す
    fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, InferenceError>;

    /// 特徴量重要度を公開するモデルは `Some(self)` を返す
    fn importance_provider(&self) -> Option<&dyn FeatureImportances> {
        None
    }
}

/// 特徴量重要度を公開できるモデルの能力
pub trait FeatureImportances {
    /// 特徴量ごとの重要度（正規順序、非負、合計1に正規化）
    fn feature_importances(&self) -> Vec<f64>;
}

/// 行の幅チェック
pub(crate) fn check_width(rows: &[Vec<f64>], expected: usize) -> Result<(), InferenceError> {
    for row in rows {
        if row.len() != expected {
            return Err(InferenceError::ShapeMismatch {
                expected,
                actual: row.len(),
            });
        }
    }
    Ok(())
}

/// 重要度ベクトルを合計1に正規化（全ゼロならそのまま）
pub(crate) fn normalize_importances(mut raw: Vec<f64>) -> Vec<f64> {
    let total: f64 = raw.iter().sum();
    if total > 0.0 {
        for v in raw.iter_mut() {
            *v /= total;
        }
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_width() {
        assert!(check_width(&[vec![1.0, 2.0]], 2).is_ok());
        assert!(check_width(&[vec![1.0, 2.0], vec![1.0]], 2).is_err());
    }

    #[test]
    fn test_normalize_importances() {
        let normalized = normalize_importances(vec![1.0, 3.0]);
        assert!((normalized[0] - 0.25).abs() < 1e-12);
        assert!((normalized[1] - 0.75).abs() < 1e-12);

        // 全ゼロは変化しない
        let zeros = normalize_importances(vec![0.0, 0.0]);
        assert_eq!(zeros, vec![0.0, 0.0]);
    }
}
