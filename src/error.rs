//! エラー型の定義
//!
//! 失敗は関数シグネチャの一部として扱います。境界（Tauriコマンド）では
//! `map_err(|e| e.to_string())` でユーザー向けメッセージに変換します。

use thiserror::Error;

/// モデルレジストリの失敗
///
/// 1つでもアーティファクトが読めなければレジストリ全体が失敗扱いになります
/// （部分的なレジストリは作らない）。
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("モデル {name} の読み込みに失敗しました: {source}")]
    Load {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("モデルレジストリが初期化されていません")]
    NotReady,
}

/// 入力テーブルの検証失敗
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("CSVの解析に失敗しました: {0}")]
    Parse(#[from] csv::Error),

    #[error("データ行がありません")]
    Empty,

    #[error("必要な列がありません: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("数値に変換できない値があります (列: {column}, 行: {row})")]
    InvalidValue { column: String, row: usize },

    #[error("{field} の値 {value} が範囲外です ({min}〜{max})")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// 推論時の失敗
///
/// セッションは失敗後も継続できます（再試行はユーザー操作に任せる）。
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("モデル {0} は読み込まれていません")]
    UnknownModel(String),

    #[error("特徴量の数が一致しません (期待: {expected}, 実際: {actual})")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("推論に失敗しました: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_message() {
        let err = ValidationError::MissingColumns(vec!["grade".to_string(), "floors".to_string()]);
        let msg = err.to_string();
        assert!(msg.contains("grade"));
        assert!(msg.contains("floors"));
    }

    #[test]
    fn test_shape_mismatch_message() {
        let err = InferenceError::ShapeMismatch {
            expected: 16,
            actual: 14,
        };
        assert!(err.to_string().contains("16"));
        assert!(err.to_string().contains("14"));
    }
}
