//! 予測リクエストのスキーマ定義
//!
//! King County住宅データの16特徴量を固定順で扱います。
//! 列構成: bedrooms, bathrooms, sqft_living, sqft_lot, floors, condition,
//! grade, sqft_above, sqft_basement, yr_built, yr_renovated, sqft_living15,
//! sqft_lot15, day_posted, month_posted, year_posted

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// 特徴量の数
pub const NUM_FEATURES: usize = 16;

/// 特徴量列の正規順序
///
/// アップロードCSVの列順は任意ですが、モデルに渡す直前には
/// 必ずこの順序に射影されます。
pub const FEATURE_COLUMNS: [&str; NUM_FEATURES] = [
    "bedrooms",
    "bathrooms",
    "sqft_living",
    "sqft_lot",
    "floors",
    "condition",
    "grade",
    "sqft_above",
    "sqft_basement",
    "yr_built",
    "yr_renovated",
    "sqft_living15",
    "sqft_lot15",
    "day_posted",
    "month_posted",
    "year_posted",
];

/// アップロード時に取り除く列（存在する場合のみ）
pub const DROPPED_COLUMNS: [&str; 2] = ["price", "City"];

/// 手入力フォームの1項目あたりの許容範囲
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldBounds {
    pub field: &'static str,
    pub min: f64,
    pub max: f64,
    /// 入力ウィジェットの刻み幅
    pub step: f64,
}

/// 手入力フォームの範囲テーブル（正規順序と同じ並び）
///
/// 日付項目の整合性（月ごとの日数、yr_built と yr_renovated の前後関係）は
/// 意図的に検証しません。項目単体の範囲のみを見ます。
pub const FORM_BOUNDS: [FieldBounds; NUM_FEATURES] = [
    FieldBounds { field: "bedrooms", min: 1.0, max: 15.0, step: 1.0 },
    FieldBounds { field: "bathrooms", min: 1.0, max: 10.0, step: 0.5 },
    FieldBounds { field: "sqft_living", min: 300.0, max: 15000.0, step: 1.0 },
    FieldBounds { field: "sqft_lot", min: 500.0, max: 1_000_000.0, step: 1.0 },
    FieldBounds { field: "floors", min: 1.0, max: 5.0, step: 0.5 },
    FieldBounds { field: "condition", min: 1.0, max: 5.0, step: 1.0 },
    FieldBounds { field: "grade", min: 1.0, max: 13.0, step: 1.0 },
    FieldBounds { field: "sqft_above", min: 300.0, max: 10000.0, step: 1.0 },
    FieldBounds { field: "sqft_basement", min: 0.0, max: 5000.0, step: 1.0 },
    FieldBounds { field: "yr_built", min: 1900.0, max: 2023.0, step: 1.0 },
    FieldBounds { field: "yr_renovated", min: 0.0, max: 2023.0, step: 1.0 },
    FieldBounds { field: "sqft_living15", min: 300.0, max: 10000.0, step: 1.0 },
    FieldBounds { field: "sqft_lot15", min: 500.0, max: 1_000_000.0, step: 1.0 },
    FieldBounds { field: "day_posted", min: 1.0, max: 31.0, step: 1.0 },
    FieldBounds { field: "month_posted", min: 1.0, max: 12.0, step: 1.0 },
    FieldBounds { field: "year_posted", min: 1900.0, max: 2023.0, step: 1.0 },
];

/// 検証済みの予測リクエスト
///
/// 全行が正規順序の16列を持つことをコンストラクタが保証します。
/// 生成後は変更されず、1回の予測で消費されます。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    rows: Vec<Vec<f64>>,
}

impl PredictionRequest {
    /// 行の集合からリクエストを生成
    ///
    /// 各行は正規順序の16要素である必要があります。
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, ValidationError> {
        if rows.is_empty() {
            return Err(ValidationError::Empty);
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != NUM_FEATURES {
                return Err(ValidationError::InvalidValue {
                    column: format!("列数 {}", row.len()),
                    row: i + 1,
                });
            }
        }
        Ok(Self { rows })
    }

    /// 単一行のリクエストを生成
    pub fn single(row: [f64; NUM_FEATURES]) -> Self {
        Self {
            rows: vec![row.to_vec()],
        }
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// 手入力フォームの16項目
///
/// フロントエンドの入力ウィジェットが範囲を制限しますが、
/// バックエンド側でも同じ範囲テーブルで検証します。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualInput {
    pub bedrooms: f64,
    pub bathrooms: f64,
    pub sqft_living: f64,
    pub sqft_lot: f64,
    pub floors: f64,
    pub condition: f64,
    pub grade: f64,
    pub sqft_above: f64,
    pub sqft_basement: f64,
    pub yr_built: f64,
    pub yr_renovated: f64,
    pub sqft_living15: f64,
    pub sqft_lot15: f64,
    pub day_posted: f64,
    pub month_posted: f64,
    pub year_posted: f64,
}

impl ManualInput {
    /// 正規順序の値配列に変換
    pub fn to_row(&self) -> [f64; NUM_FEATURES] {
        [
            self.bedrooms,
            self.bathrooms,
            self.sqft_living,
            self.sqft_lot,
            self.floors,
            self.condition,
            self.grade,
            self.sqft_above,
            self.sqft_basement,
            self.yr_built,
            self.yr_renovated,
            self.sqft_living15,
            self.sqft_lot15,
            self.day_posted,
            self.month_posted,
            self.year_posted,
        ]
    }

    /// 範囲検証して単一行のリクエストを生成
    pub fn build_request(&self) -> Result<PredictionRequest, ValidationError> {
        let row = self.to_row();
        for (value, bounds) in row.iter().zip(FORM_BOUNDS.iter()) {
            if !value.is_finite() || *value < bounds.min || *value > bounds.max {
                return Err(ValidationError::OutOfRange {
                    field: bounds.field.to_string(),
                    value: *value,
                    min: bounds.min,
                    max: bounds.max,
                });
            }
        }
        Ok(PredictionRequest::single(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input() -> ManualInput {
        ManualInput {
            bedrooms: 3.0,
            bathrooms: 2.5,
            sqft_living: 2500.0,
            sqft_lot: 6000.0,
            floors: 2.0,
            condition: 3.0,
            grade: 8.0,
            sqft_above: 2000.0,
            sqft_basement: 500.0,
            yr_built: 1995.0,
            yr_renovated: 2010.0,
            sqft_living15: 2400.0,
            sqft_lot15: 6500.0,
            day_posted: 15.0,
            month_posted: 5.0,
            year_posted: 2015.0,
        }
    }

    #[test]
    fn test_bounds_table_matches_columns() {
        assert_eq!(FORM_BOUNDS.len(), FEATURE_COLUMNS.len());
        for (bounds, column) in FORM_BOUNDS.iter().zip(FEATURE_COLUMNS.iter()) {
            assert_eq!(bounds.field, *column);
            assert!(bounds.min <= bounds.max);
        }
    }

    #[test]
    fn test_build_request_in_bounds() {
        let request = sample_input().build_request().unwrap();
        assert_eq!(request.len(), 1);
        assert_eq!(request.rows()[0].len(), NUM_FEATURES);
        // 正規順序で並んでいること
        assert_eq!(request.rows()[0][0], 3.0); // bedrooms
        assert_eq!(request.rows()[0][6], 8.0); // grade
        assert_eq!(request.rows()[0][15], 2015.0); // year_posted
    }

    #[test]
    fn test_build_request_boundary_values() {
        let mut input = sample_input();
        input.bedrooms = 1.0;
        input.yr_renovated = 0.0;
        input.sqft_lot = 1_000_000.0;
        assert!(input.build_request().is_ok());
    }

    #[test]
    fn test_build_request_out_of_range() {
        let mut input = sample_input();
        input.grade = 14.0;
        let err = input.build_request().unwrap_err();
        assert!(err.to_string().contains("grade"));
    }

    #[test]
    fn test_from_rows_rejects_empty() {
        assert!(PredictionRequest::from_rows(Vec::new()).is_err());
    }

    #[test]
    fn test_from_rows_rejects_wrong_width() {
        assert!(PredictionRequest::from_rows(vec![vec![1.0; 15]]).is_err());
    }
}
