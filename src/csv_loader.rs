//! アップロードCSVの読み込みと検証
//!
//! 列順は任意。`price` と `City` は存在すれば取り除き、
//! 残りを16列の正規順序に射影します。

use csv::ReaderBuilder;

use crate::error::ValidationError;
use crate::schema::{PredictionRequest, FEATURE_COLUMNS};

/// CSVテキストを検証して予測リクエストに変換
///
/// # 引数
/// - `content`: アップロードされたCSVファイルの中身（ヘッダー行あり）
///
/// # 戻り値
/// - 正規順序16列の `PredictionRequest`、または検証エラー
pub fn validate_csv(content: &str) -> Result<PredictionRequest, ValidationError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();

    // 正規列 -> CSV内の列インデックス
    // price / City は射影に含めないので、ここで自然に脱落する
    let mut column_indices: Vec<Option<usize>> = vec![None; FEATURE_COLUMNS.len()];
    for (i, header) in headers.iter().enumerate() {
        if let Some(pos) = FEATURE_COLUMNS.iter().position(|c| *c == header) {
            column_indices[pos] = Some(i);
        }
    }

    // 集合差: 16列のうちCSVに無いもの
    let missing: Vec<String> = FEATURE_COLUMNS
        .iter()
        .zip(column_indices.iter())
        .filter(|(_, idx)| idx.is_none())
        .map(|(name, _)| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingColumns(missing));
    }

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result?;
        let mut row = Vec::with_capacity(FEATURE_COLUMNS.len());
        for (name, idx) in FEATURE_COLUMNS.iter().zip(column_indices.iter()) {
            let idx = idx.expect("checked above");
            let raw = record.get(idx).unwrap_or("");
            // 欠損値は許容しない
            let value: f64 = raw.parse().map_err(|_| ValidationError::InvalidValue {
                column: name.to_string(),
                row: row_no + 1,
            })?;
            row.push(value);
        }
        rows.push(row);
    }

    PredictionRequest::from_rows(rows)
}
