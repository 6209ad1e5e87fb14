//! 予測ページのTauriコマンド

use serde::Serialize;
use tauri::State;

use crate::csv_loader::validate_csv;
use crate::error::RegistryError;
use crate::predictor::{run_prediction, PredictionOutcome};
use crate::schema::{FieldBounds, ManualInput, PredictionRequest, FEATURE_COLUMNS, FORM_BOUNDS};
use crate::AppState;

/// 検証済みリクエストと表示用プレビュー
///
/// フロントエンドは `request` をそのまま `predict_price` に返します。
#[derive(Debug, Clone, Serialize)]
pub struct CsvPreview {
    pub request: PredictionRequest,
    pub columns: Vec<String>,
    /// 先頭5行（アップロード直後のテーブル表示用）
    pub head: Vec<Vec<f64>>,
    pub row_count: usize,
}

fn preview_of(request: PredictionRequest) -> CsvPreview {
    let head: Vec<Vec<f64>> = request.rows().iter().take(5).cloned().collect();
    let row_count = request.len();
    CsvPreview {
        columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        head,
        row_count,
        request,
    }
}

/// レジストリを初期化してモデル情報一覧を返す
///
/// 1つでも読めなければ全体が失敗し、予測フローには進めません。
#[tauri::command]
pub fn initialize_models(state: State<AppState>) -> Result<Vec<crate::model::ModelInfo>, String> {
    println!("[initialize_models] モデルディレクトリ: {:?}", state.models_dir);
    let mut registry = state.registry.lock().unwrap();
    registry
        .initialize(&state.models_dir)
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn registry_ready(state: State<AppState>) -> bool {
    state.registry.lock().unwrap().is_ready()
}

/// 読み込み済みモデルの一覧
#[tauri::command]
pub fn list_models(state: State<AppState>) -> Result<Vec<crate::model::ModelInfo>, String> {
    let registry = state.registry.lock().unwrap();
    if !registry.is_ready() {
        return Err(RegistryError::NotReady.to_string());
    }
    Ok(registry.infos())
}

/// 手入力フォームの範囲テーブル（ウィジェット生成用）
#[tauri::command]
pub fn form_bounds() -> Vec<FieldBounds> {
    FORM_BOUNDS.to_vec()
}

/// アップロードされたCSVテキストを検証
#[tauri::command]
pub fn parse_prediction_csv(content: String) -> Result<CsvPreview, String> {
    let request = validate_csv(&content).map_err(|e| e.to_string())?;
    println!("[parse_prediction_csv] 検証OK - {}行", request.len());
    Ok(preview_of(request))
}

/// 手入力フォームからリクエストを組み立て
#[tauri::command]
pub fn build_manual_request(input: ManualInput) -> Result<CsvPreview, String> {
    let request = input.build_request().map_err(|e| e.to_string())?;
    Ok(preview_of(request))
}

/// 選択したモデルで1回の予測を実行
///
/// 推論はブロッキング処理なので別スレッドで実行します。
#[tauri::command]
pub async fn predict_price(
    model_name: String,
    request: PredictionRequest,
    state: State<'_, AppState>,
) -> Result<PredictionOutcome, String> {
    println!(
        "[predict_price] モデル: {}, 行数: {}",
        model_name,
        request.len()
    );

    let registry = state.registry.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let registry = registry.lock().unwrap();
        if !registry.is_ready() {
            return Err(RegistryError::NotReady.to_string());
        }
        run_prediction(&registry, &model_name, &request).map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| format!("推論スレッドエラー: {}", e))??;

    println!(
        "[predict_price] 完了 - ${:.2} ({:.4}秒)",
        outcome.price, outcome.elapsed_seconds
    );
    Ok(outcome)
}
