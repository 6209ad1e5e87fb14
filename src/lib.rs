mod gallery_commands;
mod predict_commands;

// 住宅価格予測のコアモジュール
pub mod csv_loader;
pub mod error;
pub mod ml;
pub mod model;
pub mod predictor;
pub mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use model::ModelRegistry;

pub struct AppState {
    /// プロセス全体で共有するモデルレジストリ（読み込みは1回だけ）
    pub registry: Arc<Mutex<ModelRegistry>>,
    /// 学習済みモデルのアーティファクト置き場
    pub models_dir: PathBuf,
    /// 事前生成された分析画像の置き場
    pub pictures_dir: PathBuf,
}

/// プロジェクトルート基準の相対パスを解決
pub fn resolve_project_path(relative: &str) -> PathBuf {
    match std::env::current_dir() {
        Ok(current) => current.join(relative),
        Err(_) => PathBuf::from(relative),
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let app_state = AppState {
        registry: Arc::new(Mutex::new(ModelRegistry::new())),
        models_dir: resolve_project_path("models"),
        pictures_dir: resolve_project_path("pictures"),
    };

    println!("[run] models: {:?}", app_state.models_dir);
    println!("[run] pictures: {:?}", app_state.pictures_dir);

    tauri::Builder::default()
        .manage(app_state)
        .invoke_handler(tauri::generate_handler![
            // 予測ページのコマンド
            predict_commands::initialize_models,
            predict_commands::registry_ready,
            predict_commands::list_models,
            predict_commands::form_bounds,
            predict_commands::parse_prediction_csv,
            predict_commands::build_manual_request,
            predict_commands::predict_price,
            // ダッシュボードページのコマンド
            gallery_commands::list_gallery_images,
            gallery_commands::load_gallery_image,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
