//! ダッシュボード（ギャラリー）ページのTauriコマンド
//!
//! 事前生成された分析・診断画像を固定リストで返します。計算は一切
//! 行わない純粋な表示用ページです。

use std::path::PathBuf;

use serde::Serialize;
use tauri::State;

use crate::AppState;

/// ギャラリーの固定エントリ (ファイル名, キャプション, 表示列)
///
/// 3列グリッドのどこに置くかは元のダッシュボード構成に合わせています。
const GALLERY_ITEMS: [(&str, &str, u8); 8] = [
    ("Bagging.png", "Bagging Regressor を構成する3本の木", 1),
    (
        "GradientBoosting.png",
        "Gradient Boosting アンサンブルの最初の木",
        1,
    ),
    ("Linear_Regression.png", "線形回帰モデルの予測精度", 1),
    ("EDA1.png", "目的変数と各特徴量の相関", 2),
    ("EDA2.png", "Scatter Plot マトリクス", 2),
    ("Stacking.png", "Stacking Regressor 内の決定木", 2),
    ("mlp.png", "MLPRegressor の損失曲線", 3),
    ("CatBoost.png", "CatBoost の特徴量重要度", 3),
];

/// ギャラリー1件の表示情報
#[derive(Debug, Clone, Serialize)]
pub struct GalleryEntry {
    pub file: String,
    pub caption: String,
    pub column: u8,
    pub available: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

fn image_path(pictures_dir: &std::path::Path, file: &str) -> PathBuf {
    pictures_dir.join(file)
}

/// ギャラリーの固定リストを返す
///
/// 画像ファイルが無い場合も一覧には載せ、`available: false` で返します
/// （フロントエンドはプレースホルダを表示する）。
#[tauri::command]
pub fn list_gallery_images(state: State<AppState>) -> Vec<GalleryEntry> {
    GALLERY_ITEMS
        .iter()
        .map(|(file, caption, column)| {
            let path = image_path(&state.pictures_dir, file);
            let dimensions = image::image_dimensions(&path).ok();
            GalleryEntry {
                file: file.to_string(),
                caption: caption.to_string(),
                column: *column,
                available: dimensions.is_some(),
                width: dimensions.map(|(w, _)| w),
                height: dimensions.map(|(_, h)| h),
            }
        })
        .collect()
}

/// ギャラリー画像を data URL として返す
///
/// ファイル名は固定リストと照合します（任意パスの読み出しは不可）。
#[tauri::command]
pub fn load_gallery_image(file_name: String, state: State<AppState>) -> Result<String, String> {
    if !GALLERY_ITEMS.iter().any(|(file, _, _)| *file == file_name) {
        return Err(format!("未知の画像です: {}", file_name));
    }

    let path = image_path(&state.pictures_dir, &file_name);
    let bytes =
        std::fs::read(&path).map_err(|e| format!("画像の読み込みエラー: {} ({:?})", e, path))?;

    let base64_data = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &bytes);
    Ok(format!("data:image/png;base64,{}", base64_data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gallery_has_eight_fixed_entries() {
        assert_eq!(GALLERY_ITEMS.len(), 8);
        // 3列すべてが使われている
        for column in 1..=3u8 {
            assert!(GALLERY_ITEMS.iter().any(|(_, _, c)| *c == column));
        }
    }

    #[test]
    fn test_entries_are_unique() {
        for (i, (file, _, _)) in GALLERY_ITEMS.iter().enumerate() {
            assert!(!GALLERY_ITEMS[i + 1..].iter().any(|(f, _, _)| f == file));
        }
    }
}
