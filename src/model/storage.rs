//! モデルバンドルの永続化
//!
//! Tar.gz形式でモデルとメタデータを1ファイルに統合して保存・読み込みします。
//!
//! ファイル構成（tar.gz内部）:
//! - metadata.json   - メタデータ（アルゴリズム名、特徴量列、標準化統計）
//! - model.json      - モデル本体（木アンサンブルなどのJSON表現）、または
//! - model.bin       - モデルの重み（Burnレコーダのバイナリ）

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Archive, Builder};

use crate::model::metadata::ModelMetadata;

fn append_entry(builder: &mut Builder<GzEncoder<File>>, name: &str, bytes: &[u8]) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_path(name)?;
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append(&header, bytes)
        .context(format!("Failed to add {} to tar", name))
}

fn create_bundle(
    path: &Path,
    metadata: &ModelMetadata,
    payload_name: &str,
    payload: &[u8],
) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .context(format!("Failed to create parent directory: {:?}", parent))?;
    }

    let tar_gz_file =
        File::create(path).context(format!("Failed to create tar.gz file: {:?}", path))?;

    let encoder = GzEncoder::new(tar_gz_file, Compression::default());
    let mut tar_builder = Builder::new(encoder);

    let json_str = metadata.to_json_string()?;
    append_entry(&mut tar_builder, "metadata.json", json_str.as_bytes())?;
    append_entry(&mut tar_builder, payload_name, payload)?;

    tar_builder
        .finish()
        .context("Failed to finalize tar.gz archive")?;

    Ok(())
}

/// JSON表現のモデルをメタデータと共にtar.gzへ保存
pub fn save_json_bundle(path: &Path, metadata: &ModelMetadata, payload: &str) -> Result<()> {
    create_bundle(path, metadata, "model.json", payload.as_bytes())
}

/// バイナリ重みのモデルをメタデータと共にtar.gzへ保存
pub fn save_binary_bundle(path: &Path, metadata: &ModelMetadata, payload: &[u8]) -> Result<()> {
    create_bundle(path, metadata, "model.bin", payload)
}

fn read_bundle(path: &Path, payload_name: &str) -> Result<(ModelMetadata, Vec<u8>)> {
    let tar_gz_file =
        File::open(path).context(format!("Failed to open tar.gz file: {:?}", path))?;

    let decoder = GzDecoder::new(tar_gz_file);
    let mut archive = Archive::new(decoder);

    let mut metadata_opt: Option<ModelMetadata> = None;
    let mut payload_opt: Option<Vec<u8>> = None;

    // 両方のエントリを読み込む
    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?;

        match entry_path.to_str() {
            Some("metadata.json") => {
                let mut json_str = String::new();
                entry.read_to_string(&mut json_str)?;
                metadata_opt = Some(ModelMetadata::from_json_string(&json_str)?);
            }
            Some(name) if name == payload_name => {
                let mut buffer = Vec::new();
                entry.read_to_end(&mut buffer)?;
                payload_opt = Some(buffer);
            }
            _ => {}
        }
    }

    match (metadata_opt, payload_opt) {
        (Some(metadata), Some(payload)) => Ok((metadata, payload)),
        (None, _) => Err(anyhow::anyhow!(
            "metadata.json not found in tar.gz archive: {:?}",
            path
        )),
        (_, None) => Err(anyhow::anyhow!(
            "{} not found in tar.gz archive: {:?}",
            payload_name,
            path
        )),
    }
}

/// Tar.gzからメタデータとJSONペイロードを読み込む
pub fn load_json_payload(path: &Path) -> Result<(ModelMetadata, String)> {
    let (metadata, bytes) = read_bundle(path, "model.json")?;
    let payload = String::from_utf8(bytes).context("model.json is not valid UTF-8")?;
    Ok((metadata, payload))
}

/// Tar.gzからメタデータとモデルバイナリを読み込む
pub fn load_model_binary(path: &Path) -> Result<(ModelMetadata, Vec<u8>)> {
    read_bundle(path, "model.bin")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_bundle_roundtrip() {
        let dir = std::env::temp_dir().join("hpd_storage_json_test");
        let path = dir.join("bundle.tar.gz");
        let metadata = ModelMetadata::new("Bagging");
        save_json_bundle(&path, &metadata, "{\"trees\":[]}").unwrap();

        let (loaded_meta, payload) = load_json_payload(&path).unwrap();
        assert_eq!(loaded_meta.algorithm, "Bagging");
        assert_eq!(payload, "{\"trees\":[]}");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_binary_bundle_roundtrip() {
        let dir = std::env::temp_dir().join("hpd_storage_bin_test");
        let path = dir.join("bundle.tar.gz");
        let metadata = ModelMetadata::new("Neural Network");
        let payload = vec![0u8, 1, 2, 3, 255];
        save_binary_bundle(&path, &metadata, &payload).unwrap();

        let (loaded_meta, loaded_payload) = load_model_binary(&path).unwrap();
        assert_eq!(loaded_meta.algorithm, "Neural Network");
        assert_eq!(loaded_payload, payload);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_payload_entry() {
        let dir = std::env::temp_dir().join("hpd_storage_missing_test");
        let path = dir.join("bundle.tar.gz");
        let metadata = ModelMetadata::new("Bagging");
        save_json_bundle(&path, &metadata, "{}").unwrap();

        // model.bin は入っていないので失敗する
        assert!(load_model_binary(&path).is_err());

        std::fs::remove_dir_all(&dir).ok();
    }
}
