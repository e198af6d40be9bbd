//! パス指定からの画像読み込み
//!
//! ファイルはそのまま読み込み（種類の検証は取り込み側で行う）、
//! フォルダは画像拡張子のファイルだけを拾う。

use super::ImageData;
use crate::error::{BillScanError, Result};
use bill_scanner_common::Error as CommonError;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff"];

fn is_image_extension(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// フォルダ内の画像パス（ファイル名順）
pub fn scan_folder(folder: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        return Err(BillScanError::FolderNotFound(folder.display().to_string()));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut paths: Vec<PathBuf> = WalkDir::new(folder)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_image_extension(e.path()))
        .map(|e| e.into_path())
        .collect();

    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

/// パス指定の読み込み結果
///
/// 読めなかったパスは `rejected` に残し、残りの読み込みは続ける。
#[derive(Debug, Default)]
pub struct LoadReport {
    pub images: Vec<ImageData>,
    pub rejected: Vec<BillScanError>,
}

/// 1ファイルを読み込む（上限を超えるファイルは中身を読まずに拒否）
pub fn load_file(path: &Path, max_bytes: u64) -> Result<ImageData> {
    if !path.is_file() {
        return Err(BillScanError::FileNotFound(path.display().to_string()));
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let size = std::fs::metadata(path)?.len();
    if size > max_bytes {
        return Err(CommonError::validation(
            &file_name,
            format!("サイズが上限を超えています ({} > {} bytes)", size, max_bytes),
        )
        .into());
    }

    let bytes = std::fs::read(path)?;
    Ok(ImageData::new(file_name, bytes))
}

/// ファイル・フォルダ混在の指定を読み込む
///
/// 1件も見つからず拒否も無い場合だけ `NoImagesFound` を返す。
pub fn load_paths(inputs: &[PathBuf], recursive: bool, max_bytes: u64) -> Result<LoadReport> {
    let mut report = LoadReport::default();

    for input in inputs {
        let paths = if input.is_dir() {
            match scan_folder(input, recursive) {
                Ok(paths) => paths,
                Err(e) => {
                    warn!(path = %input.display(), error = %e, "フォルダを読み込めません");
                    report.rejected.push(e);
                    continue;
                }
            }
        } else {
            vec![input.clone()]
        };

        for path in paths {
            match load_file(&path, max_bytes) {
                Ok(image) => report.images.push(image),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ファイルを読み込めません");
                    report.rejected.push(e);
                }
            }
        }
    }

    if report.images.is_empty() && report.rejected.is_empty() {
        let joined = inputs
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(BillScanError::NoImagesFound(joined));
    }

    Ok(report)
}
