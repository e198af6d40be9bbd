//! 画像の取り込み
//!
//! 画像リスト・補正状態・選択中の画像を管理する。
//! 検証エラーはファイル単位で返し、バッチ全体は止めない。
//!
//! 選択中の画像を削除したときは同じ位置の画像を選ぶ。末尾を削除した場合は
//! 先頭（index 0）ではなく新しい末尾、つまり削除位置に最も近い画像を選ぶ。

mod image;
pub mod loader;

pub use image::{detect_mime, ImageData};

use crate::config::DEFAULT_MAX_IMAGE_BYTES;
use crate::error::{BillScanError, Result};
use crate::pipeline::ImageEnhancer;
use bill_scanner_common::Error as CommonError;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, warn};

/// 補正の進み具合
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageStatus {
    Pending,
    Processing,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub original: ImageData,
    pub enhanced: Option<ImageData>,
    pub status: ImageStatus,
    pub digest: String,
}

impl UploadedImage {
    fn new(original: ImageData) -> Self {
        let digest = original.digest();
        Self {
            original,
            enhanced: None,
            status: ImageStatus::Pending,
            digest,
        }
    }
}

/// 選択中の画像（元画像と補正後）
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub index: usize,
    pub original: ImageData,
    pub enhanced: Option<ImageData>,
}

/// 追加結果
#[derive(Debug, Default)]
pub struct IntakeReport {
    /// 追加された画像の位置
    pub accepted: Vec<usize>,
    /// 拒否されたファイルごとの検証エラー
    pub rejected: Vec<BillScanError>,
}

/// 補正結果
#[derive(Debug, Default)]
pub struct EnhanceReport {
    /// 完了した順
    pub processed: Vec<usize>,
    pub failed: Vec<(usize, String)>,
    /// 未選択時に最初に完了して自動選択された画像
    pub auto_selected: Option<Selection>,
}

/// 削除結果
#[derive(Debug)]
pub struct RemoveOutcome {
    pub removed: UploadedImage,
    /// 選択中の画像を削除して選択が移った場合の新しい選択
    pub moved_to: Option<Selection>,
}

#[derive(Debug)]
pub struct ImageIntake {
    images: Vec<UploadedImage>,
    selected: Option<usize>,
    max_bytes: u64,
}

impl Default for ImageIntake {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IMAGE_BYTES)
    }
}

impl ImageIntake {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            images: Vec::new(),
            selected: None,
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// 種類とサイズの検証
    pub fn validate(&self, file: &ImageData) -> Result<()> {
        if !file.is_image() {
            return Err(CommonError::validation(
                &file.file_name,
                format!("画像ではありません ({})", file.mime),
            )
            .into());
        }
        if file.size() > self.max_bytes {
            return Err(CommonError::validation(
                &file.file_name,
                format!(
                    "サイズが上限を超えています ({} > {} bytes)",
                    file.size(),
                    self.max_bytes
                ),
            )
            .into());
        }
        Ok(())
    }

    /// 検証を通った画像を追加
    pub fn add_images(&mut self, files: Vec<ImageData>) -> IntakeReport {
        let mut report = IntakeReport::default();

        for file in files {
            match self.validate(&file) {
                Ok(()) => {
                    debug!(file = %file.file_name, bytes = file.size(), "画像追加");
                    self.images.push(UploadedImage::new(file));
                    report.accepted.push(self.images.len() - 1);
                }
                Err(e) => {
                    warn!(file = %file.file_name, error = %e, "画像を拒否");
                    report.rejected.push(e);
                }
            }
        }

        report
    }

    pub fn images(&self) -> &[UploadedImage] {
        &self.images
    }

    pub fn get(&self, index: usize) -> Option<&UploadedImage> {
        self.images.get(index)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selected.and_then(|index| self.selection_at(index))
    }

    fn selection_at(&self, index: usize) -> Option<Selection> {
        self.images.get(index).map(|image| Selection {
            index,
            original: image.original.clone(),
            enhanced: image.enhanced.clone(),
        })
    }

    pub fn select(&mut self, index: usize) -> Result<Selection> {
        let selection = self.selection_at(index).ok_or(BillScanError::ImageNotFound {
            index,
            len: self.images.len(),
        })?;
        self.selected = Some(index);
        Ok(selection)
    }

    /// 画像を削除
    ///
    /// 選択中の画像なら同じ位置（無ければ先頭ではなく新しい末尾）へ選択を移す。
    pub fn remove(&mut self, index: usize) -> Result<RemoveOutcome> {
        if index >= self.images.len() {
            return Err(BillScanError::ImageNotFound {
                index,
                len: self.images.len(),
            });
        }

        let removed = self.images.remove(index);
        let mut moved_to = None;

        self.selected = match self.selected {
            Some(current) if current == index => {
                if self.images.is_empty() {
                    None
                } else {
                    let next = index.min(self.images.len() - 1);
                    moved_to = self.selection_at(next);
                    Some(next)
                }
            }
            Some(current) if current > index => Some(current - 1),
            other => other,
        };

        Ok(RemoveOutcome { removed, moved_to })
    }

    pub fn clear(&mut self) {
        self.images.clear();
        self.selected = None;
    }

    /// 補正前の画像をまとめて補正
    ///
    /// 補正は並行に実行し、結果は完了順に1件ずつ書き戻す。
    pub async fn enhance_pending(&mut self, enhancer: &dyn ImageEnhancer) -> EnhanceReport {
        let jobs: Vec<(usize, ImageData)> = self
            .images
            .iter_mut()
            .enumerate()
            .filter(|(_, image)| image.enhanced.is_none() && image.status != ImageStatus::Processing)
            .map(|(index, image)| {
                image.status = ImageStatus::Processing;
                (index, image.original.clone())
            })
            .collect();

        let mut report = EnhanceReport::default();
        let mut running: FuturesUnordered<_> = jobs
            .iter()
            .map(|(index, original)| async move { (*index, enhancer.enhance(original).await) })
            .collect();

        while let Some((index, result)) = running.next().await {
            let Some(image) = self.images.get_mut(index) else {
                continue;
            };
            match result {
                Ok(enhanced) => {
                    image.enhanced = Some(enhanced);
                    image.status = ImageStatus::Ready;
                    report.processed.push(index);

                    if self.selected.is_none() {
                        self.selected = Some(index);
                        report.auto_selected = self.selection_at(index);
                    }
                }
                Err(e) => {
                    warn!(file = %image.original.file_name, error = %e, "補正失敗");
                    image.status = ImageStatus::Failed(e.to_string());
                    report.failed.push((index, e.to_string()));
                }
            }
        }

        report
    }
}
