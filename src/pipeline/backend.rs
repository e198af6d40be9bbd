//! 処理バックエンドのインターフェース
//!
//! OCR・パース・カテゴリ付与・画像補正・テンプレート取得は差し替え可能。
//! 参照実装は `mock`、外部OCRコマンドは `command` を参照。

use crate::error::Result;
use crate::intake::ImageData;
use async_trait::async_trait;
use bill_scanner_common::{ExtractedItem, ParsedItem, ProcessedData, ProcessedText, Template};

/// 画像 → テキスト
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, image: &ImageData) -> Result<ProcessedText>;
}

/// テキスト → 明細・日付・合計・店名
#[async_trait]
pub trait ItemParser: Send + Sync {
    async fn parse_items(&self, text: &str, categories: &[String]) -> Result<ProcessedData>;
}

/// 明細 → カテゴリ付き明細（IDもここで振る）
#[async_trait]
pub trait Categorizer: Send + Sync {
    async fn categorize(&self, items: &[ParsedItem], template: &Template)
        -> Result<Vec<ExtractedItem>>;
}

#[async_trait]
pub trait ImageEnhancer: Send + Sync {
    async fn enhance(&self, image: &ImageData) -> Result<ImageData>;
}

#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn fetch_templates(&self) -> Result<Vec<Template>>;
}
