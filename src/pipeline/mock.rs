//! 参照バックエンド
//!
//! 固定の待ち時間と既定データで各段を再現する。
//! 本物のOCR・補正は行わない（外部OCRは `command` を使う）。

use super::backend::{Categorizer, ImageEnhancer, ItemParser, TemplateSource, TextExtractor};
use super::Stage;
use crate::error::{BillScanError, Result};
use crate::intake::ImageData;
use async_trait::async_trait;
use bill_scanner_common::{
    categorize_items, parse_receipt, ExtractedItem, ParsedItem, ProcessedData, ProcessedText,
    Template, TemplateCatalog,
};
use std::sync::Arc;
use std::time::Duration;

/// 参照OCRが返すレシート
pub const SAMPLE_RECEIPT: &str = "GROCERY STORE RECEIPT
123 Main Street
Date: 03/15/2025
-----------------------
Milk     $3.99
Bread    $2.49
Eggs     $4.29
Apples   $5.99
Chicken  $12.49
Rice     $3.79
-----------------------
Total:   $32.99
Thank you for shopping with us!";

pub const SAMPLE_CONFIDENCE: f64 = 0.92;

/// 各段の待ち時間
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Latency {
    pub templates: Duration,
    pub enhance: Duration,
    pub extract: Duration,
    pub parse: Duration,
    pub categorize: Duration,
}

impl Latency {
    /// 画面版と同じ待ち時間
    pub fn reference() -> Self {
        Self {
            templates: Duration::from_millis(300),
            enhance: Duration::from_millis(1500),
            extract: Duration::from_millis(1500),
            parse: Duration::from_millis(1000),
            categorize: Duration::from_millis(800),
        }
    }

    pub fn none() -> Self {
        Self {
            templates: Duration::ZERO,
            enhance: Duration::ZERO,
            extract: Duration::ZERO,
            parse: Duration::ZERO,
            categorize: Duration::ZERO,
        }
    }

    pub fn from_config(simulated: bool) -> Self {
        if simulated {
            Self::reference()
        } else {
            Self::none()
        }
    }
}

impl Default for Latency {
    fn default() -> Self {
        Self::none()
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// 既定テキストを返すOCR
#[derive(Debug, Clone)]
pub struct MockTextExtractor {
    text: String,
    confidence: f64,
    delay: Duration,
}

impl MockTextExtractor {
    pub fn new(delay: Duration) -> Self {
        Self {
            text: SAMPLE_RECEIPT.to_string(),
            confidence: SAMPLE_CONFIDENCE,
            delay,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>, confidence: f64) -> Self {
        self.text = text.into();
        self.confidence = confidence;
        self
    }
}

impl Default for MockTextExtractor {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

#[async_trait]
impl TextExtractor for MockTextExtractor {
    async fn extract_text(&self, image: &ImageData) -> Result<ProcessedText> {
        if image.bytes.is_empty() {
            return Err(BillScanError::stage(Stage::Extract, "画像データが空です"));
        }
        pause(self.delay).await;
        Ok(ProcessedText {
            text: self.text.clone(),
            confidence: self.confidence,
        })
    }
}

/// 行ルールによるパーサー
#[derive(Debug, Clone, Default)]
pub struct RuleItemParser {
    delay: Duration,
}

impl RuleItemParser {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ItemParser for RuleItemParser {
    async fn parse_items(&self, text: &str, _categories: &[String]) -> Result<ProcessedData> {
        if text.trim().is_empty() {
            return Err(BillScanError::stage(Stage::Parse, "テキストが空です"));
        }
        pause(self.delay).await;
        Ok(parse_receipt(text))
    }
}

/// テンプレートのキーワードルールでカテゴリを付ける
#[derive(Debug, Clone)]
pub struct KeywordCategorizer {
    catalog: Arc<TemplateCatalog>,
    delay: Duration,
}

impl KeywordCategorizer {
    pub fn new(catalog: Arc<TemplateCatalog>, delay: Duration) -> Self {
        Self { catalog, delay }
    }
}

#[async_trait]
impl Categorizer for KeywordCategorizer {
    async fn categorize(
        &self,
        items: &[ParsedItem],
        template: &Template,
    ) -> Result<Vec<ExtractedItem>> {
        pause(self.delay).await;
        let rules = self.catalog.rules_for(&template.id);
        Ok(categorize_items(items, template, rules))
    }
}

/// 入力をそのまま返す補正
#[derive(Debug, Clone, Default)]
pub struct PassthroughEnhancer {
    delay: Duration,
}

impl PassthroughEnhancer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ImageEnhancer for PassthroughEnhancer {
    async fn enhance(&self, image: &ImageData) -> Result<ImageData> {
        if image.bytes.is_empty() {
            return Err(BillScanError::stage(Stage::Enhance, "画像データが空です"));
        }
        pause(self.delay).await;
        Ok(image.clone())
    }
}

#[derive(Debug, Clone)]
pub struct CatalogTemplateSource {
    catalog: Arc<TemplateCatalog>,
    delay: Duration,
}

impl CatalogTemplateSource {
    pub fn new(catalog: Arc<TemplateCatalog>, delay: Duration) -> Self {
        Self { catalog, delay }
    }
}

#[async_trait]
impl TemplateSource for CatalogTemplateSource {
    async fn fetch_templates(&self) -> Result<Vec<Template>> {
        pause(self.delay).await;
        Ok(self.catalog.templates())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_image() -> ImageData {
        ImageData::with_mime("receipt.png", "image/png", vec![1, 2, 3])
    }

    #[tokio::test]
    async fn test_mock_extractor_returns_sample_receipt() {
        let extractor = MockTextExtractor::default();
        let text = extractor.extract_text(&sample_image()).await.unwrap();
        assert_eq!(text.confidence, SAMPLE_CONFIDENCE);
        assert!(text.text.contains("Chicken"));
    }

    #[tokio::test]
    async fn test_mock_extractor_rejects_empty_image() {
        let extractor = MockTextExtractor::default();
        let empty = ImageData::with_mime("empty.png", "image/png", Vec::new());
        let err = extractor.extract_text(&empty).await.unwrap_err();
        assert!(matches!(err, BillScanError::Stage { stage: Stage::Extract, .. }));
    }

    #[tokio::test]
    async fn test_rule_parser_sample_receipt() {
        let data = RuleItemParser::default()
            .parse_items(SAMPLE_RECEIPT, &[])
            .await
            .unwrap();
        assert_eq!(data.items.len(), 6);
        assert_eq!(data.total, 32.99);
        assert_eq!(data.date, "03/15/2025");
    }

    #[tokio::test]
    async fn test_rule_parser_rejects_blank_text() {
        let err = RuleItemParser::default().parse_items("  \n ", &[]).await.unwrap_err();
        assert!(matches!(err, BillScanError::Stage { stage: Stage::Parse, .. }));
    }

    #[tokio::test]
    async fn test_keyword_categorizer_uses_template_rules() {
        let catalog = Arc::new(TemplateCatalog::builtin());
        let restaurant = catalog.get("restaurant").unwrap().clone();
        let categorizer = KeywordCategorizer::new(catalog, Duration::ZERO);
        let items = vec![ParsedItem::new("Cheese Burger", 11.5), ParsedItem::new("Coffee", 3.0)];

        let result = categorizer.categorize(&items, &restaurant).await.unwrap();
        assert_eq!(result[0].category, "Main Course");
        assert_eq!(result[1].category, "Beverages");
    }

    #[tokio::test]
    async fn test_catalog_source_lists_builtin_templates() {
        let source = CatalogTemplateSource::new(Arc::new(TemplateCatalog::builtin()), Duration::ZERO);
        let templates = source.fetch_templates().await.unwrap();
        let ids: Vec<&str> = templates.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["grocery", "restaurant", "office", "utility"]);
    }

    #[tokio::test]
    async fn test_passthrough_enhancer_keeps_bytes() {
        let image = sample_image();
        let enhanced = PassthroughEnhancer::default().enhance(&image).await.unwrap();
        assert_eq!(enhanced, image);
    }

    #[test]
    fn test_latency_from_config() {
        assert_eq!(Latency::from_config(false), Latency::none());
        assert_eq!(Latency::from_config(true).extract, Duration::from_millis(1500));
    }
}
