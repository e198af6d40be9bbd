//! 解析結果レポート（JSON）
//!
//! `process` の出力で、`summary`・`review`・`export` の入力になる。

use crate::error::{BillScanError, Result};
use crate::workflow::Workflow;
use bill_scanner_common::{
    new_item_id, round_cents, CategoryTotal, ExtractedItem, ItemStore, Template, UNCATEGORIZED,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// 元画像の情報
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceImage {
    pub file_name: String,
    pub mime: String,
    pub digest: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillReport {
    pub template: Template,
    #[serde(default)]
    pub vendor: String,
    /// レシート記載のまま
    #[serde(default)]
    pub date: String,
    /// YYYY-MM-DD（解釈できた場合のみ）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_iso: Option<String>,
    /// レシート記載の合計
    #[serde(default)]
    pub receipt_total: f64,
    pub items: Vec<ExtractedItem>,
    /// 明細の合計
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub category_totals: Vec<CategoryTotal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_confidence: Option<f64>,
    #[serde(default)]
    pub generated_at: String,
}

impl BillReport {
    /// 解析済みのワークフローから作成
    pub fn from_workflow(workflow: &Workflow) -> Result<Self> {
        let template = workflow.template().cloned().ok_or(BillScanError::NoTemplate)?;
        let receipt = workflow.receipt().cloned().unwrap_or_default();
        let source = workflow.intake().selected_index().and_then(|index| {
            workflow.intake().get(index).map(|image| SourceImage {
                file_name: image.original.file_name.clone(),
                mime: image.original.mime.clone(),
                digest: image.digest.clone(),
            })
        });

        let mut report = Self {
            template,
            vendor: receipt.vendor,
            date_iso: normalize_date(&receipt.date),
            date: receipt.date,
            receipt_total: receipt.total,
            items: workflow.items().to_vec(),
            total: 0.0,
            category_totals: Vec::new(),
            source,
            ocr_confidence: workflow.text().map(|t| t.confidence),
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };
        report.refresh_totals();
        Ok(report)
    }

    /// 明細から合計を再計算
    pub fn refresh_totals(&mut self) {
        let store = self.to_store();
        self.total = round_cents(store.total());
        self.category_totals = store
            .category_totals()
            .into_iter()
            .map(|t| CategoryTotal {
                category: t.category,
                total: round_cents(t.total),
            })
            .collect();
    }

    /// 編集用のアイテムストア
    pub fn to_store(&self) -> ItemStore {
        let mut store = ItemStore::for_template(&self.template);
        // 手で編集されたレポートはIDやカテゴリが崩れていることがある
        for item in &self.items {
            let mut item = item.clone();
            if item.id.is_empty() || store.get(&item.id).is_some() {
                item.id = new_item_id();
            }
            if !self.template.has_category(&item.category) {
                item.category = UNCATEGORIZED.to_string();
            }
            if let Err(e) = store.insert(item) {
                warn!(error = %e, "明細を読み込めません");
            }
        }
        store
    }

    /// 編集結果を反映
    pub fn apply_store(&mut self, store: &ItemStore) {
        self.items = store.items().to_vec();
        self.refresh_totals();
    }

    /// レシート記載の合計と明細合計が一致するか（1セント未満の差は一致とみなす）
    pub fn matches_receipt_total(&self) -> bool {
        self.receipt_total == 0.0 || (self.total - self.receipt_total).abs() < 0.005
    }

    pub fn title(&self) -> String {
        if self.vendor.is_empty() {
            self.template.name.clone()
        } else {
            format!("{} ({})", self.vendor, self.template.name)
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(BillScanError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let mut report: Self = serde_json::from_str(&content)?;
        let store = report.to_store();
        report.apply_store(&store);
        Ok(report)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// 日付文字列をYYYY-MM-DDに変換
pub fn normalize_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let formats = ["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%d.%m.%Y", "%Y/%m/%d", "%m-%d-%Y"];
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .map(|date| date.format("%Y-%m-%d").to_string())
}
