//! レシート解析の型定義
//!
//! CLIとライブラリ利用側で共有される型:
//! - ProcessedText: テキスト抽出（OCR）の出力
//! - ProcessedData: テキスト→明細パースの出力
//! - ExtractedItem: カテゴリ付与後の明細（アイテムストアで編集される）

use serde::{Deserialize, Serialize};

/// テンプレートにカテゴリが無い場合のカテゴリ
pub const UNCATEGORIZED: &str = "Uncategorized";

/// 分類テンプレート
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    /// 先頭がデフォルトカテゴリ
    pub categories: Vec<String>,
}

impl Template {
    pub fn new(id: &str, name: &str, categories: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// 未分類時のカテゴリ（先頭カテゴリ、無ければUncategorized）
    pub fn default_category(&self) -> &str {
        self.categories
            .first()
            .map(|c| c.as_str())
            .unwrap_or(UNCATEGORIZED)
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }
}

/// OCR結果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessedText {
    pub text: String,
    /// 0.0〜1.0
    pub confidence: f64,
}

/// パース済み明細（カテゴリ付与前）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedItem {
    pub name: String,
    pub amount: f64,
}

impl ParsedItem {
    pub fn new(name: impl Into<String>, amount: f64) -> Self {
        Self {
            name: name.into(),
            amount,
        }
    }
}

/// テキストから構造化したレシート内容
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessedData {
    pub items: Vec<ParsedItem>,
    pub date: String,
    pub total: f64,
    pub vendor: String,
}

/// カテゴリ付与済みの明細
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedItem {
    pub id: String,
    pub name: String,
    pub category: String,
    pub amount: f64,
}
