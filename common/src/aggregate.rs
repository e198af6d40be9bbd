//! 集計（合計・カテゴリ別小計）
//!
//! 常に現在の明細リストから再計算する。キャッシュは持たない。

use crate::types::ExtractedItem;
use serde::{Deserialize, Serialize};

/// カテゴリ別小計
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
}

/// 金額の合計（丸めなし）
pub fn total(items: &[ExtractedItem]) -> f64 {
    items.iter().map(|item| item.amount).sum()
}

/// カテゴリ別小計（カテゴリの初出順）
pub fn category_totals(items: &[ExtractedItem]) -> Vec<CategoryTotal> {
    let mut totals: Vec<CategoryTotal> = Vec::new();
    for item in items {
        match totals.iter_mut().find(|t| t.category == item.category) {
            Some(entry) => entry.total += item.amount,
            None => totals.push(CategoryTotal {
                category: item.category.clone(),
                total: item.amount,
            }),
        }
    }
    totals
}

/// 表示用の金額文字列（小数2桁）
pub fn format_amount(value: f64) -> String {
    format!("{:.2}", value)
}
