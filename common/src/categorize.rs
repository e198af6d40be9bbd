//! カテゴリ付与
//!
//! パース済み明細にテンプレートのキーワードルールでカテゴリを付与し、
//! 明細ごとに新しいIDを割り当てる（入力順を維持）。

use crate::catalog::{match_category, KeywordRule};
use crate::store::new_item_id;
use crate::types::{ExtractedItem, ParsedItem, Template};

pub fn categorize_items(
    items: &[ParsedItem],
    template: &Template,
    rules: &[KeywordRule],
) -> Vec<ExtractedItem> {
    items
        .iter()
        .map(|item| ExtractedItem {
            id: new_item_id(),
            name: item.name.clone(),
            category: match_category(&item.name, template, rules),
            amount: item.amount,
        })
        .collect()
}
