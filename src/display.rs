//! 端末表示
//!
//! 明細表・カテゴリ別小計・テンプレート一覧の整形。

use bill_scanner_common::{format_amount, CategoryTotal, ExtractedItem, Template};

const NAME_WIDTH: usize = 28;
const CATEGORY_WIDTH: usize = 16;

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        value.to_string()
    } else {
        let cut: String = value.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

/// 明細表（番号は1始まり）
pub fn format_items(items: &[ExtractedItem]) -> String {
    let mut lines = vec![format!(
        "  {:>3}  {:<name$}  {:<cat$}  {:>10}",
        "#",
        "Item",
        "Category",
        "Amount",
        name = NAME_WIDTH,
        cat = CATEGORY_WIDTH
    )];
    for (i, item) in items.iter().enumerate() {
        let name = if item.name.is_empty() { "(no name)" } else { &item.name };
        lines.push(format!(
            "  {:>3}  {:<name$}  {:<cat$}  {:>10}",
            i + 1,
            truncate(name, NAME_WIDTH),
            truncate(&item.category, CATEGORY_WIDTH),
            format_amount(item.amount),
            name = NAME_WIDTH,
            cat = CATEGORY_WIDTH
        ));
    }
    lines.join("\n")
}

pub fn format_category_totals(totals: &[CategoryTotal], grand_total: f64) -> String {
    let mut lines: Vec<String> = totals
        .iter()
        .map(|t| {
            format!(
                "  {:<cat$}  {:>10}",
                truncate(&t.category, CATEGORY_WIDTH),
                format_amount(t.total),
                cat = CATEGORY_WIDTH
            )
        })
        .collect();
    lines.push(format!(
        "  {:<cat$}  {:>10}",
        "Total",
        format_amount(grand_total),
        cat = CATEGORY_WIDTH
    ));
    lines.join("\n")
}

pub fn format_templates(templates: &[Template]) -> String {
    templates
        .iter()
        .map(|t| format!("  {:<12} {}\n      {}", t.id, t.name, t.categories.join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}
