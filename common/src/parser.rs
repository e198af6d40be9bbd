//! レシートテキストパーサー
//!
//! OCRで得た自由形式のテキストから明細・日付・合計・店名を抽出する。
//! 入力テキストのみに依存する純粋関数（テスト用に決定的）。

use crate::types::{ParsedItem, ProcessedData};
use regex::Regex;

lazy_static::lazy_static! {
    // 「品名  $3.99」「品名: 3,99」形式の明細行
    static ref ITEM_RE: Regex = Regex::new(
        r"^\s*(?P<name>.*?\p{L}.*?)[\s:]+(?:[$€£¥]\s?)?(?P<amount>\d{1,3}(?:,\d{3})+(?:\.\d{1,2})?|\d+(?:[.,]\d{1,2})?)\s*$"
    ).unwrap();
    // 日付（03/15/2025, 15.03.2025, 2025-03-15）
    static ref DATE_RE: Regex = Regex::new(
        r"\b(\d{4}-\d{1,2}-\d{1,2}|\d{1,2}[/.\-]\d{1,2}[/.\-]\d{2,4})\b"
    ).unwrap();
    // 合計行（Subtotalは含まない）
    static ref TOTAL_RE: Regex = Regex::new(r"(?i)^\s*(grand\s+)?total\b").unwrap();
    // 点数行（"Total Items: 6" は合計金額ではない）
    static ref COUNT_RE: Regex = Regex::new(
        r"(?i)^\s*(total\s+(items?|qty|quantity|count|units)|(items?|units)\s+(sold|count|purchased)|no\.?\s+of\s+items)\b"
    ).unwrap();
    // 明細として扱わない集計・支払行
    static ref SUMMARY_RE: Regex = Regex::new(
        r"(?i)^\s*(sub\s*-?\s*total|balance|amount\s+due|change|cash|card|visa|mastercard|paid)\b"
    ).unwrap();
    // 区切り線
    static ref SEPARATOR_RE: Regex = Regex::new(r"^[\s\-=*_#~.]+$").unwrap();
    static ref RECEIPT_SUFFIX_RE: Regex = Regex::new(r"(?i)\s*\b(receipt|invoice|bill)\s*$").unwrap();
}

/// 金額文字列を数値に変換（"3.99", "3,99", "1,234.56", "$4"）
pub fn parse_amount(value: &str) -> Option<f64> {
    let trimmed = value
        .trim()
        .trim_start_matches(['$', '€', '£', '¥'])
        .trim();
    if trimmed.is_empty() {
        return None;
    }

    let normalized = if trimmed.contains('.') {
        trimmed.replace(',', "")
    } else if let Some(pos) = trimmed.rfind(',') {
        // カンマの後ろが1〜2桁なら小数点
        let decimals = trimmed.len() - pos - 1;
        if (1..=2).contains(&decimals) {
            format!("{}.{}", trimmed[..pos].replace(',', ""), &trimmed[pos + 1..])
        } else {
            trimmed.replace(',', "")
        }
    } else {
        trimmed.to_string()
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// 表示用に小数2桁へ丸める
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// レシートテキストをパース
///
/// - 行末が金額で品名に文字を含む行を明細とする
/// - Total行は合計として扱う（無ければ明細の合計）
/// - Subtotal/Change/Cashなどの行は無視
/// - 店名は最初の「明細でも日付でもない」行（末尾のRECEIPTを除去）
pub fn parse_receipt(text: &str) -> ProcessedData {
    let mut items = Vec::new();
    let mut date: Option<String> = None;
    let mut total: Option<f64> = None;
    let mut vendor: Option<String> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || SEPARATOR_RE.is_match(line) {
            continue;
        }

        if date.is_none() {
            if let Some(m) = DATE_RE.find(line) {
                date = Some(m.as_str().to_string());
                continue;
            }
        }

        if let Some(caps) = ITEM_RE.captures(line) {
            let name = caps["name"].trim().trim_end_matches(':').trim();
            let amount = parse_amount(&caps["amount"]);

            if COUNT_RE.is_match(name) {
                continue;
            }
            if TOTAL_RE.is_match(name) {
                if total.is_none() {
                    total = amount;
                }
                continue;
            }
            if SUMMARY_RE.is_match(name) {
                continue;
            }
            if let Some(amount) = amount {
                items.push(ParsedItem::new(name, amount));
                continue;
            }
        }

        if vendor.is_none() && is_vendor_candidate(line) {
            let name = RECEIPT_SUFFIX_RE.replace(line, "").trim().to_string();
            if !name.is_empty() {
                vendor = Some(name);
            }
        }
    }

    let total = total.unwrap_or_else(|| round_cents(items.iter().map(|i| i.amount).sum()));

    ProcessedData {
        items,
        date: date.unwrap_or_default(),
        total,
        vendor: vendor.unwrap_or_default(),
    }
}

fn is_vendor_candidate(line: &str) -> bool {
    let starts_with_digit = line.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(true);
    !starts_with_digit && line.chars().any(|c| c.is_alphabetic())
}
