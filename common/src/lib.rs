//! Bill Scanner Common Library
//!
//! レシート解析のドメインコア（I/Oなし・同期）:
//! テンプレートカタログ、テキストパーサー、カテゴリ付与、アイテムストア、集計

pub mod types;
pub mod catalog;
pub mod parser;
pub mod categorize;
pub mod store;
pub mod aggregate;
pub mod error;
pub mod export;

pub use types::{ExtractedItem, ParsedItem, ProcessedData, ProcessedText, Template, UNCATEGORIZED};
pub use catalog::{match_category, KeywordRule, TemplateCatalog};
pub use parser::{parse_amount, parse_receipt, round_cents};
pub use categorize::categorize_items;
pub use store::{new_item_id, ItemDraft, ItemField, ItemStore};
pub use aggregate::{category_totals, format_amount, total, CategoryTotal};
pub use error::{Error, ErrorKind, Result};
