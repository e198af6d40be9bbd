//! Bill Scanner
//!
//! レシート画像の取り込み・OCR・明細分類・編集。
//! ドメインの中核（パーサー・アイテムストア・集計）は `bill_scanner_common` にある。

pub mod app;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod intake;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod review;
pub mod workflow;
