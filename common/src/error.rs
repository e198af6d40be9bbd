//! エラー型定義

use thiserror::Error;

/// エラー分類（呼び出し側の表示・リトライ判断用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 入力検証エラー（ファイル種別・サイズ、カテゴリ不正など）
    Validation,
    /// 存在しないアイテム/テンプレートへの操作
    NotFound,
    /// パイプライン段の失敗・不正な出力
    Processing,
    /// IO/JSON/設定など
    Other,
}

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error ({subject}): {reason}")]
    Validation { subject: String, reason: String },

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Duplicate item id: {0}")]
    DuplicateId(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    pub fn validation(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Validation {
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation { .. } | Error::DuplicateId(_) => ErrorKind::Validation,
            Error::ItemNotFound(_) | Error::TemplateNotFound(_) => ErrorKind::NotFound,
            Error::Processing(_) => ErrorKind::Processing,
            Error::Io(_) | Error::Json(_) | Error::Config(_) => ErrorKind::Other,
        }
    }
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
