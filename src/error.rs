use crate::pipeline::Stage;
use crate::workflow::Step;
use bill_scanner_common::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BillScanError {
    #[error(transparent)]
    Common(#[from] bill_scanner_common::Error),

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("画像が見つかりません: {0}")]
    NoImagesFound(String),

    #[error("画像が存在しません: index {index} (画像数 {len})")]
    ImageNotFound { index: usize, len: usize },

    #[error("{stage}の処理に失敗: {reason}")]
    Stage { stage: Stage, reason: String },

    #[error("{stage}がタイムアウトしました ({seconds}秒)")]
    Timeout { stage: Stage, seconds: u64 },

    #[error("{0}の処理がキャンセルされました")]
    Cancelled(Stage),

    #[error("解析処理が実行中です")]
    Busy,

    #[error("画像を選択してください")]
    NoActiveImage,

    #[error("テンプレートを選択してください")]
    NoTemplate,

    #[error("{to}へ進めません: {reason}")]
    StepBlocked { to: Step, reason: String },

    #[error("入力エラー: {0}")]
    Prompt(String),

    #[error("Excel生成エラー: {0}")]
    ExcelGeneration(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

impl BillScanError {
    pub fn stage(stage: Stage, reason: impl Into<String>) -> Self {
        BillScanError::Stage {
            stage,
            reason: reason.into(),
        }
    }

    /// 入力検証・未検出・処理失敗の分類
    pub fn kind(&self) -> ErrorKind {
        match self {
            BillScanError::Common(e) => e.kind(),
            BillScanError::ImageNotFound { .. } => ErrorKind::NotFound,
            BillScanError::Stage { .. }
            | BillScanError::Timeout { .. }
            | BillScanError::Cancelled(_)
            | BillScanError::Busy => ErrorKind::Processing,
            BillScanError::NoActiveImage
            | BillScanError::NoTemplate
            | BillScanError::StepBlocked { .. } => ErrorKind::Validation,
            _ => ErrorKind::Other,
        }
    }
}

pub type Result<T> = std::result::Result<T, BillScanError>;
