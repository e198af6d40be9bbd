use crate::error::{BillScanError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 画像1枚あたりの上限（10MB）
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 起動時に選択するテンプレートID（未設定ならカタログ先頭）
    pub default_template: Option<String>,
    /// カスタムテンプレートカタログ（JSON）
    pub templates_file: Option<PathBuf>,
    /// 外部OCRコマンド（例: "tesseract {input} stdout"）
    pub ocr_command: Option<String>,
    pub max_image_bytes: u64,
    /// 各段のタイムアウト（0で無効）
    pub stage_timeout_seconds: u64,
    /// 参照バックエンドの待ち時間を再現するか
    pub simulated_latency: bool,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_template: None,
            templates_file: None,
            ocr_command: None,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            stage_timeout_seconds: 30,
            simulated_latency: true,
            log_level: "info".into(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            serde_json::from_str::<Config>(&content)?
        } else {
            Self::default()
        };

        // 環境変数を優先
        if let Ok(command) = std::env::var("BILL_SCAN_OCR_COMMAND") {
            if !command.trim().is_empty() {
                config.ocr_command = Some(command);
            }
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| BillScanError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("bill-scanner").join("config.json"))
    }

    pub fn stage_timeout(&self) -> Option<Duration> {
        if self.stage_timeout_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.stage_timeout_seconds))
        }
    }

    pub fn set_default_template(&mut self, id: String) -> Result<()> {
        self.default_template = Some(id);
        self.save()
    }

    pub fn set_ocr_command(&mut self, command: String) -> Result<()> {
        self.ocr_command = if command.trim().is_empty() { None } else { Some(command) };
        self.save()
    }

    pub fn set_stage_timeout(&mut self, seconds: u64) -> Result<()> {
        self.stage_timeout_seconds = seconds;
        self.save()
    }
}
