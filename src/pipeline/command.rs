//! 外部OCRコマンドによるテキスト抽出
//!
//! `tesseract {input} stdout` のようなコマンドを起動し、標準出力をテキストとして受け取る。
//! `{input}` は一時ファイルのパスに置き換わる（無ければ末尾に追加）。

use super::backend::TextExtractor;
use super::Stage;
use crate::error::{BillScanError, Result};
use crate::intake::ImageData;
use async_trait::async_trait;
use bill_scanner_common::ProcessedText;
use tokio::process::Command;
use tracing::debug;

const INPUT_PLACEHOLDER: &str = "{input}";

#[derive(Debug, Clone)]
pub struct CommandTextExtractor {
    program: String,
    args: Vec<String>,
}

impl CommandTextExtractor {
    /// コマンドライン文字列から作成（空白区切り）
    pub fn from_command_line(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(|s| s.to_string());
        let program = parts
            .next()
            .ok_or_else(|| BillScanError::Config("OCRコマンドが空です".into()))?;
        let mut args: Vec<String> = parts.collect();
        if !args.iter().any(|a| a.contains(INPUT_PLACEHOLDER)) {
            args.push(INPUT_PLACEHOLDER.to_string());
        }
        Ok(Self { program, args })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn args_for(&self, input: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.replace(INPUT_PLACEHOLDER, input))
            .collect()
    }
}

#[async_trait]
impl TextExtractor for CommandTextExtractor {
    async fn extract_text(&self, image: &ImageData) -> Result<ProcessedText> {
        if image.bytes.is_empty() {
            return Err(BillScanError::stage(Stage::Extract, "画像データが空です"));
        }

        let digest = image.digest();
        let temp_path = std::env::temp_dir().join(format!(
            "bill-scan-{}.{}",
            &digest[..16],
            image.extension()
        ));
        tokio::fs::write(&temp_path, &image.bytes).await?;

        let args = self.args_for(&temp_path.to_string_lossy());
        debug!(program = %self.program, ?args, "OCRコマンド実行");
        let output = Command::new(&self.program).args(&args).output().await;
        let _ = tokio::fs::remove_file(&temp_path).await;

        let output = output.map_err(|e| {
            BillScanError::stage(Stage::Extract, format!("{} の起動に失敗: {}", self.program, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BillScanError::stage(
                Stage::Extract,
                format!(
                    "{} が失敗しました (exit code: {:?}): {}",
                    self.program,
                    output.status.code(),
                    stderr.trim()
                ),
            ));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(ProcessedText {
            confidence: estimate_confidence(&text),
            text,
        })
    }
}

/// テキストの品質から信頼度を推定（0.0〜1.0）
///
/// 読める文字の割合を基本に、短すぎる・語数が少ないテキストは下げる。
pub fn estimate_confidence(text: &str) -> f64 {
    let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    if chars.is_empty() {
        return 0.0;
    }

    let readable = chars
        .iter()
        .filter(|c| c.is_alphanumeric() || "$.,:-/#%&()".contains(**c))
        .count();
    let mut confidence = readable as f64 / chars.len() as f64;

    if text.len() < 50 {
        confidence *= 0.8;
    }
    if text.split_whitespace().count() < 10 {
        confidence *= 0.8;
    }

    confidence.clamp(0.0, 1.0)
}
