//! 解析パイプライン
//!
//! テキスト抽出 → 明細パース → カテゴリ付与 を順番に実行する。
//! 各段はタイムアウトとキャンセルで包まれ、出力は次の段に渡す前に検証する。

pub mod backend;
pub mod command;
pub mod mock;

pub use backend::{Categorizer, ImageEnhancer, ItemParser, TemplateSource, TextExtractor};
pub use command::CommandTextExtractor;

use crate::error::{BillScanError, Result};
use crate::intake::ImageData;
use bill_scanner_common::{
    ExtractedItem, ParsedItem, ProcessedData, ProcessedText, Template, UNCATEGORIZED,
};
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// 処理段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Templates,
    Enhance,
    Extract,
    Parse,
    Categorize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Templates => "テンプレート取得",
            Stage::Enhance => "画像補正",
            Stage::Extract => "テキスト抽出",
            Stage::Parse => "明細パース",
            Stage::Categorize => "カテゴリ付与",
        };
        f.write_str(label)
    }
}

/// 協調キャンセル用トークン
///
/// クローンはすべて同じ状態を共有する。
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// キャンセルされるまで待つ
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// パイプライン1回分の結果
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub text: ProcessedText,
    pub data: ProcessedData,
    pub items: Vec<ExtractedItem>,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| BillScanError::Busy)?;
        Ok(Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Pipeline {
    extractor: Arc<dyn TextExtractor>,
    parser: Arc<dyn ItemParser>,
    categorizer: Arc<dyn Categorizer>,
    stage_timeout: Option<Duration>,
    busy: AtomicBool,
}

impl Pipeline {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        parser: Arc<dyn ItemParser>,
        categorizer: Arc<dyn Categorizer>,
    ) -> Self {
        Self {
            extractor,
            parser,
            categorizer,
            stage_timeout: None,
            busy: AtomicBool::new(false),
        }
    }

    pub fn with_stage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stage_timeout = timeout;
        self
    }

    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout
    }

    /// 実行中か
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// 3段を順番に実行
    ///
    /// 実行中の再呼び出しは `Busy` で拒否する。
    pub async fn run(
        &self,
        image: &ImageData,
        template: &Template,
        cancel: &CancelToken,
    ) -> Result<PipelineOutput> {
        let _guard = BusyGuard::acquire(&self.busy)?;
        let started = Instant::now();
        info!(image = %image.file_name, template = %template.id, "解析開始");

        let text = self.extract_text(image, cancel).await?;
        let data = self.parse_items(&text.text, &template.categories, cancel).await?;
        let items = self.categorize(&data.items, template, cancel).await?;

        info!(
            items = items.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "解析完了"
        );
        Ok(PipelineOutput { text, data, items })
    }

    pub async fn extract_text(
        &self,
        image: &ImageData,
        cancel: &CancelToken,
    ) -> Result<ProcessedText> {
        if image.bytes.is_empty() {
            return Err(BillScanError::stage(Stage::Extract, "画像データがありません"));
        }

        let text = run_stage(
            Stage::Extract,
            self.stage_timeout,
            cancel,
            self.extractor.extract_text(image),
        )
        .await?;

        if !text.confidence.is_finite() || !(0.0..=1.0).contains(&text.confidence) {
            return Err(BillScanError::stage(
                Stage::Extract,
                format!("信頼度が範囲外です: {}", text.confidence),
            ));
        }
        if text.text.trim().is_empty() {
            return Err(BillScanError::stage(Stage::Extract, "テキストを抽出できませんでした"));
        }
        debug!(confidence = text.confidence, chars = text.text.len(), "抽出結果");
        Ok(text)
    }

    pub async fn parse_items(
        &self,
        text: &str,
        categories: &[String],
        cancel: &CancelToken,
    ) -> Result<ProcessedData> {
        if text.trim().is_empty() {
            return Err(BillScanError::stage(Stage::Parse, "テキストがありません"));
        }

        let data = run_stage(
            Stage::Parse,
            self.stage_timeout,
            cancel,
            self.parser.parse_items(text, categories),
        )
        .await?;

        if data.items.is_empty() {
            return Err(BillScanError::stage(Stage::Parse, "明細が見つかりません"));
        }
        if let Some(item) = data.items.iter().find(|i| !i.amount.is_finite()) {
            return Err(BillScanError::stage(
                Stage::Parse,
                format!("金額が不正です: {}", item.name),
            ));
        }
        if !data.total.is_finite() {
            return Err(BillScanError::stage(Stage::Parse, "合計金額が不正です"));
        }
        Ok(data)
    }

    pub async fn categorize(
        &self,
        items: &[ParsedItem],
        template: &Template,
        cancel: &CancelToken,
    ) -> Result<Vec<ExtractedItem>> {
        if template.id.trim().is_empty() {
            return Err(BillScanError::stage(Stage::Categorize, "テンプレートがありません"));
        }

        let mut result = run_stage(
            Stage::Categorize,
            self.stage_timeout,
            cancel,
            self.categorizer.categorize(items, template),
        )
        .await?;

        validate_categorized(items, template, &mut result)?;
        Ok(result)
    }
}

/// 件数・ID・金額を検証し、テンプレート外のカテゴリを未分類にする
fn validate_categorized(
    input: &[ParsedItem],
    template: &Template,
    items: &mut [ExtractedItem],
) -> Result<()> {
    if items.len() != input.len() {
        return Err(BillScanError::stage(
            Stage::Categorize,
            format!("件数が一致しません (入力 {} / 出力 {})", input.len(), items.len()),
        ));
    }

    let mut seen = HashSet::new();
    for item in items.iter_mut() {
        if item.id.is_empty() || !seen.insert(item.id.clone()) {
            return Err(BillScanError::stage(
                Stage::Categorize,
                format!("IDが不正です: '{}'", item.id),
            ));
        }
        if !item.amount.is_finite() {
            return Err(BillScanError::stage(
                Stage::Categorize,
                format!("金額が不正です: {}", item.name),
            ));
        }
        if item.category != UNCATEGORIZED && !template.has_category(&item.category) {
            warn!(item = %item.name, category = %item.category, "テンプレート外のカテゴリ");
            item.category = UNCATEGORIZED.to_string();
        }
    }
    Ok(())
}

/// 1段をタイムアウト・キャンセル付きで実行
///
/// バックエンドのエラーはその段の処理エラーにまとめる。
pub async fn run_stage<T, F>(
    stage: Stage,
    timeout: Option<Duration>,
    cancel: &CancelToken,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(BillScanError::Cancelled(stage));
    }

    let started = Instant::now();
    debug!(%stage, "開始");

    let result = tokio::select! {
        _ = cancel.cancelled() => Err(BillScanError::Cancelled(stage)),
        result = with_timeout(stage, timeout, fut) => result,
    };

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(value) => {
            info!(%stage, elapsed_ms, "完了");
            Ok(value)
        }
        Err(e) => {
            warn!(%stage, elapsed_ms, error = %e, "失敗");
            Err(into_stage_error(stage, e))
        }
    }
}

async fn with_timeout<T, F>(stage: Stage, timeout: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| BillScanError::Timeout {
                stage,
                seconds: limit.as_secs(),
            })?,
        None => fut.await,
    }
}

fn into_stage_error(stage: Stage, error: BillScanError) -> BillScanError {
    match error {
        e @ (BillScanError::Stage { .. }
        | BillScanError::Timeout { .. }
        | BillScanError::Cancelled(_)) => e,
        other => BillScanError::stage(stage, other.to_string()),
    }
}
