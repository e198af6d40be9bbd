//! 設定からパイプライン・ワークフローを組み立てて一括実行する

use crate::config::Config;
use crate::error::{BillScanError, Result};
use crate::intake::{loader, ImageIntake};
use crate::pipeline::mock::{
    CatalogTemplateSource, KeywordCategorizer, Latency, MockTextExtractor, PassthroughEnhancer,
    RuleItemParser,
};
use crate::pipeline::{CancelToken, CommandTextExtractor, Pipeline, TextExtractor};
use crate::report::BillReport;
use crate::workflow::Workflow;
use bill_scanner_common::TemplateCatalog;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// 設定のカスタムカタログ（無ければ組み込み）
pub fn load_catalog(config: &Config) -> Result<TemplateCatalog> {
    match &config.templates_file {
        Some(path) => {
            if !path.is_file() {
                return Err(BillScanError::FileNotFound(path.display().to_string()));
            }
            let catalog = TemplateCatalog::from_file(path)?;
            info!(path = %path.display(), templates = catalog.len(), "カスタムテンプレート読み込み");
            Ok(catalog)
        }
        None => Ok(TemplateCatalog::builtin()),
    }
}

/// OCRコマンドが設定されていれば外部コマンド、無ければ参照OCR
pub fn build_pipeline(
    config: &Config,
    catalog: Arc<TemplateCatalog>,
    latency: Latency,
) -> Result<Pipeline> {
    let extractor: Arc<dyn TextExtractor> = match &config.ocr_command {
        Some(command) => Arc::new(CommandTextExtractor::from_command_line(command)?),
        None => Arc::new(MockTextExtractor::new(latency.extract)),
    };

    Ok(Pipeline::new(
        extractor,
        Arc::new(RuleItemParser::new(latency.parse)),
        Arc::new(KeywordCategorizer::new(catalog, latency.categorize)),
    )
    .with_stage_timeout(config.stage_timeout()))
}

#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub inputs: Vec<PathBuf>,
    pub template: Option<String>,
    pub select: Option<usize>,
    pub recursive: bool,
    pub latency: Latency,
}

#[derive(Debug)]
pub struct ProcessOutcome {
    pub report: BillReport,
    /// 取り込めなかったファイルの理由
    pub rejected: Vec<String>,
}

/// 画像読み込み → 補正 → テンプレート選択 → 解析 を通しで実行
pub async fn process_images(
    config: &Config,
    options: &ProcessOptions,
    cancel: &CancelToken,
    progress: &dyn Fn(&str),
) -> Result<ProcessOutcome> {
    let catalog = Arc::new(load_catalog(config)?);
    let pipeline = build_pipeline(config, catalog.clone(), options.latency)?;
    let mut workflow = Workflow::new(pipeline, ImageIntake::new(config.max_image_bytes));

    progress("テンプレートを読み込み中...");
    let source = CatalogTemplateSource::new(catalog, options.latency.templates);
    workflow.load_templates(&source).await?;

    if let Some(id) = &options.template {
        workflow.select_template(id)?;
    } else if let Some(id) = &config.default_template {
        if let Err(e) = workflow.select_template(id) {
            warn!(error = %e, "既定テンプレートが見つからないため先頭を使用");
        }
    }

    progress("画像を読み込み中...");
    let loaded = loader::load_paths(&options.inputs, options.recursive, config.max_image_bytes)?;
    let intake = workflow.add_images(loaded.images);
    let rejected: Vec<String> = loaded
        .rejected
        .iter()
        .chain(&intake.rejected)
        .map(|e| e.to_string())
        .collect();
    if intake.accepted.is_empty() {
        return Err(BillScanError::NoImagesFound(rejected.join("; ")));
    }

    progress("画像を補正中...");
    let enhanced = workflow
        .enhance_images(&PassthroughEnhancer::new(options.latency.enhance))
        .await;
    for (index, reason) in &enhanced.failed {
        warn!(index, reason = %reason, "補正に失敗した画像");
    }

    if let Some(index) = options.select {
        workflow.select_image(index)?;
    }

    progress("解析中...");
    workflow.process(cancel).await?;

    let report = BillReport::from_workflow(&workflow)?;
    Ok(ProcessOutcome { report, rejected })
}
