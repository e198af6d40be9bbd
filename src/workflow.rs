//! 画面遷移（アップロード → テンプレート選択 → 編集）
//!
//! 画像取り込み・パイプライン・アイテムストアをまとめ、前提が揃ったときだけ次へ進める。
//! 結果は `Result` で返し、同じ内容を `WorkflowEvent` としても通知する。

use crate::error::{BillScanError, Result};
use crate::intake::{EnhanceReport, ImageData, ImageIntake, IntakeReport, RemoveOutcome, Selection};
use crate::pipeline::{CancelToken, ImageEnhancer, Pipeline, TemplateSource};
use bill_scanner_common::{
    CategoryTotal, ErrorKind, ExtractedItem, ItemDraft, ItemField, ItemStore, ProcessedData,
    ProcessedText, Template,
};
use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Step {
    Upload,
    Template,
    Edit,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Step::Upload => "アップロード",
            Step::Template => "テンプレート選択",
            Step::Edit => "明細編集",
        };
        f.write_str(label)
    }
}

/// 通知
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    ImagesAdded { accepted: usize },
    ImageRejected { reason: String },
    ImageEnhanced { index: usize },
    ImageFailed { index: usize, reason: String },
    SelectionChanged(Selection),
    SelectionCleared,
    TemplatesLoaded { count: usize },
    TemplateSelected { id: String },
    StepChanged { from: Step, to: Step },
    ProcessingStarted,
    ProcessingSucceeded { items: usize, total: f64 },
    ProcessingFailed { kind: ErrorKind, message: String },
    ItemsChanged { count: usize, total: f64 },
}

pub struct Workflow {
    step: Step,
    intake: ImageIntake,
    templates: Vec<Template>,
    template: Option<Template>,
    store: ItemStore,
    text: Option<ProcessedText>,
    receipt: Option<ProcessedData>,
    pipeline: Pipeline,
    events: Option<mpsc::UnboundedSender<WorkflowEvent>>,
}

impl Workflow {
    pub fn new(pipeline: Pipeline, intake: ImageIntake) -> Self {
        Self {
            step: Step::Upload,
            intake,
            templates: Vec::new(),
            template: None,
            store: ItemStore::new(Vec::new()),
            text: None,
            receipt: None,
            pipeline,
            events: None,
        }
    }

    /// 通知を受け取る（再購読すると前の受信側は閉じる）
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<WorkflowEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    fn emit(&self, event: WorkflowEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn intake(&self) -> &ImageIntake {
        &self.intake
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn template(&self) -> Option<&Template> {
        self.template.as_ref()
    }

    pub fn store(&self) -> &ItemStore {
        &self.store
    }

    pub fn items(&self) -> &[ExtractedItem] {
        self.store.items()
    }

    /// 直近の解析で得たOCRテキスト
    pub fn text(&self) -> Option<&ProcessedText> {
        self.text.as_ref()
    }

    /// 直近の解析で得た店名・日付・合計
    pub fn receipt(&self) -> Option<&ProcessedData> {
        self.receipt.as_ref()
    }

    pub fn is_processing(&self) -> bool {
        self.pipeline.is_busy()
    }

    fn set_step(&mut self, to: Step) {
        if self.step != to {
            let from = self.step;
            self.step = to;
            info!(%from, %to, "画面遷移");
            self.emit(WorkflowEvent::StepChanged { from, to });
        }
    }

    // ---- テンプレート ----

    /// テンプレートを取得し、先頭を選択状態にする
    pub async fn load_templates(&mut self, source: &dyn TemplateSource) -> Result<&[Template]> {
        let templates = source.fetch_templates().await?;
        self.emit(WorkflowEvent::TemplatesLoaded {
            count: templates.len(),
        });
        self.templates = templates;

        if let Some(first) = self.templates.first().map(|t| t.id.clone()) {
            self.select_template(&first)?;
        }
        Ok(&self.templates)
    }

    /// テンプレートを選択し、アイテムストアのカテゴリを切り替える
    ///
    /// 新しいテンプレートに無いカテゴリの明細は `Uncategorized` になる。
    pub fn select_template(&mut self, id: &str) -> Result<&Template> {
        let template = self
            .templates
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| bill_scanner_common::Error::TemplateNotFound(id.to_string()))?;

        let reassigned = self.store.set_categories(template.categories.clone());
        self.emit(WorkflowEvent::TemplateSelected {
            id: template.id.clone(),
        });
        if reassigned > 0 {
            debug!(reassigned, template = %template.id, "カテゴリを未分類に戻しました");
            self.items_changed();
        }
        Ok(&*self.template.insert(template))
    }

    // ---- 画像 ----

    pub fn add_images(&mut self, files: Vec<ImageData>) -> IntakeReport {
        let report = self.intake.add_images(files);
        if !report.accepted.is_empty() {
            self.emit(WorkflowEvent::ImagesAdded {
                accepted: report.accepted.len(),
            });
        }
        for e in &report.rejected {
            self.emit(WorkflowEvent::ImageRejected {
                reason: e.to_string(),
            });
        }
        report
    }

    /// 補正を実行（未選択なら最初に完了した画像を選択する）
    pub async fn enhance_images(&mut self, enhancer: &dyn ImageEnhancer) -> EnhanceReport {
        let report = self.intake.enhance_pending(enhancer).await;

        for &index in &report.processed {
            self.emit(WorkflowEvent::ImageEnhanced { index });
        }
        for (index, reason) in &report.failed {
            self.emit(WorkflowEvent::ImageFailed {
                index: *index,
                reason: reason.clone(),
            });
        }
        if let Some(selection) = report.auto_selected.clone() {
            self.on_selection(selection);
        }
        report
    }

    pub fn select_image(&mut self, index: usize) -> Result<Selection> {
        let selection = self.intake.select(index)?;
        self.on_selection(selection.clone());
        Ok(selection)
    }

    pub fn remove_image(&mut self, index: usize) -> Result<RemoveOutcome> {
        let was_selected = self.intake.selected_index() == Some(index);
        let outcome = self.intake.remove(index)?;

        match &outcome.moved_to {
            Some(selection) => self.on_selection(selection.clone()),
            None if was_selected => {
                self.emit(WorkflowEvent::SelectionCleared);
                if self.step != Step::Upload {
                    self.set_step(Step::Upload);
                }
            }
            None => {}
        }
        Ok(outcome)
    }

    /// 補正済みの画像が選ばれたらテンプレート選択へ進む
    fn on_selection(&mut self, selection: Selection) {
        let ready = selection.enhanced.is_some();
        self.emit(WorkflowEvent::SelectionChanged(selection));
        if ready && self.step == Step::Upload {
            self.set_step(Step::Template);
        }
    }

    // ---- 解析 ----

    /// 選択中の画像とテンプレートで解析し、成功したら編集へ進む
    ///
    /// 失敗時はアイテムストアを変更せずテンプレート選択に留まる。
    pub async fn process(&mut self, cancel: &CancelToken) -> Result<&[ExtractedItem]> {
        let selection = self.intake.selection().ok_or(BillScanError::NoActiveImage)?;
        let template = self.template.clone().ok_or(BillScanError::NoTemplate)?;
        let image = selection.enhanced.unwrap_or(selection.original);

        self.emit(WorkflowEvent::ProcessingStarted);
        let result = match self.pipeline.run(&image, &template, cancel).await {
            Ok(output) => self
                .store
                .replace_all(output.items)
                .map(|()| (output.text, output.data))
                .map_err(BillScanError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok((text, data)) => {
                self.text = Some(text);
                self.receipt = Some(data);
                self.emit(WorkflowEvent::ProcessingSucceeded {
                    items: self.store.len(),
                    total: self.store.total(),
                });
                self.set_step(Step::Edit);
                Ok(self.store.items())
            }
            Err(e) => {
                error!(error = %e, "解析失敗");
                self.emit(WorkflowEvent::ProcessingFailed {
                    kind: e.kind(),
                    message: e.to_string(),
                });
                self.set_step(Step::Template);
                Err(e)
            }
        }
    }

    /// 画面を移動（戻るのは常に可、進むには前提が必要）
    pub fn navigate(&mut self, to: Step) -> Result<()> {
        if to > Step::Upload && self.intake.selection().is_none() {
            return Err(BillScanError::StepBlocked {
                to,
                reason: "画像が選択されていません".into(),
            });
        }
        if to == Step::Edit {
            if self.template.is_none() {
                return Err(BillScanError::StepBlocked {
                    to,
                    reason: "テンプレートが選択されていません".into(),
                });
            }
            if self.store.is_empty() {
                return Err(BillScanError::StepBlocked {
                    to,
                    reason: "明細がありません".into(),
                });
            }
        }
        self.set_step(to);
        Ok(())
    }

    // ---- 明細編集 ----

    fn items_changed(&self) {
        self.emit(WorkflowEvent::ItemsChanged {
            count: self.store.len(),
            total: self.store.total(),
        });
    }

    pub fn add_item(&mut self) -> ExtractedItem {
        let item = self.store.add_item().clone();
        self.items_changed();
        item
    }

    pub fn update_item(&mut self, id: &str, field: ItemField) -> Result<ExtractedItem> {
        let item = self.store.update_item(id, field)?.clone();
        self.items_changed();
        Ok(item)
    }

    pub fn delete_item(&mut self, id: &str) -> Result<ExtractedItem> {
        let item = self.store.delete_item(id)?;
        self.items_changed();
        Ok(item)
    }

    pub fn begin_edit(&self, id: &str) -> Result<ItemDraft> {
        Ok(self.store.begin_edit(id)?)
    }

    pub fn commit_edit(&mut self, draft: ItemDraft) -> Result<ExtractedItem> {
        let item = self.store.commit_edit(draft)?.clone();
        self.items_changed();
        Ok(item)
    }

    pub fn total(&self) -> f64 {
        self.store.total()
    }

    pub fn category_totals(&self) -> Vec<CategoryTotal> {
        self.store.category_totals()
    }
}
