//! ワークフローの統合テスト
//!
//! 画像取り込み → テンプレート選択 → 解析 → 明細編集 を通しで検証

use bill_scanner::app::{self, ProcessOptions};
use bill_scanner::config::Config;
use bill_scanner::error::BillScanError;
use bill_scanner::intake::{ImageData, ImageIntake};
use bill_scanner::pipeline::mock::{
    CatalogTemplateSource, KeywordCategorizer, Latency, MockTextExtractor, PassthroughEnhancer,
    RuleItemParser,
};
use bill_scanner::pipeline::{CancelToken, Pipeline};
use bill_scanner::report::BillReport;
use bill_scanner::workflow::{Step, Workflow, WorkflowEvent};
use bill_scanner_common::{ErrorKind, ItemField, TemplateCatalog};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0x0d];

fn workflow_with_text(text: &str) -> Workflow {
    let catalog = Arc::new(TemplateCatalog::builtin());
    let pipeline = Pipeline::new(
        Arc::new(MockTextExtractor::default().with_text(text, 0.9)),
        Arc::new(RuleItemParser::default()),
        Arc::new(KeywordCategorizer::new(catalog, Duration::ZERO)),
    );
    Workflow::new(pipeline, ImageIntake::default())
}

async fn ready_workflow(text: &str, images: &[&str]) -> Workflow {
    let mut workflow = workflow_with_text(text);
    let source = CatalogTemplateSource::new(Arc::new(TemplateCatalog::builtin()), Duration::ZERO);
    workflow.load_templates(&source).await.unwrap();
    workflow.add_images(
        images
            .iter()
            .map(|name| ImageData::new(*name, PNG_MAGIC.to_vec()))
            .collect(),
    );
    workflow
        .enhance_images(&PassthroughEnhancer::default())
        .await;
    workflow
}

fn no_delay_config() -> Config {
    Config {
        simulated_latency: false,
        ocr_command: None,
        templates_file: None,
        default_template: None,
        ..Default::default()
    }
}

/// 2品目のテキストがMilk→Dairy、Bread→Bakery、合計6.48になる
#[tokio::test]
async fn test_minimal_receipt_end_to_end() {
    let mut workflow = ready_workflow("Milk $3.99\nBread $2.49", &["receipt.png"]).await;
    workflow.select_template("grocery").unwrap();

    let items = workflow.process(&CancelToken::new()).await.unwrap().to_vec();

    assert_eq!(items.len(), 2);
    assert_eq!((items[0].name.as_str(), items[0].category.as_str()), ("Milk", "Dairy"));
    assert_eq!((items[1].name.as_str(), items[1].category.as_str()), ("Bread", "Bakery"));
    assert_ne!(items[0].id, items[1].id);
    assert!((workflow.total() - 6.48).abs() < 1e-9);
    assert_eq!(workflow.step(), Step::Edit);

    let report = BillReport::from_workflow(&workflow).unwrap();
    assert_eq!(report.total, 6.48);
    assert_eq!(report.source.unwrap().file_name, "receipt.png");
}

/// 明細が無い状態では画像・テンプレートがあっても編集へ進めない
#[tokio::test]
async fn test_edit_rejected_with_zero_items() {
    let mut workflow = ready_workflow("Milk $3.99", &["a.png"]).await;
    assert!(workflow.intake().selection().is_some());
    assert!(workflow.template().is_some());

    let err = workflow.navigate(Step::Edit).unwrap_err();
    assert!(matches!(err, BillScanError::StepBlocked { to: Step::Edit, .. }));

    // 解析後に全削除しても同じ
    workflow.process(&CancelToken::new()).await.unwrap();
    let ids: Vec<String> = workflow.items().iter().map(|i| i.id.clone()).collect();
    for id in ids {
        workflow.delete_item(&id).unwrap();
    }
    workflow.navigate(Step::Template).unwrap();
    assert!(workflow.navigate(Step::Edit).is_err());
}

/// サイズ超過・画像以外は拒否され、同じバッチの正常な画像は追加される
#[tokio::test]
async fn test_invalid_uploads_do_not_block_siblings() {
    let mut workflow = workflow_with_text("Milk $3.99");
    let mut events = workflow.subscribe();
    let max = workflow.intake().max_bytes() as usize;

    let report = workflow.add_images(vec![
        ImageData::new("ok.png", PNG_MAGIC.to_vec()),
        ImageData::with_mime("huge.jpg", "image/jpeg", vec![0; max + 1]),
        ImageData::new("notes.txt", b"plain text".to_vec()),
        ImageData::new("ok2.png", PNG_MAGIC.to_vec()),
    ]);

    assert_eq!(report.accepted.len(), 2);
    assert_eq!(report.rejected.len(), 2);
    assert!(report.rejected.iter().all(|e| e.kind() == ErrorKind::Validation));
    assert_eq!(workflow.intake().len(), 2);

    let mut rejected_events = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, WorkflowEvent::ImageRejected { .. }) {
            rejected_events += 1;
        }
    }
    assert_eq!(rejected_events, 2);
}

/// 選択中の画像を削除すると有効な選択が残り、通知内容と一致する
#[tokio::test]
async fn test_remove_selected_image_notifies_new_selection() {
    let mut workflow = ready_workflow("Milk $3.99", &["a.png", "b.png", "c.png"]).await;
    workflow.select_image(1).unwrap();
    let mut events = workflow.subscribe();

    let outcome = workflow.remove_image(1).unwrap();
    let moved = outcome.moved_to.expect("選択が移るはず");

    let current = workflow.intake().selection().unwrap();
    assert_eq!(current, moved);
    assert!(current.index < workflow.intake().len());

    let notified = std::iter::from_fn(|| events.try_recv().ok()).find_map(|e| match e {
        WorkflowEvent::SelectionChanged(selection) => Some(selection),
        _ => None,
    });
    assert_eq!(notified, Some(current));
}

/// 追加・削除を繰り返してもIDは一意、残りの順序は保たれる
#[tokio::test]
async fn test_add_delete_sequence_keeps_ids_unique() {
    let mut workflow = ready_workflow("Milk $3.99", &["a.png"]).await;

    let mut expected = Vec::new();
    for i in 0..10 {
        let item = workflow.add_item();
        workflow
            .update_item(&item.id, ItemField::Amount(i as f64))
            .unwrap();
        expected.push(item.id);
        if i % 3 == 0 {
            let removed = expected.remove(0);
            workflow.delete_item(&removed).unwrap();
        }
    }

    let ids: Vec<String> = workflow.items().iter().map(|i| i.id.clone()).collect();
    assert_eq!(ids, expected);
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), ids.len());

    let sum: f64 = workflow.items().iter().map(|i| i.amount).sum();
    assert_eq!(workflow.total(), sum);
    assert_eq!(workflow.total(), workflow.total());
}

/// カテゴリ別小計のキーは明細のカテゴリと一致する
#[tokio::test]
async fn test_category_totals_match_items() {
    let mut workflow = ready_workflow(
        bill_scanner::pipeline::mock::SAMPLE_RECEIPT,
        &["receipt.png"],
    )
    .await;
    workflow.process(&CancelToken::new()).await.unwrap();

    let totals = workflow.category_totals();
    let keys: HashSet<&str> = totals.iter().map(|t| t.category.as_str()).collect();
    let present: HashSet<&str> = workflow.items().iter().map(|i| i.category.as_str()).collect();
    assert_eq!(keys, present);

    for total in &totals {
        let expected: f64 = workflow
            .items()
            .iter()
            .filter(|i| i.category == total.category)
            .map(|i| i.amount)
            .sum();
        assert_eq!(total.total, expected);
    }
}

/// 不明なIDの更新は明示的にNotFound
#[tokio::test]
async fn test_update_unknown_item_is_not_found() {
    let mut workflow = ready_workflow("Milk $3.99", &["a.png"]).await;
    let err = workflow
        .update_item("item-missing", ItemField::Name("x".into()))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

/// テンプレート外のカテゴリへの変更は検証エラー
#[tokio::test]
async fn test_update_category_outside_template() {
    let mut workflow = ready_workflow("Milk $3.99", &["a.png"]).await;
    let item = workflow.add_item();
    let err = workflow
        .update_item(&item.id, ItemField::Category("Beverages".into()))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

/// 組み込みテンプレートは空でない
#[test]
fn test_builtin_templates_are_not_empty() {
    let catalog = TemplateCatalog::builtin();
    assert!(!catalog.is_empty());
    for template in catalog.templates() {
        assert!(!template.categories.is_empty(), "{} has no categories", template.id);
    }
}

/// ファイルからの一括実行
#[tokio::test]
async fn test_process_images_from_folder() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("b.png"), PNG_MAGIC).unwrap();
    std::fs::write(dir.path().join("a.png"), PNG_MAGIC).unwrap();
    std::fs::write(dir.path().join("readme.txt"), b"ignored").unwrap();

    let options = ProcessOptions {
        inputs: vec![dir.path().to_path_buf()],
        template: Some("grocery".into()),
        select: Some(0),
        recursive: false,
        latency: Latency::none(),
    };

    let outcome = app::process_images(&no_delay_config(), &options, &CancelToken::new(), &|_| {})
        .await
        .unwrap();

    let report = outcome.report;
    assert!(outcome.rejected.is_empty());
    assert_eq!(report.items.len(), 6);
    assert_eq!(report.receipt_total, 32.99);
    // 参照レシートは記載合計と明細合計がずれている
    assert_eq!(report.total, 33.04);
    assert!(!report.matches_receipt_total());
    assert_eq!(report.date_iso.as_deref(), Some("2025-03-15"));
    assert_eq!(report.source.as_ref().unwrap().file_name, "a.png");

    // 保存して読み直しても同じ
    let path = dir.path().join("report.json");
    report.save(&path).unwrap();
    assert_eq!(BillReport::load(&path).unwrap().items, report.items);
}

/// 指定テンプレートが無ければNotFound
#[tokio::test]
async fn test_process_images_unknown_template() {
    let dir = tempdir().unwrap();
    let image = dir.path().join("a.png");
    std::fs::write(&image, PNG_MAGIC).unwrap();

    let options = ProcessOptions {
        inputs: vec![image],
        template: Some("missing".into()),
        select: None,
        recursive: false,
        latency: Latency::none(),
    };

    let err = app::process_images(&no_delay_config(), &options, &CancelToken::new(), &|_| {})
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

/// 存在しないパスがあっても残りの画像で解析する
#[tokio::test]
async fn test_process_images_skips_missing_path() {
    let dir = tempdir().unwrap();
    let image = dir.path().join("a.png");
    std::fs::write(&image, PNG_MAGIC).unwrap();

    let options = ProcessOptions {
        inputs: vec![dir.path().join("missing.png"), image],
        template: Some("grocery".into()),
        select: None,
        recursive: false,
        latency: Latency::none(),
    };

    let outcome = app::process_images(&no_delay_config(), &options, &CancelToken::new(), &|_| {})
        .await
        .unwrap();
    assert_eq!(outcome.rejected.len(), 1);
    assert!(outcome.rejected[0].contains("missing.png"));
    assert_eq!(outcome.report.source.as_ref().unwrap().file_name, "a.png");
}

/// 全ファイルが拒否された場合
#[tokio::test]
async fn test_process_images_all_rejected() {
    let dir = tempdir().unwrap();
    let note = dir.path().join("note.txt");
    std::fs::write(&note, b"not an image").unwrap();

    let options = ProcessOptions {
        inputs: vec![note],
        template: None,
        select: None,
        recursive: false,
        latency: Latency::none(),
    };

    let err = app::process_images(&no_delay_config(), &options, &CancelToken::new(), &|_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, BillScanError::NoImagesFound(_)));
}

/// カスタムテンプレートカタログ
#[tokio::test]
async fn test_custom_catalog_file() {
    let dir = tempdir().unwrap();
    let catalog_path = dir.path().join("templates.json");
    std::fs::write(
        &catalog_path,
        r#"[{"id": "cafe", "name": "Cafe", "categories": ["Drinks", "Food"],
             "rules": [{"category": "Food", "keywords": ["bread"]}]}]"#,
    )
    .unwrap();
    let image = dir.path().join("a.png");
    std::fs::write(&image, PNG_MAGIC).unwrap();

    let config = Config {
        templates_file: Some(catalog_path),
        ..no_delay_config()
    };
    let options = ProcessOptions {
        inputs: vec![image],
        template: None,
        select: None,
        recursive: false,
        latency: Latency::none(),
    };

    let report = app::process_images(&config, &options, &CancelToken::new(), &|_| {})
        .await
        .unwrap()
        .report;
    assert_eq!(report.template.id, "cafe");
    let bread = report.items.iter().find(|i| i.name == "Bread").unwrap();
    assert_eq!(bread.category, "Food");
    let milk = report.items.iter().find(|i| i.name == "Milk").unwrap();
    assert_eq!(milk.category, "Drinks");
}
