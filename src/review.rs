//! 対話式の明細レビュー
//!
//! レポートの明細を追加・編集・削除して保存する。

use crate::display::{format_category_totals, format_items};
use crate::error::{BillScanError, Result};
use crate::report::BillReport;
use bill_scanner_common::{format_amount, ExtractedItem, ItemField, ItemStore};
use dialoguer::{Input, Select};
use std::path::Path;
use tracing::info;

/// レビュー操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewCommand {
    /// 空の明細を追加して編集
    Add,
    /// 明細を編集（1始まりの番号）
    Edit(usize),
    /// 明細を削除（1始まりの番号）
    Delete(usize),
    /// 表を再表示
    List,
    /// 保存して終了
    Save,
    /// 保存せず終了
    Quit,
    Unknown(String),
}

pub fn parse_command(input: &str) -> ReviewCommand {
    let mut parts = input.split_whitespace();
    let head = parts.next().unwrap_or("");
    let number = parts.next().and_then(|n| n.parse::<usize>().ok());

    match (head, number) {
        ("a", _) => ReviewCommand::Add,
        ("e", Some(n)) => ReviewCommand::Edit(n),
        ("d", Some(n)) => ReviewCommand::Delete(n),
        ("l", _) | ("", _) => ReviewCommand::List,
        ("w", _) => ReviewCommand::Save,
        ("q", _) | ("Q", _) => ReviewCommand::Quit,
        _ => ReviewCommand::Unknown(input.trim().to_string()),
    }
}

/// 1始まりの番号から明細IDを得る
pub fn item_id_at(store: &ItemStore, number: usize) -> Result<String> {
    number
        .checked_sub(1)
        .and_then(|i| store.items().get(i))
        .map(|item| item.id.clone())
        .ok_or_else(|| bill_scanner_common::Error::ItemNotFound(format!("#{}", number)).into())
}

/// 対話式レビュー
pub fn run_interactive_review(input_path: &Path, output_path: Option<&Path>) -> Result<()> {
    let mut report = BillReport::load(input_path)?;
    let mut store = report.to_store();
    let output = output_path.unwrap_or(input_path);

    println!("\n{}", report.title());
    print_store(&store);

    loop {
        let input: String = Input::new()
            .with_prompt("操作 (a:追加 e N:編集 d N:削除 l:一覧 w:保存 q:中止)")
            .allow_empty(true)
            .interact_text()
            .map_err(|e| BillScanError::Prompt(e.to_string()))?;

        match parse_command(&input) {
            ReviewCommand::Add => {
                let id = store.add_item().id.clone();
                edit_item(&mut store, &id)?;
                print_store(&store);
            }
            ReviewCommand::Edit(n) => match item_id_at(&store, n) {
                Ok(id) => {
                    edit_item(&mut store, &id)?;
                    print_store(&store);
                }
                Err(e) => println!("⚠ {}", e),
            },
            ReviewCommand::Delete(n) => {
                match item_id_at(&store, n).and_then(|id| Ok(store.delete_item(&id)?)) {
                    Ok(removed) => {
                        println!("✓ 削除: {}", removed.name);
                        print_store(&store);
                    }
                    Err(e) => println!("⚠ {}", e),
                }
            }
            ReviewCommand::List => print_store(&store),
            ReviewCommand::Save => break,
            ReviewCommand::Quit => {
                println!("保存せずに終了しました");
                return Ok(());
            }
            ReviewCommand::Unknown(cmd) => println!("⚠ 不明な操作: {}", cmd),
        }
    }

    report.apply_store(&store);
    report.save(output)?;
    info!(items = report.items.len(), path = %output.display(), "レビュー結果を保存");
    println!("\n✓ 保存しました: {}", output.display());
    Ok(())
}

fn print_store(store: &ItemStore) {
    println!("\n{}", format_items(store.items()));
    println!("\n{}\n", format_category_totals(&store.category_totals(), store.total()));
}

/// 下書きを編集してコミット
fn edit_item(store: &mut ItemStore, id: &str) -> Result<()> {
    let mut draft = store.begin_edit(id)?;
    let categories = store.categories().to_vec();

    for field in prompt_fields(draft.item(), &categories)? {
        draft.set(field);
    }

    match store.commit_edit(draft) {
        Ok(item) => println!("✓ {} / {} / {}", item.name, item.category, format_amount(item.amount)),
        Err(e) => println!("⚠ {}", e),
    }
    Ok(())
}

fn prompt_fields(item: &ExtractedItem, categories: &[String]) -> Result<Vec<ItemField>> {
    let prompt_err = |e: dialoguer::Error| BillScanError::Prompt(e.to_string());

    let name: String = Input::new()
        .with_prompt("品名")
        .with_initial_text(item.name.clone())
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;

    let mut fields = vec![ItemField::Name(name.trim().to_string())];

    if !categories.is_empty() {
        let current = categories.iter().position(|c| *c == item.category).unwrap_or(0);
        let index = Select::new()
            .with_prompt("カテゴリ")
            .items(categories)
            .default(current)
            .interact()
            .map_err(prompt_err)?;
        fields.push(ItemField::Category(categories[index].clone()));
    }

    let amount: String = Input::new()
        .with_prompt("金額")
        .with_initial_text(format_amount(item.amount))
        .validate_with(|value: &String| -> std::result::Result<(), String> {
            ItemField::parse("amount", value)
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .interact_text()
        .map_err(prompt_err)?;
    fields.push(ItemField::parse("amount", &amount)?);

    Ok(fields)
}
