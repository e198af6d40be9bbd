use anyhow::{Context, Result};
use bill_scanner::{app, cli, config, display, export, logging, pipeline, report, review};
use bill_scanner_common::{format_amount, TemplateCatalog};
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use indicatif::{ProgressBar, ProgressStyle};
use pipeline::mock::Latency;
use pipeline::CancelToken;
use report::BillReport;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_REPORT: &str = "bill-report.json";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load().context("設定の読み込みに失敗しました")?;
    logging::init(&config.log_level, cli.verbose);

    match cli.command {
        Commands::Process {
            inputs,
            template,
            select,
            output,
            excel,
            recursive,
            no_delay,
        } => {
            println!("🧾 bill-scan - レシート解析\n");

            let options = app::ProcessOptions {
                inputs,
                template,
                select,
                recursive,
                latency: Latency::from_config(config.simulated_latency && !no_delay),
            };

            // Ctrl+Cで解析を中断
            let cancel = CancelToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });

            let spinner = new_spinner();
            let outcome = app::process_images(&config, &options, &cancel, &|msg: &str| {
                spinner.set_message(msg.to_string())
            })
            .await;
            spinner.finish_and_clear();
            let outcome = outcome?;

            for reason in &outcome.rejected {
                println!("⚠ {}", reason);
            }

            let report = outcome.report;
            print_report(&report);

            let output = output.unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT));
            report.save(&output)?;
            println!("\n✔ 結果を保存: {}", output.display());

            if let Some(excel_output) = excel {
                export::export_excel(&report, &excel_output)?;
            }

            println!("\n✅ 解析完了");
        }

        Commands::Templates { json } => {
            let catalog = app::load_catalog(&config)?;
            print_templates(&catalog, json)?;
        }

        Commands::Summary { input } => {
            let report = BillReport::load(&input)
                .with_context(|| format!("{} を読み込めません", input.display()))?;
            print_report(&report);
        }

        Commands::Review { input, output } => {
            review::run_interactive_review(&input, output.as_deref())?;
        }

        Commands::Export { input, output } => {
            println!("📄 bill-scan - エクスポート\n");

            let report = BillReport::load(&input)
                .with_context(|| format!("{} を読み込めません", input.display()))?;
            let output = output.unwrap_or_else(|| {
                input
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or(Path::new("."))
                    .to_path_buf()
            });
            export::export_excel(&report, &output)?;

            println!("\n✅ エクスポート完了");
        }

        Commands::Config {
            show,
            set_template,
            set_ocr_command,
            set_timeout,
        } => {
            let mut config = config;

            if let Some(id) = set_template {
                // 存在確認
                app::load_catalog(&config)?.get(&id)?;
                config.set_default_template(id)?;
                println!("✔ 既定テンプレートを設定しました");
            }

            if let Some(command) = set_ocr_command {
                config.set_ocr_command(command)?;
                println!("✔ OCRコマンドを設定しました");
            }

            if let Some(seconds) = set_timeout {
                config.set_stage_timeout(seconds)?;
                println!("✔ タイムアウトを設定しました");
            }

            if show {
                println!("設定: {}", Config::config_path()?.display());
                println!(
                    "  既定テンプレート: {}",
                    config.default_template.as_deref().unwrap_or("(カタログ先頭)")
                );
                println!(
                    "  テンプレートファイル: {}",
                    config
                        .templates_file
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "(組み込み)".into())
                );
                println!(
                    "  OCRコマンド: {}",
                    config.ocr_command.as_deref().unwrap_or("(参照OCR)")
                );
                println!("  最大画像サイズ: {} bytes", config.max_image_bytes);
                println!("  タイムアウト: {}秒", config.stage_timeout_seconds);
                println!("  待ち時間の再現: {}", config.simulated_latency);
                println!("  ログレベル: {}", config.log_level);
            }
        }
    }

    Ok(())
}

fn new_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn print_report(report: &BillReport) {
    println!("{}", report.title());
    if !report.date.is_empty() {
        println!("日付: {}", report.date_iso.as_deref().unwrap_or(&report.date));
    }
    if let Some(confidence) = report.ocr_confidence {
        println!("OCR信頼度: {:.0}%", confidence * 100.0);
    }

    println!("\n{}", display::format_items(&report.items));
    println!(
        "\n{}",
        display::format_category_totals(&report.category_totals, report.total)
    );

    if !report.matches_receipt_total() {
        println!(
            "\n⚠ レシート記載の合計 ({}) と明細の合計 ({}) が一致しません",
            format_amount(report.receipt_total),
            format_amount(report.total)
        );
    }
}

fn print_templates(catalog: &TemplateCatalog, json: bool) -> Result<()> {
    let templates = catalog.templates();
    if json {
        println!("{}", serde_json::to_string_pretty(&templates)?);
    } else {
        println!("{}", display::format_templates(&templates));
    }
    Ok(())
}
