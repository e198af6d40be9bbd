pub mod excel;

use crate::error::Result;
use crate::report::BillReport;
use std::path::{Path, PathBuf};

/// 出力先がフォルダ（または拡張子なし）ならタイトルからファイル名を作る
pub fn output_path_for(output: &Path, title: &str, extension: &str) -> PathBuf {
    if output.is_dir() || output.extension().is_none() {
        output.join(format!("{}.{}", sanitize_file_name(title), extension))
    } else {
        output.to_path_buf()
    }
}

/// ファイル名に使えない文字を置き換える
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "bill".to_string()
    } else {
        cleaned.to_string()
    }
}

/// レポートをExcelに出力し、書き出したパスを返す
pub fn export_excel(report: &BillReport, output: &Path) -> Result<PathBuf> {
    let output_path = output_path_for(output, &report.title(), "xlsx");
    println!("- Excelを生成中...");
    excel::generate_excel(report, &output_path)?;
    println!("✔ Excel出力: {}", output_path.display());
    Ok(output_path)
}
