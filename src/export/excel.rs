//! Excel出力（CLI版）
//!
//! ブックの中身は共通ライブラリで生成し、ここではファイルに書き出すだけ

use crate::error::{BillScanError, Result};
use crate::report::BillReport;
use bill_scanner_common::export::excel_core::generate_excel_buffer;
use bill_scanner_common::format_amount;
use std::path::Path;

pub fn generate_excel(report: &BillReport, output_path: &Path) -> Result<()> {
    let mut meta = vec![("Template", report.template.name.clone())];
    if !report.vendor.is_empty() {
        meta.push(("Vendor", report.vendor.clone()));
    }
    if !report.date.is_empty() {
        meta.push(("Date", report.date_iso.clone().unwrap_or_else(|| report.date.clone())));
    }
    if report.receipt_total > 0.0 {
        meta.push(("Receipt total", format_amount(report.receipt_total)));
    }
    if let Some(source) = &report.source {
        meta.push(("Source", source.file_name.clone()));
    }

    let buffer = generate_excel_buffer(&report.title(), &meta, &report.items)
        .map_err(BillScanError::ExcelGeneration)?;

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output_path, buffer)?;
    Ok(())
}
