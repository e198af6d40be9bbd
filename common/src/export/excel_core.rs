//! Excel生成（共通ライブラリ）
//!
//! 明細シートとカテゴリ別小計シートを持つブックをバッファに生成する

use crate::aggregate::{category_totals, total};
use crate::types::ExtractedItem;
use rust_xlsxwriter::*;

const ITEM_COL_WIDTH: f64 = 36.0;
const CATEGORY_COL_WIDTH: f64 = 20.0;
const AMOUNT_COL_WIDTH: f64 = 14.0;

/// Excelをバッファに生成
///
/// # Arguments
/// * `title` - 明細シート先頭に書くタイトル
/// * `meta` - タイトル下に並べる (ラベル, 値) の組（店名・日付など）
/// * `items` - 明細
pub fn generate_excel_buffer(
    title: &str,
    meta: &[(&str, String)],
    items: &[ExtractedItem],
) -> Result<Vec<u8>, String> {
    let mut workbook = Workbook::new();

    // フォーマット定義
    let title_format = Format::new().set_bold().set_font_size(14.0);

    let label_format = Format::new()
        .set_bold()
        .set_font_color(Color::RGB(0x555555));

    let header_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0xF5F5F5))
        .set_border(FormatBorder::Thin)
        .set_border_color(Color::RGB(0xAAAAAA));

    let cell_format = Format::new()
        .set_border(FormatBorder::Hair)
        .set_border_color(Color::RGB(0xCCCCCC));

    let amount_format = Format::new()
        .set_num_format("0.00")
        .set_align(FormatAlign::Right)
        .set_border(FormatBorder::Hair)
        .set_border_color(Color::RGB(0xCCCCCC));

    let total_label_format = Format::new()
        .set_bold()
        .set_border(FormatBorder::Thin);

    let total_amount_format = Format::new()
        .set_bold()
        .set_num_format("0.00")
        .set_align(FormatAlign::Right)
        .set_border(FormatBorder::Thin);

    // 明細シート
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Items")
            .map_err(|e| format!("シート名設定エラー: {}", e))?;
        sheet.set_column_width(0, ITEM_COL_WIDTH)
            .map_err(|e| format!("列幅設定エラー: {}", e))?;
        sheet.set_column_width(1, CATEGORY_COL_WIDTH)
            .map_err(|e| format!("列幅設定エラー: {}", e))?;
        sheet.set_column_width(2, AMOUNT_COL_WIDTH)
            .map_err(|e| format!("列幅設定エラー: {}", e))?;

        sheet.write_string_with_format(0, 0, title, &title_format)
            .map_err(|e| format!("タイトル書き込みエラー: {}", e))?;

        let mut row: u32 = 1;
        for (label, value) in meta {
            sheet.write_string_with_format(row, 0, *label, &label_format)
                .map_err(|e| format!("ラベル書き込みエラー: {}", e))?;
            sheet.write_string(row, 1, value.as_str())
                .map_err(|e| format!("値書き込みエラー: {}", e))?;
            row += 1;
        }
        row += 1;

        for (col, header) in ["Item", "Category", "Amount"].iter().enumerate() {
            sheet.write_string_with_format(row, col as u16, *header, &header_format)
                .map_err(|e| format!("見出し書き込みエラー: {}", e))?;
        }
        row += 1;

        for item in items {
            sheet.write_string_with_format(row, 0, item.name.as_str(), &cell_format)
                .map_err(|e| format!("明細書き込みエラー: {}", e))?;
            sheet.write_string_with_format(row, 1, item.category.as_str(), &cell_format)
                .map_err(|e| format!("明細書き込みエラー: {}", e))?;
            sheet.write_number_with_format(row, 2, item.amount, &amount_format)
                .map_err(|e| format!("明細書き込みエラー: {}", e))?;
            row += 1;
        }

        sheet.write_string_with_format(row, 0, "Total", &total_label_format)
            .map_err(|e| format!("合計書き込みエラー: {}", e))?;
        sheet.write_number_with_format(row, 2, total(items), &total_amount_format)
            .map_err(|e| format!("合計書き込みエラー: {}", e))?;
    }

    // カテゴリ別小計シート
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Summary")
            .map_err(|e| format!("シート名設定エラー: {}", e))?;
        sheet.set_column_width(0, CATEGORY_COL_WIDTH)
            .map_err(|e| format!("列幅設定エラー: {}", e))?;
        sheet.set_column_width(1, AMOUNT_COL_WIDTH)
            .map_err(|e| format!("列幅設定エラー: {}", e))?;

        sheet.write_string_with_format(0, 0, "Category", &header_format)
            .map_err(|e| format!("見出し書き込みエラー: {}", e))?;
        sheet.write_string_with_format(0, 1, "Total", &header_format)
            .map_err(|e| format!("見出し書き込みエラー: {}", e))?;

        let mut row: u32 = 1;
        for entry in category_totals(items) {
            sheet.write_string_with_format(row, 0, entry.category.as_str(), &cell_format)
                .map_err(|e| format!("小計書き込みエラー: {}", e))?;
            sheet.write_number_with_format(row, 1, entry.total, &amount_format)
                .map_err(|e| format!("小計書き込みエラー: {}", e))?;
            row += 1;
        }
    }

    // バッファに書き出し
    workbook.save_to_buffer()
        .map_err(|e| format!("Excel保存エラー: {}", e))
}
