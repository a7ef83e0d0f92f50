//! Excel export for the paginated task types.
//!
//! Layout: a merged title band, task metadata rows, a styled header row,
//! the data body with per-type columns, dynamic row heights for long text,
//! frozen header and an auto-filter over the data range.

use std::path::Path;

use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook};
use serde_json::Value;
use tracing::info;

use normgate_core::model::TaskType;
use normgate_error::ExportError;

/// Title row index (0-based).
const TITLE_ROW: u32 = 0;
/// First task metadata row.
const INFO_ROW: u32 = 2;
/// Column header row.
const HEADER_ROW: u32 = 5;
/// Row height cap in points.
const MAX_ROW_HEIGHT: f64 = 100.0;

struct ColumnLayout {
    headers: &'static [&'static str],
    fields: &'static [&'static str],
    widths: &'static [f64],
    /// Columns whose text length drives the row height (0-based).
    long_text: &'static [u16],
}

fn layout_for(task_type: TaskType) -> ColumnLayout {
    match task_type {
        TaskType::Recommendation => ColumnLayout {
            headers: &["排序序号", "项目名称", "原文内容", "参考标准"],
            fields: &["sn", "projectName", "originalText", "referenceStandard"],
            widths: &[10.0, 25.0, 50.0, 40.0],
            long_text: &[2, 3],
        },
        TaskType::Compliance => ColumnLayout {
            headers: &[
                "排序序号",
                "项目名称",
                "原文内容",
                "是否符合标准",
                "建议改写内容",
                "参考标准",
            ],
            fields: &[
                "sn",
                "projectName",
                "originalText",
                "isCompliant",
                "suggestedRewrite",
                "referenceStandard",
            ],
            widths: &[10.0, 25.0, 40.0, 15.0, 40.0, 35.0],
            long_text: &[2, 4, 5],
        },
        _ => ColumnLayout {
            headers: &["序号", "问题位置", "原文", "问题描述", "修改建议"],
            fields: &[
                "sn",
                "issueLocation",
                "originalText",
                "issueDescription",
                "recommendedModification",
            ],
            widths: &[8.0, 20.0, 40.0, 30.0, 40.0],
            long_text: &[2, 3, 4],
        },
    }
}

fn cell_text(item: &Value, field: &str, row_number: usize) -> String {
    match item.get(field) {
        None | Some(Value::Null) => {
            // A missing sequence number falls back to the row position.
            if field == "sn" {
                row_number.to_string()
            } else {
                String::new()
            }
        }
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn render_error(e: rust_xlsxwriter::XlsxError) -> ExportError {
    ExportError::Render {
        reason: e.to_string(),
    }
}

fn info_str<'a>(task_info: &'a Value, key: &str, fallback_key: &str) -> &'a str {
    task_info
        .get(key)
        .and_then(Value::as_str)
        .or_else(|| task_info.get(fallback_key).and_then(Value::as_str))
        .unwrap_or("")
}

/// Write the full result set to an `.xlsx` file at `output_path`.
pub fn export_excel(
    items: &[Value],
    task_info: &Value,
    output_path: &Path,
) -> Result<(), ExportError> {
    if items.is_empty() {
        return Err(ExportError::NothingToExport);
    }

    let task_type: TaskType = task_info
        .get("task_type")
        .and_then(Value::as_str)
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(TaskType::Review);
    let layout = layout_for(task_type);
    let last_col = u16::try_from(layout.headers.len() - 1).unwrap_or(0);

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("任务结果").map_err(render_error)?;

    let title_format = Format::new()
        .set_bold()
        .set_font_size(16.0)
        .set_align(FormatAlign::Center);
    let header_format = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(0x36_60_92))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_text_wrap()
        .set_border(FormatBorder::Thin);
    let body_format = Format::new()
        .set_align(FormatAlign::Left)
        .set_align(FormatAlign::Top)
        .set_text_wrap()
        .set_border(FormatBorder::Thin);

    // Title band merged across the data columns.
    let title = format!(
        "任务结果导出 - {}",
        info_str(task_info, "title", "id")
    );
    worksheet
        .merge_range(TITLE_ROW, 0, TITLE_ROW, last_col, &title, &title_format)
        .map_err(render_error)?;

    // Task metadata rows.
    worksheet
        .write_string(INFO_ROW, 0, "任务类型：")
        .map_err(render_error)?;
    worksheet
        .write_string(INFO_ROW, 1, info_str(task_info, "task_type_display", "task_type"))
        .map_err(render_error)?;
    worksheet
        .write_string(INFO_ROW, 3, "创建时间：")
        .map_err(render_error)?;
    worksheet
        .write_string(INFO_ROW, 4, info_str(task_info, "created_at", "created_at"))
        .map_err(render_error)?;
    worksheet
        .write_string(INFO_ROW + 1, 0, "任务状态：")
        .map_err(render_error)?;
    worksheet
        .write_string(INFO_ROW + 1, 1, info_str(task_info, "status_display", "status"))
        .map_err(render_error)?;
    worksheet
        .write_string(INFO_ROW + 1, 3, "导出时间：")
        .map_err(render_error)?;
    worksheet
        .write_string(
            INFO_ROW + 1,
            4,
            &chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        )
        .map_err(render_error)?;

    // Header band.
    for (col, header) in layout.headers.iter().enumerate() {
        let col = u16::try_from(col).unwrap_or(0);
        worksheet
            .write_string_with_format(HEADER_ROW, col, *header, &header_format)
            .map_err(render_error)?;
    }
    for (col, width) in layout.widths.iter().enumerate() {
        let col = u16::try_from(col).unwrap_or(0);
        worksheet.set_column_width(col, *width).map_err(render_error)?;
    }

    // Data body.
    let data_start = HEADER_ROW + 1;
    for (index, item) in items.iter().enumerate() {
        let row = data_start + u32::try_from(index).unwrap_or(0);
        let mut row_height: f64 = 0.0;

        for (col_index, field) in layout.fields.iter().enumerate() {
            let col = u16::try_from(col_index).unwrap_or(0);
            let text = cell_text(item, field, index + 1);

            if layout.long_text.contains(&col) {
                let length = text.chars().count();
                if length > 50 {
                    let estimated = ((length / 50) * 15).max(15) as f64;
                    row_height = row_height.max(estimated.min(MAX_ROW_HEIGHT));
                }
            }

            worksheet
                .write_string_with_format(row, col, &text, &body_format)
                .map_err(render_error)?;
        }

        if row_height > 0.0 {
            worksheet.set_row_height(row, row_height).map_err(render_error)?;
        }
    }

    // Frozen header and auto-filter over header + data.
    worksheet.set_freeze_panes(data_start, 0).map_err(render_error)?;
    let last_row = data_start + u32::try_from(items.len() - 1).unwrap_or(0);
    worksheet
        .autofilter(HEADER_ROW, 0, last_row, last_col)
        .map_err(render_error)?;

    workbook.save(output_path).map_err(render_error)?;
    info!(path = %output_path.display(), rows = items.len(), "excel export written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn review_info() -> Value {
        json!({
            "id": "t-1",
            "title": "审查任务",
            "task_type": "standard_review",
            "task_type_display": "标准审查",
            "status": "completed",
            "status_display": "已完成",
            "created_at": "2025-01-15T10:00:00+00:00",
        })
    }

    #[test]
    fn test_export_writes_xlsx() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("results.xlsx");
        let items = vec![
            json!({"sn": 1, "issueLocation": "第3.1节", "originalText": "原文", "issueDescription": "描述", "recommendedModification": "建议"}),
            json!({"sn": 2, "issueLocation": "第4.2节", "originalText": "原文2", "issueDescription": "描述2", "recommendedModification": "建议2"}),
        ];
        export_excel(&items, &review_info(), &out).unwrap();
        let bytes = std::fs::read(&out).unwrap();
        // XLSX is a zip container.
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_export_empty_items_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("empty.xlsx");
        let err = export_excel(&[], &review_info(), &out).unwrap_err();
        assert!(matches!(err, ExportError::NothingToExport));
    }

    #[test]
    fn test_export_long_text_rows_do_not_fail() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("long.xlsx");
        let long_text = "这是一个很长的原文内容。".repeat(60);
        let items = vec![json!({"sn": 1, "originalText": long_text})];
        export_excel(&items, &review_info(), &out).unwrap();
        assert!(out.is_file());
    }

    #[test]
    fn test_export_compliance_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("compliance.xlsx");
        let info = json!({
            "id": "t-2",
            "title": "符合性检查",
            "task_type": "standard_compliance",
            "task_type_display": "标准符合性检查",
            "status_display": "已完成",
        });
        let items = vec![json!({
            "sn": "1",
            "projectName": "项目A",
            "originalText": "原文",
            "isCompliant": "是",
            "suggestedRewrite": "",
            "referenceStandard": "GB/T 1.1-2020",
        })];
        export_excel(&items, &info, &out).unwrap();
        assert!(out.is_file());
    }
}
