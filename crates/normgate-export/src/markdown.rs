//! Markdown cleaning and HTML rendering.

use normgate_core::extract::strip_code_fence;
use pulldown_cmark::{html, Options, Parser};

const EMPTY_RESULT: &str = "# 任务结果\n\n暂无处理结果";

/// Markers opening a leading metadata block injected by document
/// converters. The block runs until a horizontal rule.
const METADATA_MARKERS: [&str; 3] = ["文档类型：", "转换时间：", "源格式："];

fn is_metadata_line(line: &str) -> bool {
    let stripped = line
        .trim_start_matches('>')
        .trim()
        .replace("**", "");
    METADATA_MARKERS
        .iter()
        .any(|marker| stripped.contains(marker))
}

fn is_separator_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed == "---" || trimmed == "***" || trimmed == "___" || trimmed.starts_with("---")
}

fn remove_metadata_block(content: &str) -> String {
    let mut kept = Vec::new();
    let mut skipping = false;
    for line in content.lines() {
        if is_metadata_line(line) {
            skipping = true;
            continue;
        }
        if skipping {
            if is_separator_line(line) {
                skipping = false;
            }
            continue;
        }
        kept.push(line);
    }
    kept.join("\n").trim_start_matches('\n').to_string()
}

/// Clean a stored answer for export: strip the outer code fence, drop the
/// converter metadata block, guarantee a top-level heading, and collapse
/// runs of blank lines. Empty content renders a placeholder document.
pub fn clean_markdown(content: &str) -> String {
    let content = strip_code_fence(content);
    let content = remove_metadata_block(&content);
    let content = content.trim();
    if content.is_empty() {
        return EMPTY_RESULT.to_string();
    }

    let mut lines: Vec<&str> = Vec::new();
    let mut previous_blank = false;
    for line in content.lines() {
        let line = line.trim_end();
        let blank = line.is_empty();
        if blank && previous_blank {
            continue;
        }
        lines.push(line);
        previous_blank = blank;
    }
    let cleaned = lines.join("\n");

    if cleaned.starts_with('#') {
        cleaned
    } else {
        format!("# 任务结果\n\n{cleaned}")
    }
}

/// Render Markdown to an HTML fragment (tables and strikethrough enabled).
pub fn render_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options);
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y年%m月%d日 %H:%M:%S").to_string()
}

/// Wrap an HTML fragment in a styled page for in-browser preview.
pub fn html_page(html_content: &str, title: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="zh-CN">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', 'Roboto', Arial, sans-serif;
            line-height: 1.6;
            color: #333;
            max-width: 900px;
            margin: 0 auto;
            padding: 20px;
        }}
        h1, h2, h3, h4, h5, h6 {{ color: #2c3e50; margin-top: 24px; margin-bottom: 16px; }}
        h1 {{ padding-bottom: 0.3em; border-bottom: 1px solid #eaecef; }}
        p {{ margin-bottom: 16px; }}
        code {{ background-color: #f1f3f4; border-radius: 3px; font-size: 85%; padding: 0.2em 0.4em; }}
        pre {{ background-color: #f6f8fa; border-radius: 6px; font-size: 85%; overflow: auto; padding: 16px; }}
        blockquote {{ border-left: 4px solid #dfe2e5; margin: 0; padding: 0 16px; color: #6a737d; }}
        table {{ border-collapse: collapse; width: 100%; margin-bottom: 16px; }}
        table th, table td {{ border: 1px solid #dfe2e5; padding: 6px 13px; }}
        table th {{ background-color: #f6f8fa; font-weight: 600; }}
        .header {{ text-align: center; margin-bottom: 40px; padding-bottom: 20px; border-bottom: 2px solid #e1e4e8; }}
        .footer {{ margin-top: 40px; padding-top: 20px; border-top: 1px solid #e1e4e8; text-align: center; color: #586069; font-size: 14px; }}
    </style>
</head>
<body>
    <div class="header">
        <h1>{title}</h1>
        <p>导出时间: {timestamp}</p>
    </div>
    <div class="content">
        {html_content}
    </div>
    <div class="footer">
        <p>此文档由系统自动生成</p>
    </div>
</body>
</html>"#,
        title = title,
        timestamp = timestamp(),
        html_content = html_content,
    )
}

/// Wrap an HTML fragment in a print-oriented page (A4, 2 cm margins) for
/// the HTML-to-PDF engine.
pub fn pdf_page(html_content: &str, title: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="zh-CN">
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
    <style>
        @page {{ margin: 2cm; size: A4; }}
        body {{
            font-family: 'SimSun', '宋体', Arial, sans-serif;
            font-size: 12pt;
            line-height: 1.6;
            color: #333;
        }}
        h1 {{ font-size: 18pt; text-align: center; border-bottom: 2px solid #333; padding-bottom: 0.5em; }}
        h2 {{ font-size: 16pt; }}
        h3 {{ font-size: 14pt; }}
        p {{ margin-bottom: 1em; text-align: justify; }}
        pre, code {{ font-family: 'Courier New', monospace; background-color: #f5f5f5; border: 1px solid #ddd; }}
        blockquote {{ border-left: 4px solid #ddd; margin: 1em 0; padding-left: 1em; color: #666; }}
        table {{ border-collapse: collapse; width: 100%; margin: 1em 0; break-inside: avoid; }}
        th, td {{ border: 1px solid #ddd; padding: 8pt; text-align: left; }}
        th {{ background-color: #f9f9f9; font-weight: bold; }}
        h1, h2, h3, h4, h5, h6, p, li, td, th {{ break-inside: avoid; }}
    </style>
</head>
<body>
    <div class="header">
        <h1>{title}</h1>
        <div class="export-info">导出时间: {timestamp}</div>
    </div>
    <div class="content">
        {html_content}
    </div>
</body>
</html>"#,
        title = title,
        timestamp = timestamp(),
        html_content = html_content,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_empty_content_yields_placeholder() {
        assert_eq!(clean_markdown(""), EMPTY_RESULT);
        assert_eq!(clean_markdown("   \n  "), EMPTY_RESULT);
    }

    #[test]
    fn test_clean_strips_outer_fence() {
        let cleaned = clean_markdown("```markdown\n# 报告\n\n内容\n```");
        assert_eq!(cleaned, "# 报告\n\n内容");
    }

    #[test]
    fn test_clean_adds_heading_when_missing() {
        let cleaned = clean_markdown("没有标题的内容");
        assert!(cleaned.starts_with("# 任务结果\n\n"));
    }

    #[test]
    fn test_clean_collapses_blank_runs() {
        let cleaned = clean_markdown("# 标题\n\n\n\n正文");
        assert_eq!(cleaned, "# 标题\n\n正文");
    }

    #[test]
    fn test_clean_is_idempotent() {
        for input in [
            "```markdown\n# 报告\n内容\n```",
            "普通文本",
            "# 已有标题\n\n内容",
        ] {
            let once = clean_markdown(input);
            assert_eq!(clean_markdown(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_metadata_block_removed() {
        let input = "> **文档类型**：标准文档\n> **转换时间**：2025-01-01\n> **源格式**：docx\n---\n# 正文标题\n内容";
        let cleaned = clean_markdown(input);
        assert!(!cleaned.contains("文档类型"));
        assert!(!cleaned.contains("转换时间"));
        assert!(cleaned.starts_with("# 正文标题"));
    }

    #[test]
    fn test_render_html_basics() {
        let html = render_html("# 标题\n\n- 项目一\n- 项目二");
        assert!(html.contains("<h1>标题</h1>"));
        assert!(html.contains("<li>项目一</li>"));
    }

    #[test]
    fn test_render_html_tables() {
        let html = render_html("| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(html.contains("<table>"));
    }

    #[test]
    fn test_pages_embed_content_and_title() {
        let page = html_page("<p>正文</p>", "任务结果 - t1");
        assert!(page.contains("<p>正文</p>"));
        assert!(page.contains("任务结果 - t1"));
        let print = pdf_page("<p>正文</p>", "任务结果 - t1");
        assert!(print.contains("size: A4"));
        assert!(print.contains("margin: 2cm"));
    }
}
