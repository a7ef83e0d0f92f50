//! PDF export.
//!
//! Preferred path: render the cleaned Markdown to HTML and hand it to a
//! headless HTML-to-PDF engine found on PATH. When no engine is available
//! (or it fails), fall back to a direct text layout with an embedded CJK
//! font; when no CJK font exists either, degrade to ASCII rather than
//! erroring.

use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::Command;

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference};
use tracing::{info, warn};

use normgate_error::ExportError;

use crate::markdown::{clean_markdown, pdf_page, render_html};

/// A4 portrait.
const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
/// 2 cm margins.
const MARGIN_MM: f32 = 20.0;
const LINE_HEIGHT_MM: f32 = 6.0;
/// Width budget per line in half-width character units.
const LINE_UNITS: usize = 85;

/// CJK font candidates, bundled project fonts first.
const FONT_CANDIDATES: [&str; 10] = [
    "fonts/wqy-microhei.ttc",
    "fonts/NotoSansCJK-Regular.ttf",
    "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
    "/usr/share/fonts/truetype/wqy/wqy-zenhei.ttc",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/arphic/uming.ttc",
    "/usr/share/fonts/truetype/droid/DroidSansFallbackFull.ttf",
    "/System/Library/Fonts/PingFang.ttc",
    "C:/Windows/Fonts/simhei.ttf",
];

/// Export a stored answer as a PDF at `output_path`.
pub fn export_pdf(content: &str, title: &str, output_path: &Path) -> Result<(), ExportError> {
    let cleaned = clean_markdown(content);

    if let Some(engine) = find_engine() {
        let html = pdf_page(&render_html(&cleaned), title);
        match render_with_engine(&engine, &html, output_path) {
            Ok(()) => {
                info!(engine = %engine.display(), path = %output_path.display(), "pdf rendered via html engine");
                return Ok(());
            }
            Err(reason) => {
                warn!(engine = %engine.display(), reason = %reason, "html engine failed, using text layout");
            }
        }
    }

    render_text_layout(&cleaned, title, output_path)
}

/// Locate a headless HTML-to-PDF engine on PATH.
fn find_engine() -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for name in [
        "wkhtmltopdf",
        "chromium",
        "chromium-browser",
        "google-chrome",
    ] {
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

fn render_with_engine(engine: &Path, html: &str, output_path: &Path) -> Result<(), String> {
    let html_path = output_path.with_extension("html.tmp");
    std::fs::write(&html_path, html).map_err(|e| e.to_string())?;

    let is_wkhtmltopdf = engine
        .file_name()
        .is_some_and(|name| name == "wkhtmltopdf");
    let status = if is_wkhtmltopdf {
        Command::new(engine)
            .arg("--quiet")
            .arg(&html_path)
            .arg(output_path)
            .status()
    } else {
        Command::new(engine)
            .arg("--headless")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg(format!("--print-to-pdf={}", output_path.display()))
            .arg(format!("file://{}", html_path.display()))
            .status()
    };
    let _ = std::fs::remove_file(&html_path);

    match status {
        Ok(status) if status.success() && output_path.is_file() => Ok(()),
        Ok(status) => Err(format!("engine exited with {status}")),
        Err(e) => Err(e.to_string()),
    }
}

enum LayoutFont {
    Cjk(IndirectFontRef),
    Ascii(IndirectFontRef),
}

fn load_font(doc: &PdfDocumentReference) -> Result<LayoutFont, ExportError> {
    for candidate in FONT_CANDIDATES {
        let path = Path::new(candidate);
        if !path.is_file() {
            continue;
        }
        match std::fs::File::open(path) {
            Ok(file) => match doc.add_external_font(file) {
                Ok(font) => {
                    info!(font = %candidate, "embedded CJK font");
                    return Ok(LayoutFont::Cjk(font));
                }
                Err(e) => warn!(font = %candidate, error = %e, "font rejected"),
            },
            Err(e) => warn!(font = %candidate, error = %e, "font unreadable"),
        }
    }

    if let Some(path) = query_fontconfig() {
        if let Ok(file) = std::fs::File::open(&path) {
            if let Ok(font) = doc.add_external_font(file) {
                info!(font = %path.display(), "embedded CJK font via fontconfig");
                return Ok(LayoutFont::Cjk(font));
            }
        }
    }

    warn!("no CJK font available, falling back to ASCII layout");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ExportError::Render {
            reason: e.to_string(),
        })?;
    Ok(LayoutFont::Ascii(font))
}

/// Ask fontconfig for any font covering Chinese.
fn query_fontconfig() -> Option<PathBuf> {
    let output = Command::new("fc-list")
        .arg(":lang=zh")
        .arg("file")
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        let path = line.split(':').next().unwrap_or("").trim();
        if !path.is_empty() && Path::new(path).is_file() {
            return Some(PathBuf::from(path));
        }
    }
    None
}

fn char_units(c: char) -> usize {
    if (c as u32) >= 0x2E80 {
        2
    } else {
        1
    }
}

fn wrap_line(line: &str) -> Vec<String> {
    if line.is_empty() {
        return vec![String::new()];
    }
    let mut wrapped = Vec::new();
    let mut current = String::new();
    let mut units = 0;
    for c in line.chars() {
        let width = char_units(c);
        if units + width > LINE_UNITS && !current.is_empty() {
            wrapped.push(std::mem::take(&mut current));
            units = 0;
        }
        current.push(c);
        units += width;
    }
    if !current.is_empty() {
        wrapped.push(current);
    }
    wrapped
}

fn render_text_layout(
    markdown: &str,
    title: &str,
    output_path: &Path,
) -> Result<(), ExportError> {
    let (doc, first_page, first_layer) = PdfDocument::new(
        title,
        Mm(PAGE_WIDTH_MM.into()),
        Mm(PAGE_HEIGHT_MM.into()),
        "Layer 1",
    );
    let font = load_font(&doc)?;
    let (font_ref, ascii_only) = match &font {
        LayoutFont::Cjk(font) => (font, false),
        LayoutFont::Ascii(font) => (font, true),
    };

    let mut layer = doc.get_page(first_page).get_layer(first_layer);
    let mut y = PAGE_HEIGHT_MM - MARGIN_MM;

    for raw_line in markdown.lines() {
        let (text, size): (&str, f32) = if let Some(heading) = raw_line.strip_prefix("## ") {
            (heading, 14.0)
        } else if let Some(heading) = raw_line.strip_prefix("# ") {
            (heading, 16.0)
        } else {
            (raw_line, 12.0)
        };

        let text = if ascii_only {
            text.chars()
                .map(|c| if c.is_ascii() { c } else { '?' })
                .collect::<String>()
        } else {
            text.to_string()
        };

        for segment in wrap_line(&text) {
            if y < MARGIN_MM {
                let (page, new_layer) = doc.add_page(
                    Mm(PAGE_WIDTH_MM.into()),
                    Mm(PAGE_HEIGHT_MM.into()),
                    "Layer 1",
                );
                layer = doc.get_page(page).get_layer(new_layer);
                y = PAGE_HEIGHT_MM - MARGIN_MM;
            }
            if !segment.is_empty() {
                layer.use_text(segment, size.into(), Mm(MARGIN_MM.into()), Mm(y.into()), font_ref);
            }
            y -= LINE_HEIGHT_MM;
        }
    }

    let file = std::fs::File::create(output_path)?;
    doc.save(&mut BufWriter::new(file))
        .map_err(|e| ExportError::Render {
            reason: e.to_string(),
        })?;
    info!(path = %output_path.display(), "pdf rendered via text layout");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_line_respects_unit_budget() {
        let long_ascii = "a".repeat(200);
        let wrapped = wrap_line(&long_ascii);
        assert!(wrapped.len() >= 2);
        assert!(wrapped.iter().all(|l| l.chars().count() <= LINE_UNITS));
    }

    #[test]
    fn test_wrap_line_counts_cjk_double_width() {
        let cjk = "标".repeat(100);
        let wrapped = wrap_line(&cjk);
        assert!(wrapped.iter().all(|l| l.chars().count() <= LINE_UNITS / 2 + 1));
    }

    #[test]
    fn test_wrap_empty_line_is_one_blank() {
        assert_eq!(wrap_line(""), vec![String::new()]);
    }

    #[test]
    fn test_text_layout_writes_a_pdf() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("result.pdf");
        render_text_layout("# 标题\n\n正文内容 with ascii", "任务结果", &out).unwrap();
        let bytes = std::fs::read(&out).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_export_pdf_never_fails_on_cjk_content() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("cjk.pdf");
        export_pdf("```markdown\n# 审查结论\n\n此处全部为中文内容。\n```", "任务结果", &out)
            .unwrap();
        assert!(out.is_file());
    }

    #[test]
    fn test_export_pdf_paginates_long_content() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("long.pdf");
        let long = (0..200)
            .map(|i| format!("line {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        render_text_layout(&long, "t", &out).unwrap();
        assert!(out.is_file());
    }
}
