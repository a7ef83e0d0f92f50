//! Document exports derived from extracted task results.
//!
//! Three targets: PDF (headless HTML-to-PDF engine with a direct text
//! layout fallback), Markdown (raw `.md` or a styled HTML preview), and
//! Excel for the paginated task types.

mod excel;
mod markdown;
mod pdf;

pub use excel::export_excel;
pub use markdown::{clean_markdown, html_page, pdf_page, render_html};
pub use pdf::export_pdf;
