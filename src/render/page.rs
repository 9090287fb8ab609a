//! Standalone HTML page shell.
//!
//! The body is produced by the node tree; only the fixed stylesheet and the
//! image-fallback script are emitted verbatim.

use super::node::{Node, html_escape};

/// Palette shared with the status region styling.
pub mod colors {
    pub const BG: &str = "#0f1115";
    pub const SURFACE: &str = "#171a21";
    pub const BORDER: &str = "#2a2f3a";
    pub const TEXT: &str = "#e6e8ee";
    pub const MUTED: &str = "#9aa3b2";
    pub const ACCENT: &str = "#7aa2f7";
    pub const DANGER: &str = "#f7768e";
}

fn stylesheet() -> String {
    format!(
        r#":root {{ --bg: {bg}; --surface: {surface}; --border: {border}; --text: {text}; --muted: {muted}; --accent: {accent}; --danger: {danger}; }}
body {{ margin: 0; padding: 24px; background: var(--bg); color: var(--text); font: 15px/1.5 system-ui, sans-serif; }}
.mono {{ font-family: ui-monospace, SFMono-Regular, Menlo, monospace; }}
form {{ display: flex; gap: 8px; margin-bottom: 12px; }}
input {{ flex: 1; padding: 8px 10px; background: var(--surface); color: var(--text); border: 1px solid var(--border); border-radius: 8px; }}
button, #clear {{ padding: 8px 14px; border-radius: 8px; border: 1px solid var(--border); background: var(--surface); color: var(--text); text-decoration: none; cursor: pointer; }}
.status {{ padding: 6px 10px; border: 1px solid var(--border); border-radius: 8px; color: var(--muted); min-height: 1.5em; }}
.status.error {{ border-color: var(--danger); color: var(--danger); }}
.err {{ margin-top: 12px; color: var(--danger); }}
.grid {{ display: grid; grid-template-columns: repeat(auto-fill, minmax(160px, 1fr)); gap: 12px; margin: 16px 0; }}
.cell-link {{ color: inherit; text-decoration: none; }}
.thumb {{ border: 1px solid var(--border); border-radius: 12px; padding: 8px; cursor: pointer; background: var(--surface); }}
.thumb.active {{ border-color: var(--accent); }}
.thumb img {{ width: 100%; height: 140px; object-fit: cover; border-radius: 8px; }}
.pdf-tile {{ display: flex; align-items: center; justify-content: center; height: 140px; }}
.name {{ font-size: 12px; overflow: hidden; text-overflow: ellipsis; white-space: nowrap; }}
.links {{ display: flex; flex-wrap: wrap; gap: 12px; align-items: baseline; margin-bottom: 12px; }}
.links a {{ color: var(--accent); }}
.embed {{ width: 100%; height: 80vh; border: 1px solid var(--border); border-radius: 12px; }}
.detail-image {{ max-width: 100%; height: auto; border: 1px solid var(--border); border-radius: 12px; }}
"#,
        bg = colors::BG,
        surface = colors::SURFACE,
        border = colors::BORDER,
        text = colors::TEXT,
        muted = colors::MUTED,
        accent = colors::ACCENT,
        danger = colors::DANGER,
    )
}

/// One-shot image fallback: swap to `data-fallback` on the first load error only.
const FALLBACK_SCRIPT: &str = r#"document.addEventListener('error', function (e) {
  var img = e.target;
  if (!img || img.tagName !== 'IMG' || !img.dataset.fallback || img.dataset.fellBack) return;
  img.dataset.fellBack = '1';
  if (img.getAttribute('src') !== img.dataset.fallback) img.src = img.dataset.fallback;
}, true);"#;

/// Wrap body nodes in a complete HTML document.
pub fn document(title: &str, body: &[Node]) -> String {
    let body_html: String = body.iter().map(Node::to_html).collect();
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title}</title>\n<style>\n{style}</style>\n</head>\n<body>\n{body}\n\
         <script>\n{script}\n</script>\n</body>\n</html>\n",
        title = html_escape(title),
        style = stylesheet(),
        body = body_html,
        script = FALLBACK_SCRIPT,
    )
}
