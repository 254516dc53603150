//! HTML-to-text conversion collaborator
//!
//! Capture bodies arrive as rich text; search and entity extraction operate
//! on a plain rendering that preserves paragraph and line structure.

/// Converts a rich-text capture body to newline-preserving plain text
pub trait HtmlToText: Send + Sync {
    fn to_plain_text(&self, html: &str) -> String;
}

/// Built-in converter: strips markup, maps block-level boundaries and `<br>`
/// to newlines, and decodes the handful of entities that show up in capture
/// bodies.
#[derive(Debug, Clone, Default)]
pub struct BasicHtmlToText;

const BREAK_TAGS: &[&str] = &[
    "br", "/p", "/div", "/li", "/h1", "/h2", "/h3", "/h4", "/h5", "/h6", "/tr", "/blockquote",
];

impl HtmlToText for BasicHtmlToText {
    fn to_plain_text(&self, html: &str) -> String {
        let mut out = String::with_capacity(html.len());
        let mut chars = html.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '<' {
                let mut tag = String::new();
                for t in chars.by_ref() {
                    if t == '>' {
                        break;
                    }
                    tag.push(t);
                }
                let name = tag
                    .trim_start()
                    .trim_end_matches('/')
                    .split_whitespace()
                    .next()
                    .unwrap_or("")
                    .to_lowercase();
                if BREAK_TAGS.contains(&name.as_str()) && !out.ends_with('\n') {
                    out.push('\n');
                }
            } else if c == '&' {
                let mut entity = String::new();
                let mut terminated = false;
                while let Some(&e) = chars.peek() {
                    if e == ';' {
                        chars.next();
                        terminated = true;
                        break;
                    }
                    if e.is_whitespace() || e == '&' || entity.len() > 8 {
                        break;
                    }
                    entity.push(e);
                    chars.next();
                }
                match (terminated, entity.as_str()) {
                    (true, "amp") => out.push('&'),
                    (true, "lt") => out.push('<'),
                    (true, "gt") => out.push('>'),
                    (true, "quot") => out.push('"'),
                    (true, "apos" | "#39") => out.push('\''),
                    (true, "nbsp") => out.push(' '),
                    _ => {
                        out.push('&');
                        out.push_str(&entity);
                        if terminated {
                            out.push(';');
                        }
                    }
                }
            } else {
                out.push(c);
            }
        }

        out.trim().to_string()
    }
}
