//! Lightweight markdown to HTML for chat messages
//!
//! Only the handful of constructs the coach actually produces are supported:
//! fenced code blocks, inline code, bold, italic and line breaks. All text is
//! HTML-escaped before any markup is introduced.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static FENCED_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(\w+)?\n((?s:.*?))```").expect("fenced code regex"));
static INLINE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`([^`]+)`").expect("inline code regex"));
static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("bold regex"));
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*\n]+)\*").expect("italic regex"));
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new("\u{E000}([0-9]+)\u{E001}").expect("placeholder regex"));

// Private-use markers for code spans pulled out of the text. `escape_html`
// turns literal occurrences into entities so input cannot forge them.
const STASH_OPEN: char = '\u{E000}';
const STASH_CLOSE: char = '\u{E001}';

pub const COPY_BUTTON: &str =
    r#"<button class="ai-copy-code-btn" aria-label="Copy code">Copy</button>"#;

/// Escape text for use as HTML element content or a quoted attribute.
pub fn escape_html(text: &str) -> String {
    let escaped = html_escape::encode_quoted_attribute(text);
    if !escaped.contains(&[STASH_OPEN, STASH_CLOSE][..]) {
        return escaped.into_owned();
    }
    escaped
        .replace(STASH_OPEN, "&#xE000;")
        .replace(STASH_CLOSE, "&#xE001;")
}

/// Render message text as HTML.
///
/// Rules run in a fixed order: fenced code, inline code, bold, italic, line
/// breaks. Code is set aside as soon as it is recognized so later rules never
/// see its contents. `copy_controls` adds a copy button to each code block;
/// it is only wanted once a message has finished streaming.
pub fn format_message(content: &str, copy_controls: bool) -> String {
    if content.is_empty() {
        return String::new();
    }

    let mut stash: Vec<String> = Vec::new();
    let text = escape_html(content);

    let text = FENCED_CODE.replace_all(&text, |caps: &Captures| {
        let lang = caps.get(1).map_or("text", |m| m.as_str());
        let code = caps.get(2).map_or("", |m| m.as_str()).trim();
        let button = if copy_controls { COPY_BUTTON } else { "" };
        stash_span(
            &mut stash,
            format!(
                r#"<pre class="ai-code-block"><code class="language-{}">{}</code>{}</pre>"#,
                lang, code, button
            ),
        )
    });

    let text = INLINE_CODE.replace_all(&text, |caps: &Captures| {
        let code = caps.get(1).map_or("", |m| m.as_str());
        stash_span(&mut stash, format!(r#"<code class="ai-inline-code">{}</code>"#, code))
    });

    let text = BOLD.replace_all(&text, "<strong>$1</strong>");
    let text = replace_italic(&text);
    let text = text.replace('\n', "<br>");

    PLACEHOLDER
        .replace_all(&text, |caps: &Captures| {
            caps.get(1)
                .and_then(|m| m.as_str().parse::<usize>().ok())
                .and_then(|idx| stash.get(idx))
                .cloned()
                .unwrap_or_default()
        })
        .into_owned()
}

fn stash_span(stash: &mut Vec<String>, html: String) -> String {
    stash.push(html);
    format!("{}{}{}", STASH_OPEN, stash.len() - 1, STASH_CLOSE)
}

/// Single-asterisk emphasis, only when the markers sit next to whitespace or
/// the edges of the text.
fn replace_italic(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut start = 0;

    while let Some(caps) = ITALIC.captures_at(text, start) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let opens = text[..whole.start()]
            .chars()
            .next_back()
            .map_or(true, char::is_whitespace);
        let closes = text[whole.end()..]
            .chars()
            .next()
            .map_or(true, char::is_whitespace);
        if !(opens && closes) {
            // The closing marker may open the next span
            start = whole.start() + 1;
            continue;
        }

        out.push_str(&text[last..whole.start()]);
        out.push_str("<em>");
        out.push_str(inner.as_str());
        out.push_str("</em>");
        last = whole.end();
        start = whole.end();
    }

    out.push_str(&text[last..]);
    out
}
