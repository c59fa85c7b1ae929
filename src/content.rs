//! Wikitext to plain text. Only `[[...]]` links survive normalization; the
//! link scanner in [`crate::links`] turns those into text and mentions.

use crate::config::{
    CATEGORY_NAMESPACES, DISCARD_ELEMENTS, FILE_NAMESPACES, IGNORED_TAGS, MAGIC_WORDS,
    META_NAMESPACES, PLACEHOLDER_TAGS, SELF_CLOSING_TAGS, URL_PROTOCOLS,
};
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use rustc_hash::FxHashMap;

static COMMENT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

static NAMESPACE_LINK_REGEX: Lazy<Regex> = Lazy::new(|| {
    let names = alternation(FILE_NAMESPACES.iter().chain(CATEGORY_NAMESPACES));
    Regex::new(&format!(
        r"(?i)\[\[\s*(?:{names})\s*:(?:[^\[\]]|\[\[[^\[\]]*\]\])*\]\]"
    ))
    .unwrap()
});

static SECTION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(={2,})[ \t]*(.+?)[ \t]*={2,}[ \t]*\r?$").unwrap());

static TEMPLATE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{").unwrap());
static TEMPLATE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\}\}").unwrap());
static TABLE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\|").unwrap());
static TABLE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\|\}").unwrap());

static EXTERNAL_LINK_REGEX: Lazy<Regex> = Lazy::new(|| {
    let protocols = alternation(URL_PROTOCOLS.iter());
    Regex::new(&format!(
        r#"(?i)\[(?:{protocols})[^\]\[<>"\x00-\x20\x7F]+\s*([^\]\x00-\x08\x0A-\x1F]*?)\]"#
    ))
    .unwrap()
});

static MAGIC_WORDS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(&alternation(MAGIC_WORDS.iter())).unwrap());

static SYNTAX_HIGHLIGHT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<syntaxhighlight\b[^>]*>(.*?)</syntaxhighlight\s*>").unwrap());

static BOLD_ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"'''''(.*?)'''''").unwrap());
static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"'''(.*?)'''").unwrap());
static ITALIC_QUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"''"([^"]*?)"''"#).unwrap());
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"''(.*?)''").unwrap());
static QUOTE_QUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"""([^"]*?)"""#).unwrap());

static ENTITY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[A-Za-z][A-Za-z0-9]{1,31});").unwrap()
});

static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").unwrap());
static SPACE_BEFORE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r" ([,:.\)\]»])").unwrap());
static SPACE_AFTER_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"([\[\(«]) ").unwrap());
static REPEATED_COMMAS: Lazy<Regex> = Lazy::new(|| Regex::new(r",{2,}").unwrap());
static DOTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{4,}").unwrap());

static META_TITLE_REGEX: Lazy<Regex> = Lazy::new(|| {
    let names = alternation(META_NAMESPACES.iter());
    Regex::new(&format!(r"(?i)^(?::?[a-z][a-z]:|:?(?:{names}):)")).unwrap()
});

static NAMED_ENTITIES: Lazy<FxHashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("amp", "&"),
        ("lt", "<"),
        ("gt", ">"),
        ("quot", "\""),
        ("apos", "'"),
        ("nbsp", "\u{a0}"),
        ("ensp", "\u{2002}"),
        ("emsp", "\u{2003}"),
        ("thinsp", "\u{2009}"),
        ("zwnj", "\u{200c}"),
        ("zwj", "\u{200d}"),
        ("lrm", "\u{200e}"),
        ("rlm", "\u{200f}"),
        ("shy", "\u{ad}"),
        ("ndash", "–"),
        ("mdash", "—"),
        ("minus", "−"),
        ("hellip", "…"),
        ("laquo", "«"),
        ("raquo", "»"),
        ("lsquo", "‘"),
        ("rsquo", "’"),
        ("sbquo", "‚"),
        ("ldquo", "“"),
        ("rdquo", "”"),
        ("bdquo", "„"),
        ("bull", "•"),
        ("middot", "·"),
        ("prime", "′"),
        ("Prime", "″"),
        ("times", "×"),
        ("divide", "÷"),
        ("plusmn", "±"),
        ("deg", "°"),
        ("micro", "µ"),
        ("para", "¶"),
        ("sect", "§"),
        ("copy", "©"),
        ("reg", "®"),
        ("trade", "™"),
        ("euro", "€"),
        ("pound", "£"),
        ("yen", "¥"),
        ("cent", "¢"),
        ("frac12", "½"),
        ("frac14", "¼"),
        ("frac34", "¾"),
        ("sup1", "¹"),
        ("sup2", "²"),
        ("sup3", "³"),
        ("larr", "←"),
        ("rarr", "→"),
        ("uarr", "↑"),
        ("darr", "↓"),
        ("harr", "↔"),
        ("alpha", "α"),
        ("beta", "β"),
        ("gamma", "γ"),
        ("delta", "δ"),
        ("epsilon", "ε"),
        ("theta", "θ"),
        ("lambda", "λ"),
        ("mu", "μ"),
        ("pi", "π"),
        ("sigma", "σ"),
        ("tau", "τ"),
        ("phi", "φ"),
        ("omega", "ω"),
        ("Delta", "Δ"),
        ("Sigma", "Σ"),
        ("Omega", "Ω"),
        ("aacute", "á"),
        ("agrave", "à"),
        ("acirc", "â"),
        ("auml", "ä"),
        ("aring", "å"),
        ("ccedil", "ç"),
        ("eacute", "é"),
        ("egrave", "è"),
        ("ecirc", "ê"),
        ("euml", "ë"),
        ("iacute", "í"),
        ("igrave", "ì"),
        ("iuml", "ï"),
        ("ntilde", "ñ"),
        ("oacute", "ó"),
        ("ograve", "ò"),
        ("ocirc", "ô"),
        ("ouml", "ö"),
        ("oslash", "ø"),
        ("uacute", "ú"),
        ("ugrave", "ù"),
        ("uuml", "ü"),
        ("szlig", "ß"),
        ("Eacute", "É"),
        ("Auml", "Ä"),
        ("Ouml", "Ö"),
        ("Uuml", "Ü"),
    ]
    .into_iter()
    .collect()
});

fn alternation<'a>(words: impl Iterator<Item = &'a &'a str>) -> String {
    words
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|")
}

/// True for titles that point into a meta namespace or another wiki
/// (`Category:`, `Help:`, `fr:`, `:de:`...).
pub fn is_meta_title(title: &str) -> bool {
    META_TITLE_REGEX.is_match(title)
}

/// Tag tables driving the tag-removal stages.
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    pub discard_elements: Vec<String>,
    pub ignored_tags: Vec<String>,
    pub self_closing_tags: Vec<String>,
    pub placeholder_tags: Vec<(String, String)>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        let owned = |tags: &[&str]| tags.iter().map(|t| t.to_string()).collect();
        Self {
            discard_elements: owned(DISCARD_ELEMENTS),
            ignored_tags: owned(IGNORED_TAGS),
            self_closing_tags: owned(SELF_CLOSING_TAGS),
            placeholder_tags: PLACEHOLDER_TAGS
                .iter()
                .map(|(tag, token)| (tag.to_string(), token.to_string()))
                .collect(),
        }
    }
}

/// Compiled form of a [`NormalizerConfig`]. Normalization is a pure function of
/// the input text and these tables.
pub struct Normalizer {
    discard: Vec<(Regex, Regex)>,
    ignored: Vec<(Regex, Regex)>,
    self_closing: Vec<Regex>,
    placeholders: Vec<(Regex, String)>,
}

impl Normalizer {
    pub fn new(config: &NormalizerConfig) -> Result<Self> {
        let compile = |pattern: String| {
            Regex::new(&pattern).with_context(|| format!("Invalid tag pattern: {}", pattern))
        };

        let mut discard = Vec::with_capacity(config.discard_elements.len());
        for tag in &config.discard_elements {
            let tag = regex::escape(tag);
            discard.push((
                // Quoted attribute values may hold `/`; a bare `/>` ends a self-closing tag.
                compile(format!(r#"(?i)<\s*{tag}\b(?:"[^"]*"|'[^']*'|[^>"'/]|/[^>])*>"#))?,
                compile(format!(r"(?i)<\s*/\s*{tag}\s*>"))?,
            ));
        }

        let mut ignored = Vec::with_capacity(config.ignored_tags.len());
        for tag in &config.ignored_tags {
            let tag = regex::escape(tag);
            ignored.push((
                compile(format!(r"(?is)<{tag}\b.*?>"))?,
                compile(format!(r"(?i)</\s*{tag}\s*>"))?,
            ));
        }

        let mut self_closing = Vec::with_capacity(config.self_closing_tags.len());
        for tag in &config.self_closing_tags {
            let tag = regex::escape(tag);
            self_closing.push(compile(format!(r"(?is)<\s*{tag}\b[^>]*/\s*>"))?);
        }

        let mut placeholders = Vec::with_capacity(config.placeholder_tags.len());
        for (tag, token) in &config.placeholder_tags {
            let tag = regex::escape(tag);
            placeholders.push((
                compile(format!(r"(?is)<\s*{tag}(?:\s*|\s[^>]*?)>.*?<\s*/\s*{tag}\s*>"))?,
                token.clone(),
            ));
        }

        Ok(Self {
            discard,
            ignored,
            self_closing,
            placeholders,
        })
    }

    /// Raw revision text to plain text with only double-bracket links left.
    /// The stage order matters: each stage assumes the previous ones already
    /// collapsed the constructs that would confuse it.
    pub fn normalize(&self, raw: &str) -> String {
        let text = prepare(raw);
        let text = drop_nested(&text, &TEMPLATE_OPEN, &TEMPLATE_CLOSE);
        let text = drop_nested(&text, &TABLE_OPEN, &TABLE_CLOSE);
        let text = EXTERNAL_LINK_REGEX.replace_all(&text, "$1");
        let text = MAGIC_WORDS_REGEX.replace_all(&text, "");
        let text = unescape_outside_code(&text);
        let text = collapse_emphasis(&text);
        let mut text = self.drop_tags(&text);
        for (open, close) in &self.discard {
            text = drop_nested(&text, open, close);
        }
        let text = unescape(&text);
        let text = self.expand_placeholders(&text);
        normalize_whitespace(&text)
    }

    /// Comments, self-closing tags and ignored open/close tags are collected
    /// first and cut out in a single pass.
    fn drop_tags(&self, text: &str) -> String {
        let mut spans: Vec<(usize, usize)> = COMMENT_REGEX
            .find_iter(text)
            .map(|m| (m.start(), m.end()))
            .collect();
        for pattern in &self.self_closing {
            spans.extend(pattern.find_iter(text).map(|m| (m.start(), m.end())));
        }
        for (left, right) in &self.ignored {
            spans.extend(left.find_iter(text).map(|m| (m.start(), m.end())));
            spans.extend(right.find_iter(text).map(|m| (m.start(), m.end())));
        }
        drop_spans(text, spans)
    }

    /// Identical elements share a number; numbers follow first appearance.
    fn expand_placeholders(&self, text: &str) -> String {
        let mut result = text.to_string();
        for (pattern, token) in &self.placeholders {
            let mut numbers: FxHashMap<String, usize> = FxHashMap::default();
            result = pattern
                .replace_all(&result, |caps: &Captures| {
                    let next = numbers.len() + 1;
                    let n = *numbers.entry(caps[0].to_string()).or_insert(next);
                    format!("{}_{}", token, n)
                })
                .into_owned();
        }
        result
    }
}

/// Link hygiene applied before the brace stages: comments go, file and category
/// links (with nested caption links) go, headings become sentences.
fn prepare(raw: &str) -> String {
    let text = COMMENT_REGEX.replace_all(raw.trim(), "");
    let text = NAMESPACE_LINK_REGEX.replace_all(&text, "");
    SECTION_REGEX
        .replace_all(&text, |caps: &Captures| {
            let heading = caps[2].trim();
            if heading.ends_with(['.', '!', '?', ':']) {
                heading.to_string()
            } else {
                format!("{}.", heading)
            }
        })
        .into_owned()
}

/// Removes innermost `open ... close` pairs until a pass removes nothing.
/// Iterative on purpose: nesting depth of real templates is unbounded.
pub fn drop_nested(text: &str, open: &Regex, close: &Regex) -> String {
    let mut current = text.to_string();
    loop {
        let previous_len = current.len();
        let spans = innermost_pairs(&current, open, close);
        if spans.is_empty() {
            break;
        }
        current = drop_spans(&current, spans);
        if current.len() >= previous_len {
            break;
        }
    }
    current
}

/// Spans of `open ... close` pairs with no other `open` in between.
fn innermost_pairs(text: &str, open: &Regex, close: &Regex) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut opens = open.find_iter(text).peekable();
    let mut pending: Option<usize> = None;
    let mut cursor = 0;

    for c in close.find_iter(text) {
        if c.start() < cursor {
            continue;
        }
        while let Some(o) = opens.peek() {
            if o.end() > c.start() {
                break;
            }
            if o.start() >= cursor {
                pending = Some(o.start());
            }
            opens.next();
        }
        if let Some(start) = pending.take() {
            spans.push((start, c.end()));
            cursor = c.end();
        }
    }
    spans
}

/// Cuts the given byte spans out of `text`; overlapping spans are merged first.
pub fn drop_spans(text: &str, mut spans: Vec<(usize, usize)>) -> String {
    if spans.is_empty() {
        return text.to_string();
    }
    spans.sort_unstable();
    let mut result = String::with_capacity(text.len());
    let mut offset = 0;
    for (start, end) in spans {
        if end <= offset {
            continue;
        }
        if start > offset {
            result.push_str(&text[offset..start]);
        }
        offset = end;
    }
    if offset < text.len() {
        result.push_str(&text[offset..]);
    }
    result
}

/// Code inside `<syntaxhighlight>` is kept verbatim, everything else unescaped.
fn unescape_outside_code(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut cursor = 0;
    for caps in SYNTAX_HIGHLIGHT_REGEX.captures_iter(text) {
        let (Some(whole), Some(code)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        result.push_str(&unescape(&text[cursor..whole.start()]));
        result.push_str(code.as_str());
        cursor = whole.end();
    }
    result.push_str(&unescape(&text[cursor..]));
    result
}

fn collapse_emphasis(text: &str) -> String {
    let text = BOLD_ITALIC.replace_all(text, "$1");
    let text = BOLD.replace_all(&text, "$1");
    let text = ITALIC_QUOTE.replace_all(&text, "$1");
    let text = ITALIC.replace_all(&text, "$1");
    let text = QUOTE_QUOTE.replace_all(&text, "$1");
    text.replace("'''", "").replace("''", "\"")
}

/// Decodes one level of HTML character references; unknown names stay as they are.
pub fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    ENTITY_REGEX
        .replace_all(text, |caps: &Captures| {
            let code = &caps[1];
            let decoded = if let Some(hex) = code
                .strip_prefix("#x")
                .or_else(|| code.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = code.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                return NAMED_ENTITIES
                    .get(code)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| caps[0].to_string());
            };
            match decoded {
                Some(c) if c != '\0' => c.to_string(),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn normalize_whitespace(text: &str) -> String {
    let text = text
        .replace("<<", "«")
        .replace(">>", "»")
        .replace(['\t', '\u{a0}'], " ");
    let text = SPACES.replace_all(&text, " ");
    let text = SPACE_BEFORE_CLOSE.replace_all(&text, "$1");
    let text = SPACE_AFTER_OPEN.replace_all(&text, "$1");
    let text = REPEATED_COMMAS.replace_all(&text, ",");
    let text = text.replace(",.", ".");
    let text = DOTS.replace_all(&text, "...");

    let mut lines: Vec<&str> = Vec::new();
    for line in text.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            if lines.last().is_some_and(|l| !l.is_empty()) {
                lines.push(line);
            }
        } else if line.chars().any(char::is_alphanumeric) {
            lines.push(line);
        }
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}
