use crate::index::IdentifierIndex;
use crate::models::{LinkedSegment, Mention};
use crate::segment::Segmenter;
use std::fmt;
use thiserror::Error;

/// What the scanner is doing with the next character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Outside,
    EntityTitle,
    MentionLabel,
    /// Nested or piped-twice span; its content is dropped.
    SpecialCase,
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanMode::Outside => "reading text",
            ScanMode::EntityTitle => "reading a link title",
            ScanMode::MentionLabel => "reading a link label",
            ScanMode::SpecialCase => "skipping a nested link",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("unexpected {ch:?} at character {offset} while {mode} at bracket depth {depth}")]
    UnexpectedState {
        ch: char,
        offset: usize,
        mode: ScanMode,
        depth: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Article,
    /// `[[Title#Section]]`
    Fragment,
    /// `[[:fr:Paris]]`, `[[:Category:X]]`
    Interwiki,
}

/// A closed `[[...]]` span that was not a special case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSpan {
    pub title: String,
    /// Text after the pipe, `Some("")` for the pipe trick `[[Title|]]`.
    pub label: Option<String>,
    pub kind: LinkKind,
    /// Character range of the label in the emitted text. Only article links
    /// are emitted.
    pub range: Option<(usize, usize)>,
}

impl LinkSpan {
    /// The label shown for this link, defaulting to the title.
    pub fn surface(&self) -> &str {
        match self.label.as_deref() {
            Some(label) if !label.is_empty() => label,
            _ => &self.title,
        }
    }
}

/// Plain text of a scanned segment plus every link found in it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanOutput {
    pub text: String,
    pub links: Vec<LinkSpan>,
}

/// Single left-to-right pass over one segment. Bracket characters are never
/// emitted; `[[title|label]]` becomes `label` in the output text.
struct LinkScanner {
    mode: ScanMode,
    depth: usize,
    text: String,
    text_chars: usize,
    title: String,
    label: String,
    links: Vec<LinkSpan>,
}

impl LinkScanner {
    fn new(capacity: usize) -> Self {
        Self {
            mode: ScanMode::Outside,
            depth: 0,
            text: String::with_capacity(capacity),
            text_chars: 0,
            title: String::new(),
            label: String::new(),
            links: Vec::new(),
        }
    }

    fn feed(&mut self, ch: char, offset: usize) -> Result<(), ScanError> {
        match ch {
            '[' => self.depth += 1,
            ']' => self.depth = self.depth.saturating_sub(1),
            '|' => match self.mode {
                ScanMode::Outside => self.emit_char(ch),
                ScanMode::EntityTitle => self.mode = ScanMode::MentionLabel,
                ScanMode::MentionLabel | ScanMode::SpecialCase => self.mode = ScanMode::SpecialCase,
            },
            _ => match (self.mode, self.depth) {
                (ScanMode::Outside, depth) if depth < 2 => self.emit_char(ch),
                (ScanMode::EntityTitle, depth) if depth > 0 => self.title.push(ch),
                (ScanMode::MentionLabel, depth) if depth > 0 => self.label.push(ch),
                (ScanMode::SpecialCase, depth) if depth > 0 => {}
                (mode, depth) => {
                    return Err(ScanError::UnexpectedState {
                        ch,
                        offset,
                        mode,
                        depth,
                    })
                }
            },
        }

        if self.mode == ScanMode::Outside && self.depth == 2 {
            self.mode = ScanMode::EntityTitle;
        }
        if self.depth > 2 && self.mode != ScanMode::Outside {
            self.mode = ScanMode::SpecialCase;
        }
        if self.depth == 0 && self.mode != ScanMode::Outside {
            self.close_span();
        }
        Ok(())
    }

    fn emit_char(&mut self, ch: char) {
        self.text.push(ch);
        self.text_chars += 1;
    }

    fn close_span(&mut self) {
        let mode = std::mem::replace(&mut self.mode, ScanMode::Outside);
        let title = std::mem::take(&mut self.title);
        let label = std::mem::take(&mut self.label);
        if mode == ScanMode::SpecialCase {
            return;
        }

        let kind = if title.starts_with(':') {
            LinkKind::Interwiki
        } else if title.contains('#') {
            LinkKind::Fragment
        } else {
            LinkKind::Article
        };
        let mut link = LinkSpan {
            title,
            label: (mode == ScanMode::MentionLabel).then_some(label),
            kind,
            range: None,
        };

        if kind == LinkKind::Article {
            let start = self.text_chars;
            let surface = link.surface();
            let len = surface.chars().count();
            self.text.push_str(surface);
            self.text_chars += len;
            link.range = Some((start, start + len));
        }
        self.links.push(link);
    }

    /// A span still open at the end of the segment is dropped.
    fn finish(self) -> ScanOutput {
        ScanOutput {
            text: self.text,
            links: self.links,
        }
    }
}

/// Scans one segment into plain text and raw links.
pub fn scan(segment: &str) -> Result<ScanOutput, ScanError> {
    let mut scanner = LinkScanner::new(segment.len());
    for (offset, ch) in segment.chars().enumerate() {
        scanner.feed(ch, offset)?;
    }
    Ok(scanner.finish())
}

/// Scans a segment and resolves its article links against `index` under `lang`.
/// Returns `None` when the segment produces no text.
pub fn link_segment(
    segment: &str,
    lang: &str,
    index: &IdentifierIndex,
) -> Result<Option<LinkedSegment>, ScanError> {
    let output = scan(segment)?;
    if output.text.trim().is_empty() {
        return Ok(None);
    }

    let mentions = output
        .links
        .iter()
        .filter(|link| link.kind == LinkKind::Article)
        .filter_map(|link| {
            let (start, end) = link.range?;
            if start == end {
                return None;
            }
            let entity = index.resolve(lang, &link.title)?;
            Some(Mention {
                surface: link.surface().to_string(),
                entity: entity.clone(),
                start,
                end,
            })
        })
        .collect();

    Ok(Some(LinkedSegment {
        text: output.text,
        mentions,
    }))
}

/// Splits normalized text with `segmenter` and links every segment, dropping
/// the ones that end up empty. The first scan failure aborts the whole text.
pub fn link_text(
    text: &str,
    lang: &str,
    index: &IdentifierIndex,
    segmenter: &dyn Segmenter,
) -> Result<Vec<LinkedSegment>, ScanError> {
    let mut linked = Vec::new();
    for segment in segmenter.split(text) {
        if let Some(segment) = link_segment(segment, lang, index)? {
            linked.push(segment);
        }
    }
    Ok(linked)
}
