use crate::config::READER_BUFFER_SIZE;
use crate::models::Page;
use anyhow::{Context, Result};
use bzip2::read::MultiBzDecoder;
use quick_xml::events::{BytesText, Event};
use quick_xml::reader::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use tracing::warn;

/// Opens a dump for streaming, decompressing `.bz2` files on the fly.
pub fn open_dump(path: &str) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).with_context(|| format!("Failed to open dump at: {}", path))?;
    if path.ends_with(".bz2") {
        Ok(Box::new(BufReader::with_capacity(
            READER_BUFFER_SIZE,
            MultiBzDecoder::new(file),
        )))
    } else {
        Ok(Box::new(BufReader::with_capacity(READER_BUFFER_SIZE, file)))
    }
}

#[derive(Clone, Copy)]
enum Field {
    Title,
    Id,
}

/// Per-page parse state, reset on every `<page>`.
#[derive(Default)]
struct PageState {
    id: Option<String>,
    title: Option<String>,
    text: Option<String>,
    redirect: bool,
    inside_revision: bool,
    inside_text: bool,
    field: Option<Field>,
    value: String,
}

impl PageState {
    fn push_text(&mut self, chunk: &str) {
        if self.inside_text {
            self.text.get_or_insert_with(String::new).push_str(chunk);
        } else if self.field.is_some() {
            self.value.push_str(chunk);
        }
    }

    /// Revision and contributor ids share the `<id>` tag with the page id, so
    /// nothing is captured inside `<revision>`; the first value per page wins.
    fn close_field(&mut self) {
        let value = std::mem::take(&mut self.value);
        match self.field.take() {
            Some(Field::Title) if self.title.is_none() => {
                self.title = Some(value.trim().to_string())
            }
            Some(Field::Id) if self.id.is_none() => self.id = Some(value.trim().to_string()),
            _ => {}
        }
    }

    fn into_page(self) -> Option<Page> {
        let id = self.id.filter(|id| !id.is_empty())?;
        Some(Page {
            id,
            title: self.title.unwrap_or_default(),
            text: self.text,
            redirect: self.redirect,
        })
    }
}

/// Streams `Page`s out of a MediaWiki XML export without holding more than one
/// page in memory.
pub struct WikiReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    done: bool,
}

impl WikiReader<Box<dyn BufRead>> {
    pub fn open(path: &str) -> Result<Self> {
        Ok(Self::from_reader(open_dump(path)?))
    }
}

impl<R: BufRead> WikiReader<R> {
    pub fn from_reader(inner: R) -> Self {
        Self {
            reader: Reader::from_reader(inner),
            buf: Vec::with_capacity(64 * 1024),
            done: false,
        }
    }

    fn next_page(&mut self) -> Result<Option<Page>, quick_xml::Error> {
        let mut state: Option<PageState> = None;

        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => {
                    let name = e.local_name();
                    if name.as_ref() == b"page" {
                        state = Some(PageState::default());
                        continue;
                    }
                    let Some(page) = state.as_mut() else { continue };
                    match name.as_ref() {
                        b"revision" => page.inside_revision = true,
                        b"text" => {
                            page.inside_text = true;
                            page.text.get_or_insert_with(String::new);
                        }
                        b"title" if !page.inside_revision => {
                            page.field = Some(Field::Title);
                            page.value.clear();
                        }
                        b"id" if !page.inside_revision => {
                            page.field = Some(Field::Id);
                            page.value.clear();
                        }
                        _ => {}
                    }
                }
                Event::Empty(e) => {
                    if let Some(page) = state.as_mut() {
                        if e.local_name().as_ref() == b"redirect" {
                            page.redirect = true;
                        }
                    }
                }
                Event::Text(e) => {
                    if let Some(page) = state.as_mut() {
                        page.push_text(&decode_text(&e));
                    }
                }
                Event::CData(e) => {
                    if let Some(page) = state.as_mut() {
                        page.push_text(&String::from_utf8_lossy(&e));
                    }
                }
                Event::End(e) => {
                    let name = e.local_name();
                    if name.as_ref() == b"page" {
                        if let Some(page) = state.take().and_then(PageState::into_page) {
                            return Ok(Some(page));
                        }
                        continue;
                    }
                    let Some(page) = state.as_mut() else { continue };
                    match name.as_ref() {
                        b"revision" => page.inside_revision = false,
                        b"text" => page.inside_text = false,
                        b"title" | b"id" => page.close_field(),
                        _ => {}
                    }
                }
                Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }
}

/// XML escapes are decoded here; text with entities the XML layer does not know
/// is passed through raw for the markup normalizer to handle.
fn decode_text(e: &BytesText<'_>) -> String {
    match e.unescape() {
        Ok(text) => text.into_owned(),
        Err(_) => String::from_utf8_lossy(e).into_owned(),
    }
}

impl<R: BufRead> Iterator for WikiReader<R> {
    type Item = Page;

    fn next(&mut self) -> Option<Page> {
        if self.done {
            return None;
        }
        match self.next_page() {
            Ok(Some(page)) => Some(page),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                warn!(
                    error = %e,
                    position = self.reader.buffer_position(),
                    "Malformed XML, ending page stream"
                );
                self.done = true;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(xml: &str) -> Vec<Page> {
        WikiReader::from_reader(xml.as_bytes()).collect()
    }

    const SAMPLE: &str = r#"<mediawiki>
  <siteinfo><sitename>Wikipedia</sitename></siteinfo>
  <page>
    <title>Paris</title>
    <ns>0</ns>
    <id>681159</id>
    <revision>
      <id>1001</id>
      <contributor><username>Someone</username><id>42</id></contributor>
      <text bytes="40" xml:space="preserve">'''Paris''' is the capital of [[France]].
Second line &amp;nbsp; here.</text>
    </revision>
  </page>
  <page>
    <title>Lutetia</title>
    <ns>0</ns>
    <id>2</id>
    <redirect title="Paris" />
    <revision>
      <id>1002</id>
      <text xml:space="preserve">#REDIRECT [[Paris]]</text>
    </revision>
  </page>
</mediawiki>"#;

    #[test]
    fn reads_all_pages() {
        let pages = read_all(SAMPLE);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].title, "Paris");
        assert_eq!(pages[1].title, "Lutetia");
    }

    #[test]
    fn page_id_is_not_taken_from_revision() {
        let pages = read_all(SAMPLE);
        assert_eq!(pages[0].id, "681159");
        assert_eq!(pages[1].id, "2");
    }

    #[test]
    fn text_is_kept_verbatim_with_xml_escapes_decoded() {
        let pages = read_all(SAMPLE);
        let text = pages[0].text.as_deref().unwrap();
        assert!(text.starts_with("'''Paris''' is the capital of [[France]].\n"));
        assert!(text.contains("&nbsp;"));
    }

    #[test]
    fn redirect_element_is_flagged() {
        let pages = read_all(SAMPLE);
        assert!(!pages[0].redirect);
        assert!(pages[1].redirect);
    }

    #[test]
    fn page_without_id_is_not_emitted() {
        let xml = "<mediawiki><page><title>Nameless</title><revision><text>x</text></revision></page></mediawiki>";
        assert!(read_all(xml).is_empty());
    }

    #[test]
    fn empty_text_element_gives_no_text() {
        let xml = "<mediawiki><page><title>A</title><id>1</id><revision><id>9</id><text bytes=\"0\" /></revision></page></mediawiki>";
        let pages = read_all(xml);
        assert_eq!(pages.len(), 1);
        assert!(pages[0].text.is_none());
    }

    #[test]
    fn first_title_wins() {
        let xml = "<mediawiki><page><title>First</title><title>Second</title><id>1</id></page></mediawiki>";
        let pages = read_all(xml);
        assert_eq!(pages[0].title, "First");
    }

    #[test]
    fn state_resets_between_pages() {
        let xml = "<mediawiki><page><title>A</title><id>1</id><revision><text>alpha</text></revision></page>\
                   <page><title>B</title><id>2</id></page></mediawiki>";
        let pages = read_all(xml);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].title, "B");
        assert!(pages[1].text.is_none());
    }

    #[test]
    fn truncated_stream_keeps_complete_pages() {
        let xml = "<mediawiki><page><title>A</title><id>1</id></page><page><title>B</ti";
        let pages = read_all(xml);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].id, "1");
    }
}
