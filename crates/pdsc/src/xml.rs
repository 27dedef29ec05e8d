//! Minimal owned element tree over `quick-xml` events.
//!
//! Descriptor files are small (a few hundred KiB at most) and are walked
//! several times during inheritance resolution, so building a tree once is
//! simpler than streaming.

use crate::error::{ErrorKind, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    /// Parse a whole document and return its root element.
    pub(crate) fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;
        loop {
            let event = reader.read_event();
            let position = reader.buffer_position();
            let event = event.map_err(|e| malformed(format!("{e} (at byte {position})")))?;
            match event {
                Event::Start(start) => stack.push(Self::from_start(&start)?),
                Event::Empty(start) => {
                    let element = Self::from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                },
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| malformed("unbalanced closing tag"))?;
                    attach(&mut stack, &mut root, element)?;
                },
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        let text = text.unescape().map_err(|e| malformed(e.to_string()))?;
                        current.text.push_str(&text);
                    }
                },
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                },
                Event::Eof => break,
                _ => {},
            }
        }

        if !stack.is_empty() {
            exn::bail!(malformed("unexpected end of document"));
        }
        root.ok_or_else(|| exn::Exn::from(malformed("document has no root element")))
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| malformed(e.to_string()))?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute.unescape_value().map_err(|e| malformed(e.to_string()))?;
            attributes.push((key, value.into_owned()));
        }
        Ok(Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            attributes,
            ..Self::default()
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub(crate) fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter()
    }

    pub(crate) fn children_named<'a, 'b>(&'a self, name: &'b str) -> impl Iterator<Item = &'a Element> + use<'a, 'b> {
        self.children.iter().filter(move |child| child.name == name)
    }

    pub(crate) fn child<'a>(&'a self, name: &str) -> Option<&'a Element> {
        self.children_named(name).next()
    }

    pub(crate) fn text(&self) -> &str {
        self.text.trim()
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => exn::bail!(malformed("multiple root elements")),
    }
    Ok(())
}

fn malformed(message: impl Into<String>) -> ErrorKind {
    ErrorKind::MalformedXml(message.into())
}
