use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::app::{FeedctlError, Result};

/// A navigable XML element: name, attributes, text content, child elements.
///
/// This is the tree shape the API speaks: small configuration documents and
/// responses where an element carries either text or children, never a deep
/// mix of both. Attribute order is preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            text: String::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Set an attribute, replacing any existing value for the same key.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.attrs.push((key, value)),
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First direct child with the given name.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parse a single XML document into an element tree.
    pub fn parse(input: &[u8]) -> Result<Element> {
        let mut reader = Reader::from_reader(input);
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event_into(&mut buf).map_err(xml_err)? {
                Event::Start(start) => {
                    stack.push(element_from_start(&start)?);
                }
                Event::Empty(start) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text.unescape().map_err(xml_err)?);
                    }
                }
                Event::CData(cdata) => {
                    if let Some(current) = stack.last_mut() {
                        current
                            .text
                            .push_str(&String::from_utf8_lossy(cdata.as_ref()));
                    }
                }
                Event::End(_) => {
                    // nb: the reader has already verified the tag names match
                    let element = stack
                        .pop()
                        .ok_or_else(|| FeedctlError::Xml("unbalanced close tag".into()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Eof => break,
                _ => {} // declarations, comments, processing instructions
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(FeedctlError::Xml("unclosed element".into()));
        }
        root.ok_or_else(|| FeedctlError::Xml("no root element".into()))
    }

    /// Serialize the tree back to XML text, escaping attribute values and text.
    pub fn to_xml(&self) -> String {
        let mut writer = Writer::new(Vec::new());
        self.write_into(&mut writer)
            .expect("in-memory XML write cannot fail");
        String::from_utf8(writer.into_inner()).expect("writer emits UTF-8")
    }

    fn write_into(&self, writer: &mut Writer<Vec<u8>>) -> quick_xml::Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attrs {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.text.is_empty() && self.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        if !self.text.is_empty() {
            writer.write_event(Event::Text(BytesText::new(&self.text)))?;
        }
        for child in &self.children {
            child.write_into(writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes() {
        let attr = attr.map_err(xml_err)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(xml_err)?.into_owned();
        element.attrs.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_none() {
        *root = Some(element);
    } else {
        return Err(FeedctlError::Xml("multiple root elements".into()));
    }
    Ok(())
}

fn xml_err(err: impl std::fmt::Display) -> FeedctlError {
    FeedctlError::Xml(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHANNEL_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<channel type="standard">
  <feedUrl>https://example.com/feed.xml</feedUrl>
  <name>Example Feed</name>
  <options synchronize="true"/>
</channel>"#;

    #[test]
    fn parse_sample_document() {
        let root = Element::parse(CHANNEL_SAMPLE.as_bytes()).unwrap();

        assert_eq!(root.name, "channel");
        assert_eq!(root.attr("type"), Some("standard"));
        assert_eq!(root.children.len(), 3);
        assert_eq!(
            root.find("feedUrl").unwrap().text(),
            "https://example.com/feed.xml"
        );
        assert_eq!(root.find("name").unwrap().text(), "Example Feed");
        assert_eq!(
            root.find("options").unwrap().attr("synchronize"),
            Some("true")
        );
        assert!(root.find("missing").is_none());
    }

    #[test]
    fn round_trip_preserves_structure() {
        let root = Element::parse(CHANNEL_SAMPLE.as_bytes()).unwrap();
        let reparsed = Element::parse(root.to_xml().as_bytes()).unwrap();
        assert_eq!(root, reparsed);
    }

    #[test]
    fn escapes_special_characters() {
        let element = Element::new("query")
            .with_attr("filter", "a < b & c")
            .with_text("rust \"2021\" <stable>");

        let xml = element.to_xml();
        assert!(xml.contains("&lt;"));
        assert!(xml.contains("&amp;"));

        let reparsed = Element::parse(xml.as_bytes()).unwrap();
        assert_eq!(reparsed.attr("filter"), Some("a < b & c"));
        assert_eq!(reparsed.text(), "rust \"2021\" <stable>");
    }

    #[test]
    fn empty_element_serializes_self_closed() {
        let element = Element::new("apiArgs").with_attr("token", "abc");
        assert_eq!(element.to_xml(), r#"<apiArgs token="abc"/>"#);
    }

    #[test]
    fn set_attr_replaces_existing_value() {
        let mut element = Element::new("apiArgs");
        element.set_attr("id", "1");
        element.set_attr("id", "2");
        assert_eq!(element.attr("id"), Some("2"));
        assert_eq!(element.attrs.len(), 1);
    }

    #[test]
    fn children_named_filters_by_name() {
        let root = Element::new("channels")
            .with_child(Element::new("channel").with_attr("id", "1"))
            .with_child(Element::new("other"))
            .with_child(Element::new("channel").with_attr("id", "2"));

        let ids: Vec<_> = root
            .children_named("channel")
            .filter_map(|c| c.attr("id"))
            .collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn rejects_garbage_input() {
        assert!(Element::parse(b"not xml at all").is_err());
        assert!(Element::parse(b"").is_err());
        assert!(Element::parse(b"<open><unclosed></open>").is_err());
    }
}
