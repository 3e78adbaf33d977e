use std::borrow::Cow;
use std::io::{Read, Write};

use xml::writer::EventWriter;
use xml::writer::XmlEvent as XmlWEvent;
use xml::EmitterConfig;
use xmltree::{Element, XMLNode};

use crate::{DavError, DavResult};

pub(crate) const NS_DAV_URI: &str = "DAV:";

pub(crate) trait ElementExt {
    /// Builder: `new2("D:href")` makes an element `href` in the `DAV:` namespace.
    fn new2(n: &str) -> Self;
    /// Builder: set text content.
    fn text<T: Into<String>>(self, t: T) -> Self;
    /// Builder: add a child element.
    fn child(self, e: Element) -> Self;
    /// Declare the `D` prefix on this element.
    fn dav_ns(self) -> Self;
    /// Parse a document from a reader, only the root element is returned.
    fn parse2<R: Read>(r: R) -> Result<Element, DavError>;
    /// Is this element `DAV:name`.
    fn is_dav(&self, name: &str) -> bool;
    /// Child elements, skipping text, comments and such.
    fn child_elems(&self) -> Box<dyn Iterator<Item = &Element> + '_>;
    /// Write this element (and its children) to an EventWriter.
    fn write_ev<W: Write>(&self, emitter: &mut EventWriter<W>) -> xml::writer::Result<()>;
}

impl ElementExt for Element {
    fn new2(n: &str) -> Element {
        let v: Vec<&str> = n.splitn(2, ':').collect();
        if v.len() == 1 {
            Element::new(v[0])
        } else {
            let mut e = Element::new(v[1]);
            e.prefix = Some(v[0].to_string());
            if v[0] == "D" {
                e.namespace = Some(NS_DAV_URI.to_string());
            }
            e
        }
    }

    fn text<T: Into<String>>(mut self, t: T) -> Element {
        self.children.push(XMLNode::Text(t.into()));
        self
    }

    fn child(mut self, e: Element) -> Element {
        self.children.push(XMLNode::Element(e));
        self
    }

    fn dav_ns(mut self) -> Element {
        let mut ns = xml::namespace::Namespace::empty();
        ns.put("D", NS_DAV_URI);
        self.namespaces = Some(ns);
        self
    }

    fn parse2<R: Read>(r: R) -> Result<Element, DavError> {
        let res = Element::parse(r);
        match res {
            Ok(elem) => Ok(elem),
            Err(xmltree::ParseError::MalformedXml(_)) => Err(DavError::XmlParseError),
            Err(_) => Err(DavError::XmlReadError),
        }
    }

    fn is_dav(&self, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == Some(NS_DAV_URI)
    }

    fn child_elems(&self) -> Box<dyn Iterator<Item = &Element> + '_> {
        Box::new(self.children.iter().filter_map(|n| match n {
            XMLNode::Element(e) => Some(e),
            _ => None,
        }))
    }

    fn write_ev<W: Write>(&self, emitter: &mut EventWriter<W>) -> xml::writer::Result<()> {
        use xml::attribute::Attribute;
        use xml::name::Name;
        use xml::namespace::Namespace;

        let mut name = Name::local(&self.name);
        if let Some(ref ns) = self.namespace {
            name.namespace = Some(ns);
        }
        if let Some(ref p) = self.prefix {
            name.prefix = Some(p);
        }

        let mut attributes = Vec::with_capacity(self.attributes.len());
        for (k, v) in &self.attributes {
            attributes.push(Attribute {
                name: Name::local(k),
                value: v,
            });
        }

        let empty_ns = Namespace::empty();
        let namespace = match self.namespaces {
            Some(ref ns) => Cow::Borrowed(ns),
            None => Cow::Borrowed(&empty_ns),
        };

        emitter.write(XmlWEvent::StartElement {
            name,
            attributes: Cow::Owned(attributes),
            namespace,
        })?;
        for node in &self.children {
            match node {
                XMLNode::Element(e) => e.write_ev(emitter)?,
                XMLNode::Text(t) => emitter.write(XmlWEvent::Characters(t))?,
                _ => {}
            }
        }
        emitter.write(XmlWEvent::EndElement { name: Some(name) })?;

        Ok(())
    }
}

/// Emitter that writes compact utf-8 xml, no indentation.
pub(crate) fn emitter<W: Write>(w: W) -> DavResult<EventWriter<W>> {
    let mut emitter = EventWriter::new_with_config(
        w,
        EmitterConfig {
            normalize_empty_elements: false,
            perform_indent: false,
            indent_string: Cow::Borrowed(""),
            ..Default::default()
        },
    );
    emitter.write(XmlWEvent::StartDocument {
        version: xml::common::XmlVersion::Version10,
        encoding: Some("utf-8"),
        standalone: None,
    })?;
    Ok(emitter)
}
