//! Tree-structured markup: an explicit element builder for requests and a parsed
//! element tree with path-based lookup for responses.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{GatewayError, GatewayResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Concatenated text content, `None` for an element without text.
    pub fn text(&self) -> Option<String> {
        let mut texts = self.children.iter().filter_map(|node| match node {
            XmlNode::Text(text) => Some(text.as_str()),
            XmlNode::Element(_) => None,
        });
        let first = texts.next()?;
        Some(texts.fold(first.to_string(), |mut acc, t| {
            acc.push_str(t);
            acc
        }))
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.name == name)
    }

    /// First element reached by following `path` (`A/B/C`) from this element.
    pub fn find(&self, path: &str) -> Option<&XmlElement> {
        path.split('/')
            .filter(|step| !step.is_empty())
            .try_fold(self, |element, step| element.child(step))
    }

    /// Every element matching `path`, in document order.
    pub fn find_all(&self, path: &str) -> Vec<&XmlElement> {
        path.split('/')
            .filter(|step| !step.is_empty())
            .fold(vec![self], |frontier, step| {
                frontier
                    .into_iter()
                    .flat_map(|element| element.elements().filter(move |e| e.name == step))
                    .collect()
            })
    }

    pub fn find_text(&self, path: &str) -> Option<String> {
        self.find(path).and_then(XmlElement::text)
    }

    /// Parse a complete document and return its root element.
    pub fn parse(body: &str) -> GatewayResult<Self> {
        let mut reader = Reader::from_str(body.trim());
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event()? {
                Event::Start(start) => stack.push(element_from(&start)?),
                Event::Empty(start) => {
                    let element = element_from(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| GatewayError::malformed("unbalanced end tag"))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|e| GatewayError::malformed(e.to_string()))?;
                    push_text(&mut stack, &text);
                }
                Event::CData(data) => {
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    push_text(&mut stack, &text);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(GatewayError::malformed(format!(
                "element <{}> is never closed",
                open.name
            )));
        }
        root.ok_or_else(|| GatewayError::malformed("document has no root element"))
    }

    /// Serialize this element, optionally preceded by an XML declaration.
    pub fn to_xml_string(&self, declaration: bool) -> GatewayResult<String> {
        let mut writer = Writer::new(Vec::new());
        if declaration {
            writer
                .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
                .map_err(|e| GatewayError::encoding(e.to_string()))?;
        }
        write_element(&mut writer, self)?;
        String::from_utf8(writer.into_inner()).map_err(|e| GatewayError::encoding(e.to_string()))
    }
}

fn element_from(start: &BytesStart<'_>) -> GatewayResult<XmlElement> {
    let mut element = XmlElement::new(String::from_utf8_lossy(start.name().as_ref()));
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| GatewayError::malformed(e.to_string()))?;
        let value = attribute
            .unescape_value()
            .map_err(|e| GatewayError::malformed(e.to_string()))?;
        element.attributes.push((
            String::from_utf8_lossy(attribute.key.as_ref()).into_owned(),
            value.into_owned(),
        ));
    }
    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> GatewayResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => return Err(GatewayError::malformed("more than one root element")),
    }
    Ok(())
}

fn push_text(stack: &mut [XmlElement], text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(current) = stack.last_mut() {
        current.children.push(XmlNode::Text(text.to_string()));
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &XmlElement) -> GatewayResult<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(|e| GatewayError::encoding(e.to_string()));
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| GatewayError::encoding(e.to_string()))?;
    for child in &element.children {
        match child {
            XmlNode::Element(inner) => write_element(writer, inner)?,
            XmlNode::Text(text) => writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(|e| GatewayError::encoding(e.to_string()))?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(|e| GatewayError::encoding(e.to_string()))
}

/// Explicit start/text/end builder producing an [`XmlElement`] tree.
///
/// With a leaf default configured, every element that receives text also gets that
/// attribute unless it already carries one with the same name. Containers and
/// empty elements are left untouched.
#[derive(Debug, Default)]
pub struct XmlBuilder {
    stack: Vec<XmlElement>,
    root: Option<XmlElement>,
    leaf_default: Option<(&'static str, &'static str)>,
}

impl XmlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_leaf_default(key: &'static str, value: &'static str) -> Self {
        Self {
            leaf_default: Some((key, value)),
            ..Self::default()
        }
    }

    pub fn start_element(&mut self, name: &str, attributes: &[(&str, &str)]) -> &mut Self {
        let mut element = XmlElement::new(name);
        element.attributes = attributes
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.stack.push(element);
        self
    }

    pub fn text(&mut self, value: &str) -> &mut Self {
        if let Some(current) = self.stack.last_mut() {
            if let Some((key, default)) = self.leaf_default {
                if current.attribute(key).is_none() {
                    current.attributes.push((key.to_string(), default.to_string()));
                }
            }
            current.children.push(XmlNode::Text(value.to_string()));
        }
        self
    }

    pub fn end_element(&mut self, name: &str) -> GatewayResult<&mut Self> {
        let element = self
            .stack
            .pop()
            .ok_or_else(|| GatewayError::encoding(format!("</{name}> without open element")))?;
        if element.name != name {
            return Err(GatewayError::encoding(format!(
                "</{name}> closes <{}>",
                element.name
            )));
        }
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(XmlNode::Element(element)),
            None if self.root.is_none() => self.root = Some(element),
            None => return Err(GatewayError::encoding("more than one root element")),
        }
        Ok(self)
    }

    /// Container element whose content is produced by `body`.
    pub fn element<F>(&mut self, name: &str, body: F) -> GatewayResult<&mut Self>
    where
        F: FnOnce(&mut Self) -> GatewayResult<()>,
    {
        self.start_element(name, &[]);
        body(self)?;
        self.end_element(name)
    }

    pub fn leaf(&mut self, name: &str, value: &str) -> GatewayResult<&mut Self> {
        self.leaf_with(name, value, &[])
    }

    pub fn leaf_with(
        &mut self,
        name: &str,
        value: &str,
        attributes: &[(&str, &str)],
    ) -> GatewayResult<&mut Self> {
        self.start_element(name, attributes).text(value).end_element(name)
    }

    /// Leaf emitted only when a value is present.
    pub fn opt_leaf(&mut self, name: &str, value: Option<&str>) -> GatewayResult<&mut Self> {
        match value {
            Some(value) => self.leaf(name, value),
            None => Ok(self),
        }
    }

    pub fn empty(&mut self, name: &str) -> GatewayResult<&mut Self> {
        self.start_element(name, &[]).end_element(name)
    }

    pub fn finish(self) -> GatewayResult<XmlElement> {
        if let Some(open) = self.stack.last() {
            return Err(GatewayError::encoding(format!(
                "element <{}> is never closed",
                open.name
            )));
        }
        self.root
            .ok_or_else(|| GatewayError::encoding("document has no root element"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(builder: XmlBuilder) -> String {
        builder.finish().unwrap().to_xml_string(false).unwrap()
    }

    #[test]
    fn test_leaf_default_is_appended() {
        let mut xml = XmlBuilder::with_leaf_default("DataType", "String");
        xml.leaf("DocVersion", "1.0").unwrap();
        assert_eq!(render(xml), r#"<DocVersion DataType="String">1.0</DocVersion>"#);
    }

    #[test]
    fn test_leaf_default_does_not_override() {
        let mut xml = XmlBuilder::with_leaf_default("DataType", "String");
        xml.leaf_with("DocVersion", "1.0", &[("DataType", "S32")]).unwrap();
        assert_eq!(render(xml), r#"<DocVersion DataType="S32">1.0</DocVersion>"#);
    }

    #[test]
    fn test_containers_carry_no_default() {
        let mut xml = XmlBuilder::with_leaf_default("DataType", "String");
        xml.element("DocVersion", |x| {
            x.empty("Ciao")?;
            Ok(())
        })
        .unwrap();
        assert_eq!(render(xml), "<DocVersion><Ciao/></DocVersion>");
    }

    #[test]
    fn test_text_is_escaped() {
        let mut xml = XmlBuilder::new();
        xml.leaf("NAME", "Tom & <Jerry>").unwrap();
        assert_eq!(render(xml), "<NAME>Tom &amp; &lt;Jerry&gt;</NAME>");
    }

    #[test]
    fn test_mismatched_end_is_rejected() {
        let mut xml = XmlBuilder::new();
        xml.start_element("A", &[]);
        assert!(xml.end_element("B").is_err());
    }

    #[test]
    fn test_parse_and_find() {
        let doc = XmlElement::parse(
            "<?xml version=\"1.0\"?>\n<XML>\n  <REQUEST>\n    <RESPONSE><RESULT>OK</RESULT></RESPONSE>\n  </REQUEST>\n</XML>",
        )
        .unwrap();
        assert_eq!(doc.name, "XML");
        assert_eq!(doc.find_text("REQUEST/RESPONSE/RESULT").as_deref(), Some("OK"));
        assert_eq!(doc.find_text("REQUEST/RESPONSE/ROW/ORDERID"), None);
    }

    #[test]
    fn test_find_all_in_document_order() {
        let doc = XmlElement::parse(
            "<L><M><T>one</T></M><M><T>two</T></M><X/><M><T>three</T></M></L>",
        )
        .unwrap();
        let texts: Vec<String> = doc
            .find_all("M/T")
            .into_iter()
            .filter_map(XmlElement::text)
            .collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        assert!(XmlElement::parse("<A><B></A>").is_err());
        assert!(XmlElement::parse("not xml at all").is_err());
    }
}
