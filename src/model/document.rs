//! In-memory document model walked by the marshaller.

/// Namespace of XOP placeholder elements.
pub const XOP_NAMESPACE: &str = "http://www.w3.org/2004/08/xop/include";

/// Local name of XOP placeholder elements.
pub const XOP_INCLUDE: &str = "Include";

/// Namespace of the `xmime:contentType` attribute.
pub const XMIME_NAMESPACE: &str = "http://www.w3.org/2005/05/xmlmime";

/// A namespace-qualified XML name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    /// Namespace URI, empty for no namespace.
    pub namespace: String,
    pub local_name: String,
    /// Preferred prefix when writing. `None` uses the default namespace.
    pub prefix: Option<String>,
}

impl QName {
    /// A name without namespace.
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace: String::new(),
            local_name: local_name.into(),
            prefix: None,
        }
    }

    /// A name in `namespace`, written with the default namespace.
    pub fn new(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local_name: local_name.into(),
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.namespace == namespace && self.local_name == local_name
    }

    /// True for `{http://www.w3.org/2004/08/xop/include}Include`.
    pub fn is_xop_include(&self) -> bool {
        self.is(XOP_NAMESPACE, XOP_INCLUDE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

/// Binary value of a field, either inlined or externalized at marshal time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryField {
    pub data: Vec<u8>,
    /// Declared MIME type. When absent the enclosing element's
    /// `xmime:contentType` attribute applies.
    pub content_type: Option<String>,
}

impl BinaryField {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    /// An `xs:base64Binary` value, a candidate for XOP.
    Binary(BinaryField),
    /// A `swaRef` value, always externalized.
    SwaRef(BinaryField),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: QName,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: QName, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute {
            name,
            value: value.into(),
        });
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn with_binary(mut self, field: BinaryField) -> Self {
        self.children.push(Node::Binary(field));
        self
    }

    pub fn with_swaref(mut self, field: BinaryField) -> Self {
        self.children.push(Node::SwaRef(field));
        self
    }

    /// Value of the attribute `{namespace}local_name`, if present.
    pub fn attribute(&self, namespace: &str, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.is(namespace, local_name))
            .map(|a| a.value.as_str())
    }

    /// Value of the `xmime:contentType` attribute, if present.
    pub fn xmime_content_type(&self) -> Option<&str> {
        self.attribute(XMIME_NAMESPACE, "contentType")
    }

    /// Iterate over direct child elements.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }
}

/// Whether the model builder already looked for `xop:Include` elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PlaceholderScan {
    /// Not scanned; the guard walks the tree.
    #[default]
    Unknown,
    /// Scanned while building; none present.
    Absent,
    /// Scanned while building; the first one found, as a slash path.
    Found(String),
}

/// A document ready for marshalling.
///
/// The root is only reachable mutably through [`Document::root_mut`], which
/// drops any recorded placeholder scan so the guard never trusts a stale one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Element,
    placeholder_scan: PlaceholderScan,
}

impl Document {
    pub fn new(root: Element) -> Self {
        Self {
            root,
            placeholder_scan: PlaceholderScan::Unknown,
        }
    }

    /// A document whose builder already looked for placeholders.
    pub(crate) fn with_placeholder_scan(root: Element, placeholder_scan: PlaceholderScan) -> Self {
        Self {
            root,
            placeholder_scan,
        }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Mutable access to the tree. Forgets the recorded placeholder scan.
    pub fn root_mut(&mut self) -> &mut Element {
        self.placeholder_scan = PlaceholderScan::Unknown;
        &mut self.root
    }

    pub fn into_root(self) -> Element {
        self.root
    }

    pub fn placeholder_scan(&self) -> &PlaceholderScan {
        &self.placeholder_scan
    }
}
