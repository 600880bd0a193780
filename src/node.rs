//! The Node Model: an in-memory description of a desired rendered state.

use crate::{
	dom::Dom,
	props::{is_component_tag, Props, Value},
};
use hashbrown::HashMap;

/// Attribute name that switches an element and its descendants into namespace-qualified creation.
pub const XMLNS: &str = "xmlns";

/// A text or element description, with a back-reference to its live counterpart once mounted.
#[derive(Debug, Clone)]
pub enum Node<D: Dom> {
	Text(Text<D>),
	Element(Element<D>),
}

#[derive(Debug, Clone)]
pub struct Text<D: Dom> {
	pub value: String,
	pub rendered: Option<D::Node>,
}

/// An element description.
///
/// `listeners` records the live listeners attached for event props, keyed by event name.
/// Producers leave it empty; the engines fill it.
#[derive(Debug, Clone)]
pub struct Element<D: Dom> {
	pub tag_name: String,
	pub props: Props<D>,
	pub children: Vec<Node<D>>,
	pub listeners: HashMap<String, D::Listener>,
	pub rendered: Option<D::Node>,
}

impl<D: Dom> Node<D> {
	pub fn text(value: impl Into<String>) -> Self {
		Self::Text(Text { value: value.into(), rendered: None })
	}

	/// Builds a normalized element node from its parts.
	pub fn element(tag_name: impl Into<String>, props: Props<D>, children: Vec<Node<D>>) -> Self {
		Self::Element(Element {
			tag_name: tag_name.into(),
			props,
			children,
			listeners: HashMap::new(),
			rendered: None,
		})
	}

	/// The attached live node, if this node was mounted or reconciled.
	#[must_use]
	pub fn rendered(&self) -> Option<&D::Node> {
		match self {
			Self::Text(text) => text.rendered.as_ref(),
			Self::Element(element) => element.rendered.as_ref(),
		}
	}

	#[must_use]
	pub fn as_element(&self) -> Option<&Element<D>> {
		match self {
			Self::Element(element) => Some(element),
			Self::Text(_) => None,
		}
	}

	#[must_use]
	pub fn as_text(&self) -> Option<&Text<D>> {
		match self {
			Self::Text(text) => Some(text),
			Self::Element(_) => None,
		}
	}

	/// Short structural label for logs and errors.
	pub(crate) fn label(&self) -> &str {
		match self {
			Self::Text(_) => "#text",
			Self::Element(element) => &element.tag_name,
		}
	}
}

impl<D: Dom> Element<D> {
	/// Starts an element without props or children.
	pub fn new(tag_name: impl Into<String>) -> Self {
		Self {
			tag_name: tag_name.into(),
			props: Props::new(),
			children: Vec::new(),
			listeners: HashMap::new(),
			rendered: None,
		}
	}

	#[must_use]
	pub fn prop(mut self, key: impl Into<String>, value: impl Into<Value<D>>) -> Self {
		self.props.insert(key.into(), value.into());
		self
	}

	/// Binds `handler` under the event prop `key`, e.g. `"onClick"`.
	#[must_use]
	pub fn on(self, key: impl Into<String>, handler: impl Fn(&D::Event, &D::Node) + 'static) -> Self {
		self.prop(key, Value::handler(handler))
	}

	#[must_use]
	pub fn child(mut self, child: impl Into<Node<D>>) -> Self {
		self.children.push(child.into());
		self
	}

	#[must_use]
	pub fn children<I>(mut self, children: I) -> Self
	where
		I: IntoIterator,
		I::Item: Into<Node<D>>,
	{
		self.children.extend(children.into_iter().map(Into::into));
		self
	}

	#[must_use]
	pub fn is_component(&self) -> bool {
		is_component_tag(&self.tag_name)
	}

	/// The namespace this element switches into, if it carries an `xmlns` prop.
	#[must_use]
	pub fn namespace(&self) -> Option<String> {
		self.props.get(XMLNS).and_then(Value::to_attribute)
	}
}

impl<D: Dom> From<Element<D>> for Node<D> {
	fn from(element: Element<D>) -> Self {
		Self::Element(element)
	}
}

impl<D: Dom> From<Text<D>> for Node<D> {
	fn from(text: Text<D>) -> Self {
		Self::Text(text)
	}
}

impl<D: Dom> From<&str> for Node<D> {
	fn from(value: &str) -> Self {
		Self::text(value)
	}
}

impl<D: Dom> From<String> for Node<D> {
	fn from(value: String) -> Self {
		Self::text(value)
	}
}

// Primitive children become text leaves holding their string form.
macro_rules! primitive_children {
	($($primitive:ty),*$(,)?) => {$(
		impl<D: Dom> From<$primitive> for Node<D> {
			fn from(value: $primitive) -> Self {
				Self::text(value.to_string())
			}
		}
	)*};
}
primitive_children!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, char);
