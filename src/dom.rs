//! The live rendering surface the engines patch.
//!
//! [`Dom`] is implemented by [`MemoryDom`](`crate::memory::MemoryDom`) and, with the `web` feature,
//! by [`WebDom`](`crate::web::WebDom`).

use crate::{
	component::Component,
	registry::{ComponentClass, ComponentOptions},
	Error,
};
use core::fmt::Debug;
use futures::future::LocalBoxFuture;
use std::rc::Rc;

/// An event handler as stored in a prop.
///
/// Called with the event and the live element the listener is attached to.
pub type Handler<D> = Rc<dyn Fn(&<D as Dom>::Event, &<D as Dom>::Node)>;

/// Coarse classification of a live node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
	Element,
	Text,
	/// Anything the engines don't patch, like comments or fragments.
	Other,
}

/// Operations the Mount and Reconciliation Engines need from the host platform.
///
/// Handles are cheap clones of the same underlying surface.
pub trait Dom: Clone + Debug + Sized + 'static {
	/// A handle to a live node.
	type Node: Clone + PartialEq + Debug;
	type Event;
	/// A handle to an attached event listener, needed to detach it again.
	type Listener: Clone + Debug;

	fn create_text_node(&self, data: &str) -> Self::Node;

	/// Creates an element.
	///
	/// If `tag_name` is a defined component name, the returned element is a constructed component host.
	fn create_element(&self, tag_name: &str) -> Result<Self::Node, Error>;

	fn create_element_ns(&self, namespace: &str, tag_name: &str) -> Result<Self::Node, Error>;

	fn kind(&self, node: &Self::Node) -> NodeKind;

	/// The component host instance behind `node`, if it is one.
	fn component(&self, node: &Self::Node) -> Option<Rc<Component<Self>>>;

	fn set_text(&self, text: &Self::Node, data: &str) -> Result<(), Error>;

	fn set_attribute(&self, element: &Self::Node, name: &str, value: &str) -> Result<(), Error>;

	fn remove_attribute(&self, element: &Self::Node, name: &str) -> Result<(), Error>;

	/// Attaches a listener that forwards `(event, element)` to `handler`.
	fn add_event_listener(&self, element: &Self::Node, event: &str, handler: Handler<Self>) -> Result<Self::Listener, Error>;

	fn remove_event_listener(&self, element: &Self::Node, event: &str, listener: &Self::Listener) -> Result<(), Error>;

	fn append_child(&self, parent: &Self::Node, child: &Self::Node) -> Result<(), Error>;

	fn prepend_child(&self, parent: &Self::Node, child: &Self::Node) -> Result<(), Error>;

	/// Puts `new` where `old` is in its parent.
	fn replace_with(&self, old: &Self::Node, new: &Self::Node) -> Result<(), Error>;

	/// Detaches `node` from its parent. Does nothing for parentless nodes.
	fn remove(&self, node: &Self::Node) -> Result<(), Error>;

	fn replace_children(&self, parent: &Self::Node, children: &[Self::Node]) -> Result<(), Error>;

	/// Attaches the isolated rendering root of a component host.
	fn attach_render_root(&self, host: &Self::Node, options: ComponentOptions) -> Result<Self::Node, Error>;

	/// Whether the platform already knows an element definition named `name`.
	fn is_defined(&self, name: &str) -> bool;

	/// Registers `class` with the platform's extensible-element mechanism.
	fn define_element(&self, class: Rc<ComponentClass<Self>>) -> Result<(), Error>;

	/// Runs `future` to completion on the platform's event loop.
	fn spawn_local(&self, future: LocalBoxFuture<'static, ()>);
}
