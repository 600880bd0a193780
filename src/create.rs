//! The Mount Engine: turns a [`Node`] tree into a fresh live subtree.

use crate::{
	diff::Differ,
	dom::Dom,
	node::{Element, Node},
	props::event_name,
	Error,
};
use tracing::{instrument, trace, trace_span, warn};

impl<D: Dom> Differ<D> {
	/// Creates the live counterpart of `node`, attaching `rendered` back-references and event listeners throughout.
	///
	/// Never touches an existing live subtree. The result is detached; the caller inserts it.
	///
	/// # Errors
	///
	/// Fails if the platform rejects a node or attribute, or if the tree is deeper than the depth limit.
	#[instrument(skip(self, node), fields(node = node.label()))]
	pub fn mount(&self, node: &mut Node<D>) -> Result<D::Node, Error> {
		self.mount_limited(node, self.depth_limit())
	}

	pub(crate) fn mount_limited(&self, node: &mut Node<D>, depth_limit: usize) -> Result<D::Node, Error> {
		if depth_limit == 0 {
			return Err(Error::DepthLimitReached(self.depth_limit()));
		}

		match node {
			Node::Text(text) => {
				let span = trace_span!("Creating text node");
				let _enter = span.enter();
				if cfg!(feature = "dangerous-logging") {
					trace!(value = %text.value);
				}
				let live = self.dom().create_text_node(&text.value);
				text.rendered = Some(live.clone());
				Ok(live)
			}

			Node::Element(element) if element.is_component() => {
				let span = trace_span!("Creating component", tag = %element.tag_name);
				let _enter = span.enter();
				let live = self.dom().create_element(&element.tag_name)?;
				match self.dom().component(&live) {
					Some(host) => {
						host.set_props(element.props.clone());
						host.set_children(element.children.clone());
					}
					None => trace!("No component is defined under this tag yet. Props and children are not forwarded."),
				}
				element.rendered = Some(live.clone());
				Ok(live)
			}

			Node::Element(element) => match element.namespace() {
				Some(namespace) => {
					let span = trace_span!("Creating namespaced element", tag = %element.tag_name, %namespace);
					let _enter = span.enter();
					self.mount_namespaced(element, &namespace, depth_limit)
				}
				None => {
					let span = trace_span!("Creating HTML element", tag = %element.tag_name);
					let _enter = span.enter();
					self.mount_html(element, depth_limit)
				}
			},
		}
	}

	fn mount_html(&self, element: &mut Element<D>, depth_limit: usize) -> Result<D::Node, Error> {
		let dom = self.dom();
		let live = dom.create_element(&element.tag_name)?;

		for (key, value) in &element.props {
			if let Some(event) = event_name(key) {
				match value.as_handler() {
					Some(handler) => {
						let listener = dom.add_event_listener(&live, &event, handler.clone())?;
						element.listeners.insert(event, listener);
					}
					None => warn!("Event prop {:?} does not hold a handler. Ignoring it.", key),
				}
			} else if let Some(attribute) = value.to_attribute() {
				dom.set_attribute(&live, key, &attribute)?;
			}
		}

		for child in &mut element.children {
			let child = self.mount_limited(child, depth_limit - 1)?;
			dom.append_child(&live, &child)?;
		}

		element.rendered = Some(live.clone());
		Ok(live)
	}

	/// Mounts `node` below a parent in `namespace`, if any.
	pub(crate) fn mount_in(&self, node: &mut Node<D>, namespace: Option<&str>, depth_limit: usize) -> Result<D::Node, Error> {
		match (namespace, node) {
			(Some(namespace), Node::Element(element)) => self.mount_namespaced(element, namespace, depth_limit),
			(_, node) => self.mount_limited(node, depth_limit),
		}
	}

	/// Everything below a namespaced element is created in that namespace, with all props as plain attributes.
	fn mount_namespaced(&self, element: &mut Element<D>, namespace: &str, depth_limit: usize) -> Result<D::Node, Error> {
		if depth_limit == 0 {
			return Err(Error::DepthLimitReached(self.depth_limit()));
		}

		let dom = self.dom();
		let live = dom.create_element_ns(namespace, &element.tag_name)?;

		for (key, value) in &element.props {
			match value.to_attribute() {
				Some(attribute) => dom.set_attribute(&live, key, &attribute)?,
				None => warn!("Prop {:?} on namespaced <{}> holds a handler, which has no attribute form. Skipping it.", key, element.tag_name),
			}
		}

		for child in &mut element.children {
			let child = match child {
				Node::Text(text) => {
					let live = dom.create_text_node(&text.value);
					text.rendered = Some(live.clone());
					live
				}
				Node::Element(element) => self.mount_namespaced(element, namespace, depth_limit - 1)?,
			};
			dom.append_child(&live, &child)?;
		}

		element.rendered = Some(live.clone());
		Ok(live)
	}
}
