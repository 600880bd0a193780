//! The Reconciliation Engine: patches a mounted tree to match a new one.

use crate::{
	component::Component,
	dom::{Dom, NodeKind},
	node::{Element, Node, Text},
	props::event_name,
	Error,
};
use core::mem;
use std::rc::Rc;
use tracing::{instrument, trace, trace_span, warn};

/// Default for [`Differ::depth_limit`].
pub const DEFAULT_DEPTH_LIMIT: usize = 512;

/// Mounts and reconciles [`Node`] trees against one live rendering surface.
///
/// # Correct Use
///
/// Old trees handed to [`Differ::reconcile`] must be the results of earlier [`Differ::mount`] or [`Differ::reconcile`] calls
/// on the same surface, and the live subtree must not have been restructured in between.
/// Foreign nodes (e.g. comments) found in place of a recorded live node are left alone, with a warning.
///
/// Children are matched strictly by position. Reordering produces content patches at each index, not node moves.
#[derive(Debug, Clone)]
pub struct Differ<D: Dom> {
	dom: D,
	depth_limit: usize,
}

impl<D: Dom> Differ<D> {
	#[must_use]
	pub fn new(dom: D) -> Self {
		Self { dom, depth_limit: DEFAULT_DEPTH_LIMIT }
	}

	/// Limits how deeply nested trees may be before mounting or reconciling fails.
	#[must_use]
	pub fn with_depth_limit(self, depth_limit: usize) -> Self {
		Self { depth_limit, ..self }
	}

	#[must_use]
	pub fn dom(&self) -> &D {
		&self.dom
	}

	#[must_use]
	pub fn depth_limit(&self) -> usize {
		self.depth_limit
	}

	/// Patches the live subtree of `old` under `parent` to match `new`, returning the new effective tree.
	///
	/// - Without `old`, `new` is mounted and appended to `parent`.
	/// - Without `new`, the live node of `old` is removed.
	/// - Otherwise the nodes are patched in place where possible and replaced by a fresh mount where not.
	///
	/// The returned tree carries live references everywhere and serves as `old` for the next call.
	///
	/// `parent` is taken to be outside of namespaced (`xmlns`) subtrees. Below a namespaced element,
	/// inserted and replacing nodes are created in its namespace.
	///
	/// # Errors
	///
	/// [`Error::NotMounted`] if `old` has no live node attached, [`Error::DepthLimitReached`] for overly deep trees,
	/// and whatever the platform or a nested component update reports.
	#[instrument(skip(self, old, new), fields(old = old.as_ref().map(Node::label), new = new.as_ref().map(Node::label)))]
	pub fn reconcile(&self, parent: &D::Node, old: Option<Node<D>>, new: Option<Node<D>>) -> Result<Option<Node<D>>, Error> {
		self.reconcile_limited(parent, old, new, None, self.depth_limit)
	}

	fn reconcile_limited(&self, parent: &D::Node, old: Option<Node<D>>, new: Option<Node<D>>, namespace: Option<&str>, depth_limit: usize) -> Result<Option<Node<D>>, Error> {
		if depth_limit == 0 {
			return Err(Error::DepthLimitReached(self.depth_limit));
		}

		let (old, new) = match (old, new) {
			(None, None) => return Ok(None),
			(None, Some(mut new)) => {
				let span = trace_span!("Inserting", node = new.label());
				let _enter = span.enter();
				let live = self.mount_in(&mut new, namespace, depth_limit)?;
				self.dom.append_child(parent, &live)?;
				return Ok(Some(new));
			}
			(Some(old), new) => (old, new),
		};

		let live = match old.rendered() {
			Some(live) => live.clone(),
			None => return Err(Error::NotMounted(old.label().to_owned())),
		};

		let kind = self.dom.kind(&live);
		if kind == NodeKind::Other {
			warn!("Expected to update an element or text node for <{}> but found {:?}. Skipping this subtree.", old.label(), live);
			return Ok(Some(old));
		}

		let new = match new {
			Some(new) => new,
			None => {
				let span = trace_span!("Removing", node = old.label());
				let _enter = span.enter();
				self.dom.remove(&live)?;
				return Ok(None);
			}
		};

		match (old, new) {
			(Node::Text(old), Node::Text(new)) => self.update_text(&live, &old, new).map(Some),

			(Node::Element(old), Node::Element(new)) => {
				if kind == NodeKind::Text {
					warn!("Expected <{}> but found a text node. Recreating it.", old.tag_name);
					return self.replace(&live, Node::Element(new), namespace, depth_limit).map(Some);
				}
				match self.dom.component(&live) {
					Some(host) => self.update_component(&live, &host, &old, new, depth_limit).map(Some),
					None => self.update_element(live, old, new, namespace, depth_limit).map(Some),
				}
			}

			// Text ↔ element.
			(_, new) => {
				let span = trace_span!("Replacing mismatching variant", new = new.label());
				let _enter = span.enter();
				self.replace(&live, new, namespace, depth_limit).map(Some)
			}
		}
	}

	/// Mounts `new` fresh and swaps it in for `live`.
	fn replace(&self, live: &D::Node, mut new: Node<D>, namespace: Option<&str>, depth_limit: usize) -> Result<Node<D>, Error> {
		let replacement = self.mount_in(&mut new, namespace, depth_limit)?;
		self.dom.replace_with(live, &replacement)?;
		Ok(new)
	}

	fn update_text(&self, live: &D::Node, old: &Text<D>, mut new: Text<D>) -> Result<Node<D>, Error> {
		if old.value != new.value {
			let span = trace_span!("Updating text node");
			let _enter = span.enter();
			if cfg!(feature = "dangerous-logging") {
				trace!(old = %old.value, new = %new.value);
			}
			self.dom.set_text(live, &new.value)?;
		}
		new.rendered = Some(live.clone());
		Ok(Node::Text(new))
	}

	/// Component boundaries are never patched from outside; props and children are forwarded and the host re-renders itself.
	///
	/// Hosts only exist outside of namespaced subtrees.
	fn update_component(&self, live: &D::Node, host: &Rc<Component<D>>, old: &Element<D>, mut new: Element<D>, depth_limit: usize) -> Result<Node<D>, Error> {
		if old.tag_name != new.tag_name {
			let span = trace_span!("Replacing component", old = %old.tag_name, new = %new.tag_name);
			let _enter = span.enter();
			return self.replace(live, Node::Element(new), None, depth_limit);
		}

		let span = trace_span!("Updating component", tag = %new.tag_name);
		let _enter = span.enter();
		host.set_props(new.props.clone());
		host.set_children(new.children.clone());
		host.update()?;
		new.rendered = Some(live.clone());
		Ok(Node::Element(new))
	}

	fn update_element(&self, live: D::Node, mut old: Element<D>, mut new: Element<D>, namespace: Option<&str>, depth_limit: usize) -> Result<Node<D>, Error> {
		if old.tag_name != new.tag_name {
			let span = trace_span!("Replacing element", old = %old.tag_name, new = %new.tag_name);
			let _enter = span.enter();
			return self.replace(&live, Node::Element(new), namespace, depth_limit);
		}

		let span = trace_span!("Updating element", tag = %new.tag_name);
		let _enter = span.enter();

		// An inherited namespace wins, as when mounting.
		let namespace = namespace.map(str::to_owned).or_else(|| new.namespace());
		let namespace = namespace.as_deref();

		self.update_props(&live, &mut old, &mut new, namespace.is_some())?;

		let mut old_children = mem::take(&mut old.children).into_iter();
		let mut new_children = mem::take(&mut new.children).into_iter();
		loop {
			let (old_child, new_child) = (old_children.next(), new_children.next());
			if old_child.is_none() && new_child.is_none() {
				break;
			}
			if let Some(child) = self.reconcile_limited(&live, old_child, new_child, namespace, depth_limit - 1)? {
				new.children.push(child);
			}
		}

		new.rendered = Some(live);
		Ok(Node::Element(new))
	}

	/// Diffs props by key. Listeners recorded on `old` move to `new` unless they are detached here.
	///
	/// In namespaced elements every prop is a plain attribute.
	#[allow(clippy::similar_names)]
	fn update_props(&self, live: &D::Node, old: &mut Element<D>, new: &mut Element<D>, namespaced: bool) -> Result<(), Error> {
		let event_of = |key: &str| if namespaced { None } else { event_name(key) };
		let mut listeners = mem::take(&mut old.listeners);

		for (key, old_value) in &old.props {
			let event = event_of(key);
			match (new.props.get(key), event) {
				(None, Some(event)) => {
					trace!(event = %event, "Removing listener");
					if let Some(listener) = listeners.remove(&event) {
						self.dom.remove_event_listener(live, &event, &listener)?;
					}
				}
				(None, None) => {
					trace!(attribute = %key, "Removing attribute");
					self.dom.remove_attribute(live, key)?;
				}
				(Some(new_value), _) if new_value.loosely_eq(old_value) => (),
				(Some(new_value), Some(event)) => {
					trace!(event = %event, "Replacing listener");
					if let Some(listener) = listeners.remove(&event) {
						self.dom.remove_event_listener(live, &event, &listener)?;
					}
					match new_value.as_handler() {
						Some(handler) => {
							let listener = self.dom.add_event_listener(live, &event, handler.clone())?;
							listeners.insert(event, listener);
						}
						None => warn!("Event prop {:?} does not hold a handler. Ignoring it.", key),
					}
				}
				(Some(new_value), None) => match new_value.to_attribute() {
					Some(attribute) => {
						trace!(attribute = %key, "Updating attribute");
						self.dom.set_attribute(live, key, &attribute)?;
					}
					None => {
						warn!("Prop {:?} on <{}> holds a handler, which has no attribute form. Removing the attribute.", key, new.tag_name);
						self.dom.remove_attribute(live, key)?;
					}
				},
			}
		}

		for (key, value) in &new.props {
			if old.props.contains_key(key) {
				continue;
			}
			match event_of(key) {
				Some(event) => match value.as_handler() {
					Some(handler) => {
						trace!(event = %event, "Adding listener");
						let listener = self.dom.add_event_listener(live, &event, handler.clone())?;
						listeners.insert(event, listener);
					}
					None => warn!("Event prop {:?} does not hold a handler. Ignoring it.", key),
				},
				None => match value.to_attribute() {
					Some(attribute) => {
						trace!(attribute = %key, "Adding attribute");
						self.dom.set_attribute(live, key, &attribute)?;
					}
					None => warn!("Prop {:?} on <{}> holds a handler, which has no attribute form. Skipping it.", key, new.tag_name),
				},
			}
		}

		new.listeners = listeners;
		Ok(())
	}
}
