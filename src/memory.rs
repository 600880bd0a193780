//! An in-memory live rendering surface.
//!
//! [`MemoryDom`] behaves like a small DOM: nodes live in an arena, component hosts get their
//! rendering root, and hosts are connected or disconnected as subtrees enter or leave the document.
//! Every change to an existing node is appended to a [`Mutation`] log, and events can be dispatched by hand,
//! which makes it suitable for headless rendering and tests.

use crate::{
	component::{self, Component},
	dom::{Dom, Handler, NodeKind},
	registry::{ComponentClass, ComponentOptions, ShadowRootMode},
	Error,
};
use core::{
	cell::RefCell,
	fmt::{self, Debug, Formatter},
};
use futures::{
	executor::{LocalPool, LocalSpawner},
	future::LocalBoxFuture,
	task::LocalSpawnExt,
};
use hashbrown::HashMap;
use std::{collections::BTreeMap, rc::Rc};
use tracing::{error, trace};

/// Handle to a node of a [`MemoryDom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// The event passed to handlers by [`MemoryDom::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryEvent {
	pub kind: String,
	pub target: NodeId,
}

/// A recorded change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
	SetText { node: NodeId, data: String },
	SetAttribute { node: NodeId, name: String, value: String },
	RemoveAttribute { node: NodeId, name: String },
	AddListener { node: NodeId, event: String },
	RemoveListener { node: NodeId, event: String },
	Insert { parent: NodeId, child: NodeId },
	Remove { node: NodeId },
	Replace { old: NodeId, new: NodeId },
	ReplaceChildren { parent: NodeId },
}

#[derive(Clone)]
pub struct MemoryDom {
	tree: Rc<RefCell<Tree>>,
	pool: Rc<RefCell<LocalPool>>,
	spawner: LocalSpawner,
}

struct Tree {
	nodes: Vec<NodeData>,
	definitions: HashMap<String, Rc<ComponentClass<MemoryDom>>>,
	next_listener: u64,
	mutations: Vec<Mutation>,
}

struct NodeData {
	parent: Option<NodeId>,
	children: Vec<NodeId>,
	content: Content,
	listeners: Vec<RecordedListener>,
	component: Option<Rc<Component<MemoryDom>>>,
	render_root: Option<NodeId>,
}

enum Content {
	Document,
	RenderRoot { host: NodeId, mode: ShadowRootMode },
	Element { tag_name: String, namespace: Option<String>, attributes: BTreeMap<String, String> },
	Text(String),
	Comment(String),
}

struct RecordedListener {
	id: ListenerId,
	event: String,
	handler: Handler<MemoryDom>,
}

type Hosts = Vec<Rc<Component<MemoryDom>>>;

impl NodeData {
	fn new(content: Content) -> Self {
		Self {
			parent: None,
			children: Vec::new(),
			content,
			listeners: Vec::new(),
			component: None,
			render_root: None,
		}
	}
}

impl Tree {
	const DOCUMENT: NodeId = NodeId(0);

	fn get(&self, node: NodeId) -> Result<&NodeData, Error> {
		self.nodes.get(node.0).ok_or_else(|| Error::Platform(format!("unknown node {:?}", node)))
	}

	fn get_mut(&mut self, node: NodeId) -> Result<&mut NodeData, Error> {
		self.nodes.get_mut(node.0).ok_or_else(|| Error::Platform(format!("unknown node {:?}", node)))
	}

	fn push(&mut self, data: NodeData) -> NodeId {
		self.nodes.push(data);
		NodeId(self.nodes.len() - 1)
	}

	/// The parent, or the host for rendering roots.
	fn up(&self, node: NodeId) -> Option<NodeId> {
		let data = self.nodes.get(node.0)?;
		match data.content {
			Content::RenderRoot { host, .. } => Some(host),
			_ => data.parent,
		}
	}

	fn is_connected(&self, mut node: NodeId) -> bool {
		loop {
			if node == Self::DOCUMENT {
				return true;
			}
			match self.up(node) {
				Some(up) => node = up,
				None => return false,
			}
		}
	}

	fn is_inclusive_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
		loop {
			if node == ancestor {
				return true;
			}
			match self.up(node) {
				Some(up) => node = up,
				None => return false,
			}
		}
	}

	/// Component hosts in `node`'s subtree, rendering roots included, in tree order.
	fn collect_hosts(&self, node: NodeId, hosts: &mut Hosts) {
		let data = match self.nodes.get(node.0) {
			Some(data) => data,
			None => return,
		};
		if let Some(component) = &data.component {
			hosts.push(Rc::clone(component));
		}
		if let Some(root) = data.render_root {
			self.collect_hosts(root, hosts);
		}
		for &child in &data.children {
			self.collect_hosts(child, hosts);
		}
	}

	/// Hosts that leave the document if `node` is detached.
	fn hosts_if_connected(&self, node: NodeId) -> Hosts {
		let mut hosts = Vec::new();
		if self.is_connected(node) {
			self.collect_hosts(node, &mut hosts);
		}
		hosts
	}

	/// Unlinks `node` from its parent, if any.
	fn unlink(&mut self, node: NodeId) -> Result<(), Error> {
		if let Some(parent) = self.get_mut(node)?.parent.take() {
			self.get_mut(parent)?.children.retain(|&child| child != node);
		}
		Ok(())
	}

	fn check_insertion(&self, parent: NodeId, child: NodeId) -> Result<(), Error> {
		match self.get(child)?.content {
			Content::Document | Content::RenderRoot { .. } => return Err(Error::Platform(format!("{:?} can't be inserted", child))),
			_ => (),
		}
		match self.get(parent)?.content {
			Content::Text(_) | Content::Comment(_) => return Err(Error::Platform(format!("{:?} can't have children", parent))),
			_ => (),
		}
		if self.is_inclusive_ancestor(child, parent) {
			return Err(Error::Platform(format!("inserting {:?} into {:?} would create a cycle", child, parent)));
		}
		Ok(())
	}

	fn text_content(&self, node: NodeId, out: &mut String) {
		if let Some(data) = self.nodes.get(node.0) {
			match &data.content {
				Content::Text(text) => out.push_str(text),
				Content::Comment(_) => (),
				_ => {
					for &child in &data.children {
						self.text_content(child, out);
					}
				}
			}
		}
	}
}

impl MemoryDom {
	#[must_use]
	pub fn new() -> Self {
		let pool = LocalPool::new();
		let spawner = pool.spawner();
		let mut tree = Tree {
			nodes: Vec::new(),
			definitions: HashMap::new(),
			next_listener: 0,
			mutations: Vec::new(),
		};
		tree.push(NodeData::new(Content::Document));
		Self {
			tree: Rc::new(RefCell::new(tree)),
			pool: Rc::new(RefCell::new(pool)),
			spawner,
		}
	}

	/// The root of the connected tree. Component hosts inside it are connected.
	#[must_use]
	pub fn document(&self) -> NodeId {
		Tree::DOCUMENT
	}

	/// A detached comment node. The engines don't patch these.
	#[must_use]
	pub fn create_comment(&self, data: &str) -> NodeId {
		self.tree.borrow_mut().push(NodeData::new(Content::Comment(data.to_owned())))
	}

	#[must_use]
	pub fn tag_name(&self, node: NodeId) -> Option<String> {
		match &self.tree.borrow().nodes.get(node.0)?.content {
			Content::Element { tag_name, .. } => Some(tag_name.clone()),
			_ => None,
		}
	}

	/// The namespace an element was created in. [`None`] for HTML elements and non-elements.
	#[must_use]
	pub fn namespace(&self, node: NodeId) -> Option<String> {
		match &self.tree.borrow().nodes.get(node.0)?.content {
			Content::Element { namespace, .. } => namespace.clone(),
			_ => None,
		}
	}

	/// The data of a text or comment node.
	#[must_use]
	pub fn data(&self, node: NodeId) -> Option<String> {
		match &self.tree.borrow().nodes.get(node.0)?.content {
			Content::Text(data) | Content::Comment(data) => Some(data.clone()),
			_ => None,
		}
	}

	#[must_use]
	pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
		match &self.tree.borrow().nodes.get(node.0)?.content {
			Content::Element { attributes, .. } => attributes.get(name).cloned(),
			_ => None,
		}
	}

	#[must_use]
	pub fn attributes(&self, node: NodeId) -> BTreeMap<String, String> {
		match self.tree.borrow().nodes.get(node.0).map(|data| &data.content) {
			Some(Content::Element { attributes, .. }) => attributes.clone(),
			_ => BTreeMap::new(),
		}
	}

	#[must_use]
	pub fn children(&self, node: NodeId) -> Vec<NodeId> {
		self.tree.borrow().nodes.get(node.0).map(|data| data.children.clone()).unwrap_or_default()
	}

	#[must_use]
	pub fn parent(&self, node: NodeId) -> Option<NodeId> {
		self.tree.borrow().nodes.get(node.0)?.parent
	}

	/// Concatenated text below `node`, not descending into rendering roots.
	#[must_use]
	pub fn text_content(&self, node: NodeId) -> String {
		let mut text = String::new();
		self.tree.borrow().text_content(node, &mut text);
		text
	}

	/// The rendering root of `host`, unless it was attached in closed mode.
	#[must_use]
	pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
		let tree = self.tree.borrow();
		let root = tree.nodes.get(host.0)?.render_root?;
		match tree.nodes.get(root.0)?.content {
			Content::RenderRoot { mode: ShadowRootMode::Open, .. } => Some(root),
			_ => None,
		}
	}

	#[must_use]
	pub fn is_connected(&self, node: NodeId) -> bool {
		self.tree.borrow().is_connected(node)
	}

	#[must_use]
	pub fn listener_count(&self, node: NodeId, event: &str) -> usize {
		self.tree.borrow().nodes.get(node.0).map_or(0, |data| data.listeners.iter().filter(|listener| listener.event == event).count())
	}

	/// Calls the listeners for `event` on `node`, returning how many ran.
	///
	/// Events don't bubble.
	pub fn dispatch(&self, node: NodeId, event: &str) -> usize {
		let handlers: Vec<Handler<Self>> = match self.tree.borrow().nodes.get(node.0) {
			Some(data) => data.listeners.iter().filter(|listener| listener.event == event).map(|listener| Rc::clone(&listener.handler)).collect(),
			None => return 0,
		};

		let event = MemoryEvent { kind: event.to_owned(), target: node };
		for handler in &handlers {
			handler(&event, &node);
		}
		handlers.len()
	}

	/// Drains the mutation log.
	pub fn take_mutations(&self) -> Vec<Mutation> {
		std::mem::take(&mut self.tree.borrow_mut().mutations)
	}

	/// Polls spawned tasks (deferred mount effects) until none can make progress.
	pub fn run_until_stalled(&self) {
		self.pool.borrow_mut().run_until_stalled();
	}

	/// Fires lifecycle callbacks after a structural change. Must be called without the tree borrowed.
	fn settle(&self, leaving: Hosts, entering: Hosts) {
		for host in leaving {
			if host.is_connected() && !self.is_connected(*host.element()) {
				host.disconnect();
			}
		}
		for host in entering {
			// Earlier connections may have re-rendered and dropped it.
			if !host.is_connected() && self.is_connected(*host.element()) {
				component::connect_logged(&host);
			}
		}
	}

	fn insert(&self, parent: NodeId, child: NodeId, at_start: bool) -> Result<(), Error> {
		let (leaving, entering) = {
			let mut tree = self.tree.borrow_mut();
			tree.check_insertion(parent, child)?;
			let leaving = tree.hosts_if_connected(child);
			tree.unlink(child)?;

			tree.get_mut(child)?.parent = Some(parent);
			let children = &mut tree.get_mut(parent)?.children;
			if at_start {
				children.insert(0, child);
			} else {
				children.push(child);
			}
			tree.mutations.push(Mutation::Insert { parent, child });

			(leaving, tree.hosts_if_connected(child))
		};
		self.settle(leaving, entering);
		Ok(())
	}
}

impl Default for MemoryDom {
	fn default() -> Self {
		Self::new()
	}
}

impl Debug for MemoryDom {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self.tree.try_borrow() {
			Ok(tree) => f
				.debug_struct("MemoryDom")
				.field("nodes", &tree.nodes.len())
				.field("definitions", &tree.definitions.len())
				.finish_non_exhaustive(),
			Err(_) => f.write_str("MemoryDom(<borrowed>)"),
		}
	}
}

impl Dom for MemoryDom {
	type Node = NodeId;
	type Event = MemoryEvent;
	type Listener = ListenerId;

	fn create_text_node(&self, data: &str) -> NodeId {
		self.tree.borrow_mut().push(NodeData::new(Content::Text(data.to_owned())))
	}

	fn create_element(&self, tag_name: &str) -> Result<NodeId, Error> {
		if tag_name.is_empty() || tag_name.contains(char::is_whitespace) {
			return Err(Error::Platform(format!("invalid tag name {:?}", tag_name)));
		}
		let (element, class) = {
			let mut tree = self.tree.borrow_mut();
			let element = tree.push(NodeData::new(Content::Element {
				tag_name: tag_name.to_owned(),
				namespace: None,
				attributes: BTreeMap::new(),
			}));
			(element, tree.definitions.get(tag_name).cloned())
		};

		if let Some(class) = class {
			trace!(tag = tag_name, "Constructing component host");
			let component = Component::construct(class, element)?;
			self.tree.borrow_mut().get_mut(element)?.component = Some(component);
		}
		Ok(element)
	}

	fn create_element_ns(&self, namespace: &str, tag_name: &str) -> Result<NodeId, Error> {
		if tag_name.is_empty() || tag_name.contains(char::is_whitespace) {
			return Err(Error::Platform(format!("invalid tag name {:?}", tag_name)));
		}
		Ok(self.tree.borrow_mut().push(NodeData::new(Content::Element {
			tag_name: tag_name.to_owned(),
			namespace: Some(namespace.to_owned()),
			attributes: BTreeMap::new(),
		})))
	}

	fn kind(&self, node: &NodeId) -> NodeKind {
		match self.tree.borrow().nodes.get(node.0).map(|data| &data.content) {
			Some(Content::Element { .. }) => NodeKind::Element,
			Some(Content::Text(_)) => NodeKind::Text,
			_ => NodeKind::Other,
		}
	}

	fn component(&self, node: &NodeId) -> Option<Rc<Component<Self>>> {
		self.tree.borrow().nodes.get(node.0)?.component.clone()
	}

	fn set_text(&self, text: &NodeId, data: &str) -> Result<(), Error> {
		let mut tree = self.tree.borrow_mut();
		match &mut tree.get_mut(*text)?.content {
			Content::Text(current) => *current = data.to_owned(),
			_ => return Err(Error::Platform(format!("{:?} is not a text node", text))),
		}
		tree.mutations.push(Mutation::SetText { node: *text, data: data.to_owned() });
		Ok(())
	}

	fn set_attribute(&self, element: &NodeId, name: &str, value: &str) -> Result<(), Error> {
		let mut tree = self.tree.borrow_mut();
		match &mut tree.get_mut(*element)?.content {
			Content::Element { attributes, .. } => attributes.insert(name.to_owned(), value.to_owned()),
			_ => return Err(Error::Platform(format!("{:?} is not an element", element))),
		};
		tree.mutations.push(Mutation::SetAttribute {
			node: *element,
			name: name.to_owned(),
			value: value.to_owned(),
		});
		Ok(())
	}

	fn remove_attribute(&self, element: &NodeId, name: &str) -> Result<(), Error> {
		let mut tree = self.tree.borrow_mut();
		match &mut tree.get_mut(*element)?.content {
			Content::Element { attributes, .. } => attributes.remove(name),
			_ => return Err(Error::Platform(format!("{:?} is not an element", element))),
		};
		tree.mutations.push(Mutation::RemoveAttribute { node: *element, name: name.to_owned() });
		Ok(())
	}

	fn add_event_listener(&self, element: &NodeId, event: &str, handler: Handler<Self>) -> Result<ListenerId, Error> {
		let mut tree = self.tree.borrow_mut();
		let id = ListenerId(tree.next_listener);
		tree.next_listener += 1;
		tree.get_mut(*element)?.listeners.push(RecordedListener { id, event: event.to_owned(), handler });
		tree.mutations.push(Mutation::AddListener { node: *element, event: event.to_owned() });
		Ok(id)
	}

	fn remove_event_listener(&self, element: &NodeId, event: &str, listener: &ListenerId) -> Result<(), Error> {
		let mut tree = self.tree.borrow_mut();
		let listeners = &mut tree.get_mut(*element)?.listeners;
		let before = listeners.len();
		listeners.retain(|recorded| recorded.id != *listener);
		if listeners.len() != before {
			tree.mutations.push(Mutation::RemoveListener { node: *element, event: event.to_owned() });
		}
		Ok(())
	}

	fn append_child(&self, parent: &NodeId, child: &NodeId) -> Result<(), Error> {
		self.insert(*parent, *child, false)
	}

	fn prepend_child(&self, parent: &NodeId, child: &NodeId) -> Result<(), Error> {
		self.insert(*parent, *child, true)
	}

	fn replace_with(&self, old: &NodeId, new: &NodeId) -> Result<(), Error> {
		let (old, new) = (*old, *new);
		let (leaving, entering) = {
			let mut tree = self.tree.borrow_mut();
			let parent = match tree.get(old)?.parent {
				Some(parent) => parent,
				None => return Ok(()),
			};
			tree.check_insertion(parent, new)?;

			let mut leaving = tree.hosts_if_connected(old);
			leaving.extend(tree.hosts_if_connected(new));
			tree.unlink(new)?;

			let children = &mut tree.get_mut(parent)?.children;
			if let Some(slot) = children.iter_mut().find(|child| **child == old) {
				*slot = new;
			}
			tree.get_mut(old)?.parent = None;
			tree.get_mut(new)?.parent = Some(parent);
			tree.mutations.push(Mutation::Replace { old, new });

			(leaving, tree.hosts_if_connected(new))
		};
		self.settle(leaving, entering);
		Ok(())
	}

	fn remove(&self, node: &NodeId) -> Result<(), Error> {
		let leaving = {
			let mut tree = self.tree.borrow_mut();
			if tree.get(*node)?.parent.is_none() {
				return Ok(());
			}
			let leaving = tree.hosts_if_connected(*node);
			tree.unlink(*node)?;
			tree.mutations.push(Mutation::Remove { node: *node });
			leaving
		};
		self.settle(leaving, Vec::new());
		Ok(())
	}

	fn replace_children(&self, parent: &NodeId, children: &[NodeId]) -> Result<(), Error> {
		let parent = *parent;
		let (leaving, entering) = {
			let mut tree = self.tree.borrow_mut();
			for &child in children {
				tree.check_insertion(parent, child)?;
			}

			let mut leaving = Vec::new();
			if tree.is_connected(parent) {
				for &old in &tree.get(parent)?.children {
					tree.collect_hosts(old, &mut leaving);
				}
			}
			for &child in children {
				leaving.extend(tree.hosts_if_connected(child));
				tree.unlink(child)?;
			}
			let old_children = std::mem::take(&mut tree.get_mut(parent)?.children);
			for old in old_children {
				tree.get_mut(old)?.parent = None;
			}
			for &child in children {
				tree.get_mut(child)?.parent = Some(parent);
			}
			tree.get_mut(parent)?.children = children.to_vec();
			tree.mutations.push(Mutation::ReplaceChildren { parent });

			let mut entering = Vec::new();
			if tree.is_connected(parent) {
				for &child in children {
					tree.collect_hosts(child, &mut entering);
				}
			}
			(leaving, entering)
		};
		self.settle(leaving, entering);
		Ok(())
	}

	fn attach_render_root(&self, host: &NodeId, options: ComponentOptions) -> Result<NodeId, Error> {
		let mut tree = self.tree.borrow_mut();
		if tree.get(*host)?.render_root.is_some() {
			return Err(Error::Platform(format!("{:?} already has a rendering root", host)));
		}
		let root = tree.push(NodeData::new(Content::RenderRoot { host: *host, mode: options.mode }));
		tree.get_mut(*host)?.render_root = Some(root);
		Ok(root)
	}

	fn is_defined(&self, name: &str) -> bool {
		self.tree.borrow().definitions.contains_key(name)
	}

	fn define_element(&self, class: Rc<ComponentClass<Self>>) -> Result<(), Error> {
		let name = class.name();
		if !name.contains('-') || name.contains(char::is_whitespace) {
			return Err(Error::InvalidComponentName(name.to_owned()));
		}
		let mut tree = self.tree.borrow_mut();
		if tree.definitions.contains_key(name) {
			return Err(Error::AlreadyDefined(name.to_owned()));
		}
		tree.definitions.insert(name.to_owned(), class);
		Ok(())
	}

	fn spawn_local(&self, future: LocalBoxFuture<'static, ()>) {
		if let Err(error) = self.spawner.spawn_local(future) {
			error!("Failed to spawn local task: {}", error);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn element(dom: &MemoryDom, tag_name: &str) -> NodeId {
		dom.create_element(tag_name).unwrap()
	}

	#[test]
	fn rejects_cycles() {
		let dom = MemoryDom::new();
		let (outer, inner) = (element(&dom, "div"), element(&dom, "p"));
		dom.append_child(&outer, &inner).unwrap();

		assert!(matches!(dom.append_child(&inner, &outer), Err(Error::Platform(_))));
		assert!(matches!(dom.append_child(&outer, &outer), Err(Error::Platform(_))));
		assert_eq!(dom.children(outer), vec![inner]);
	}

	#[test]
	fn rejects_invalid_parents_and_children() {
		let dom = MemoryDom::new();
		let text = dom.create_text_node("leaf");
		let div = element(&dom, "div");

		assert!(dom.append_child(&text, &div).is_err());
		assert!(dom.append_child(&div, &dom.document()).is_err());
		assert!(dom.set_attribute(&text, "id", "x").is_err());
		assert!(dom.set_text(&div, "x").is_err());
		assert!(dom.create_element("not valid").is_err());
	}

	#[test]
	fn render_roots_connect_through_their_host() {
		let dom = MemoryDom::new();
		let host = element(&dom, "div");
		let root = dom.attach_render_root(&host, ComponentOptions::default()).unwrap();
		let inner = dom.create_text_node("inside");
		dom.append_child(&root, &inner).unwrap();

		assert!(!dom.is_connected(inner));
		dom.append_child(&dom.document(), &host).unwrap();
		assert!(dom.is_connected(inner));

		assert_eq!(dom.shadow_root(host), None);
		assert_eq!(dom.text_content(host), "");
		assert_eq!(dom.text_content(root), "inside");
		assert!(dom.attach_render_root(&host, ComponentOptions::default()).is_err());
	}

	#[test]
	fn moving_within_the_tree() {
		let dom = MemoryDom::new();
		let (a, b, child) = (element(&dom, "div"), element(&dom, "div"), element(&dom, "span"));
		dom.append_child(&a, &child).unwrap();
		dom.prepend_child(&b, &child).unwrap();

		assert!(dom.children(a).is_empty());
		assert_eq!(dom.children(b), vec![child]);
		assert_eq!(dom.parent(child), Some(b));

		dom.replace_children(&b, &[]).unwrap();
		assert_eq!(dom.parent(child), None);
		assert_eq!(dom.take_mutations().last(), Some(&Mutation::ReplaceChildren { parent: b }));
	}

	#[test]
	fn removed_listeners_stop_firing() {
		let dom = MemoryDom::new();
		let div = element(&dom, "div");
		let listener = dom.add_event_listener(&div, "click", Rc::new(|_: &MemoryEvent, _: &NodeId| ())).unwrap();
		assert_eq!(dom.dispatch(div, "click"), 1);
		assert_eq!(dom.dispatch(div, "keydown"), 0);

		dom.remove_event_listener(&div, "click", &listener).unwrap();
		assert_eq!(dom.dispatch(div, "click"), 0);
	}
}
