//! The Stateful Component Host.
//!
//! A [`Component`] is the composition object behind one instance of a defined component tag.
//! The platform adapter constructs it together with the host element and forwards
//! [`connect`](`Component::connect`) and [`disconnect`](`Component::disconnect`) to it.
//!
//! Its factory runs once per connection and registers a render callback, hooks and state slots.
//! Every state write re-renders the whole component and reconciles the result against the previous render.

use crate::{
	diff::Differ,
	dom::Dom,
	node::Node,
	props::Props,
	registry::ComponentClass,
	Error,
};
use core::{
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
	future::Future,
	marker::PhantomData,
};
use futures::future::{FutureExt, LocalBoxFuture};
use std::rc::{Rc, Weak};
use tracing::{error, instrument, trace, trace_span, warn};

type RenderCallback<D> = Rc<dyn Fn() -> Node<D>>;
type MountCallback = Rc<dyn Fn() -> MountEffect>;
type UpdateCallback = Rc<dyn Fn()>;

/// Deferred teardown returned by a mount effect.
pub type Cleanup = Box<dyn FnOnce()>;

/// What a mount-effect hook hands back.
pub enum MountEffect {
	None,
	/// Runs when the component disconnects.
	Cleanup(Cleanup),
	/// Eventually yields a cleanup (or none).
	///
	/// If the component disconnected in the meantime, a resolved cleanup runs right away.
	Deferred(LocalBoxFuture<'static, Option<Cleanup>>),
}

impl MountEffect {
	pub fn cleanup(cleanup: impl FnOnce() + 'static) -> Self {
		Self::Cleanup(Box::new(cleanup))
	}

	pub fn deferred<F>(future: F) -> Self
	where
		F: Future<Output = Option<Cleanup>> + 'static,
	{
		Self::Deferred(future.boxed_local())
	}
}

impl From<()> for MountEffect {
	fn from((): ()) -> Self {
		Self::None
	}
}

impl Debug for MountEffect {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::None => "MountEffect::None",
			Self::Cleanup(_) => "MountEffect::Cleanup(..)",
			Self::Deferred(_) => "MountEffect::Deferred(..)",
		})
	}
}

/// Opaque identity of a state slot, unique within its component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotToken(u64);

/// One component instance.
pub struct Component<D: Dom> {
	this: Weak<Self>,
	class: Rc<ComponentClass<D>>,
	element: D::Node,
	root: D::Node,

	render_callback: RefCell<Option<RenderCallback<D>>>,
	on_mount: RefCell<Option<MountCallback>>,
	on_update: RefCell<Option<UpdateCallback>>,
	cleanup: RefCell<Option<Cleanup>>,
	/// Incremented on each connection, so late deferred cleanups can tell whether their connection is over.
	connection: Cell<u64>,
	connected: Cell<bool>,

	baseline: RefCell<Option<Node<D>>>,
	styles: RefCell<Option<StyleElement<D>>>,
	props: RefCell<Props<D>>,
	children: RefCell<Vec<Node<D>>>,

	next_slot: Cell<u64>,
	/// Slots minted since the current connection began.
	slot_count: Cell<usize>,
}

struct StyleElement<D: Dom> {
	element: D::Node,
	text: D::Node,
}

impl<D: Dom> Component<D> {
	/// Creates the instance for a freshly created host `element` and attaches its rendering root.
	///
	/// # Errors
	///
	/// Fails if the platform can't attach the rendering root.
	#[instrument(skip(class), fields(name = class.name()))]
	pub fn construct(class: Rc<ComponentClass<D>>, element: D::Node) -> Result<Rc<Self>, Error> {
		let root = class.differ().dom().attach_render_root(&element, class.options())?;
		Ok(Rc::new_cyclic(|this| Self {
			this: this.clone(),
			class,
			element,
			root,
			render_callback: RefCell::default(),
			on_mount: RefCell::default(),
			on_update: RefCell::default(),
			cleanup: RefCell::default(),
			connection: Cell::new(0),
			connected: Cell::new(false),
			baseline: RefCell::default(),
			styles: RefCell::default(),
			props: RefCell::default(),
			children: RefCell::default(),
			next_slot: Cell::new(0),
			slot_count: Cell::new(0),
		}))
	}

	fn differ(&self) -> &Differ<D> {
		self.class.differ()
	}

	#[must_use]
	pub fn name(&self) -> &str {
		self.class.name()
	}

	/// The host element.
	#[must_use]
	pub fn element(&self) -> &D::Node {
		&self.element
	}

	/// The isolated rendering root the component renders into.
	#[must_use]
	pub fn render_root(&self) -> &D::Node {
		&self.root
	}

	/// A weak handle to this instance, for render callbacks that read [`props`](`Component::props`) or [`children`](`Component::children`).
	#[must_use]
	pub fn weak_ref(&self) -> Weak<Self> {
		self.this.clone()
	}

	#[must_use]
	pub fn is_connected(&self) -> bool {
		self.connected.get()
	}

	/// Runs the factory, then the mount effect if one was registered.
	///
	/// # Errors
	///
	/// Whatever the factory reports. The mount effect is skipped in that case.
	#[instrument(skip(self), fields(name = self.name()))]
	pub fn connect(&self) -> Result<(), Error> {
		self.connected.set(true);
		self.connection.set(self.connection.get() + 1);
		self.slot_count.set(0);

		(self.class.factory())(self)?;

		let on_mount = self.on_mount.borrow().clone();
		if let Some(on_mount) = on_mount {
			match on_mount() {
				MountEffect::None => (),
				MountEffect::Cleanup(cleanup) => *self.cleanup.borrow_mut() = Some(cleanup),
				MountEffect::Deferred(future) => self.defer_cleanup(future),
			}
		}
		Ok(())
	}

	fn defer_cleanup(&self, future: LocalBoxFuture<'static, Option<Cleanup>>) {
		let this = self.this.clone();
		let connection = self.connection.get();
		self.differ().dom().spawn_local(
			async move {
				let cleanup = match future.await {
					Some(cleanup) => cleanup,
					None => return,
				};
				match this.upgrade() {
					Some(this) if this.connected.get() && this.connection.get() == connection => *this.cleanup.borrow_mut() = Some(cleanup),
					_ => {
						trace!("Mount effect resolved after its connection ended. Cleaning up right away.");
						cleanup();
					}
				}
			}
			.boxed_local(),
		);
	}

	/// Runs the cleanup captured from the mount effect, if any.
	#[instrument(skip(self), fields(name = self.name()))]
	pub fn disconnect(&self) {
		self.connected.set(false);
		let cleanup = self.cleanup.borrow_mut().take();
		if let Some(cleanup) = cleanup {
			let span = trace_span!("Running mount effect cleanup");
			let _enter = span.enter();
			cleanup();
		}
	}

	/// Registers the mount-effect hook. The last registration wins.
	pub fn on_mount<E: Into<MountEffect>>(&self, callback: impl Fn() -> E + 'static) {
		*self.on_mount.borrow_mut() = Some(Rc::new(move || callback().into()));
	}

	/// Registers the pre-update hook. The last registration wins.
	pub fn on_update(&self, callback: impl Fn() + 'static) {
		*self.on_update.borrow_mut() = Some(Rc::new(callback));
	}

	/// Stores `callback` as the render source and paints its first tree into the rendering root,
	/// replacing whatever was there.
	///
	/// # Errors
	///
	/// Fails if mounting the tree fails.
	#[instrument(skip(self, callback), fields(name = self.name()))]
	pub fn render(&self, callback: impl Fn() -> Node<D> + 'static) -> Result<(), Error> {
		let callback: RenderCallback<D> = Rc::new(callback);
		*self.render_callback.borrow_mut() = Some(Rc::clone(&callback));
		self.paint(callback())
	}

	/// Mounts `tree` fresh and makes it the only content of the rendering root (after the styles).
	///
	/// If mounting fails, the rendering root and baseline are left as they were.
	fn paint(&self, mut tree: Node<D>) -> Result<(), Error> {
		let live = self.differ().mount(&mut tree)?;
		// Nested components may connect (and render) during this call.
		*self.baseline.borrow_mut() = Some(tree);
		self.replace_content(Some(live))
	}

	fn replace_content(&self, live: Option<D::Node>) -> Result<(), Error> {
		let mut content = Vec::with_capacity(2);
		if let Some(styles) = &*self.styles.borrow() {
			content.push(styles.element.clone());
		}
		content.extend(live);
		self.differ().dom().replace_children(&self.root, &content)
	}

	/// Re-renders and reconciles the result against the previous render.
	///
	/// Runs the pre-update hook first.
	///
	/// # Errors
	///
	/// [`Error::UpdateBeforeRender`] if no render callback was stored yet, otherwise whatever reconciliation reports.
	///
	/// If reconciliation fails, the rendering root is cleared and the next update mounts from scratch.
	#[instrument(skip(self), fields(name = self.name()))]
	pub fn update(&self) -> Result<(), Error> {
		let on_update = self.on_update.borrow().clone();
		if let Some(on_update) = on_update {
			on_update();
		}

		let callback = self.render_callback.borrow().clone().ok_or(Error::UpdateBeforeRender)?;
		let new = callback();
		let old = self.baseline.borrow_mut().take();
		let old = match old {
			Some(old) => old,
			// The rendering root holds nothing but the styles.
			None => return self.paint(new),
		};

		match self.differ().reconcile(&self.root, Some(old), Some(new)) {
			Ok(effective) => {
				*self.baseline.borrow_mut() = effective;
				Ok(())
			}
			Err(error) => {
				// The live content may be partially patched now, so nothing can be reconciled against it anymore.
				warn!("Updating <{}> failed. Clearing its rendering root.", self.name());
				if let Err(clear_error) = self.replace_content(None) {
					error!("Failed to clear the rendering root of <{}>: {}", self.name(), clear_error);
				}
				Err(error)
			}
		}
	}

	/// Mints a new state slot holding `initial`.
	///
	/// Slots are identified by their token only, so equal initial values never alias.
	/// The returned handle owns the cell: a slot lives exactly as long as the closures that captured it.
	pub fn create_state<T: 'static>(&self, initial: T) -> State<D, T> {
		let token = SlotToken(self.next_slot.get());
		self.next_slot.set(token.0 + 1);
		self.slot_count.set(self.slot_count.get() + 1);

		let cell = Rc::new(RefCell::new(initial));
		trace!(?token, "Created state slot");

		State {
			host: self.this.clone(),
			token,
			cell,
			_dom: PhantomData,
		}
	}

	/// How many slots the current connection's factory run created.
	#[must_use]
	pub fn state_count(&self) -> usize {
		self.slot_count.get()
	}

	/// Sets the style sheet text of the rendering root, creating its `<style>` element on first use.
	///
	/// # Errors
	///
	/// Fails if the platform rejects creating or inserting the style element.
	pub fn set_styles(&self, css: &str) -> Result<(), Error> {
		let dom = self.differ().dom();
		if let Some(styles) = &*self.styles.borrow() {
			return dom.set_text(&styles.text, css);
		}

		let element = dom.create_element("style")?;
		let text = dom.create_text_node(css);
		dom.append_child(&element, &text)?;
		dom.prepend_child(&self.root, &element)?;
		*self.styles.borrow_mut() = Some(StyleElement { element, text });
		Ok(())
	}

	pub fn set_props(&self, props: Props<D>) {
		*self.props.borrow_mut() = props;
	}

	#[must_use]
	pub fn props(&self) -> Props<D> {
		self.props.borrow().clone()
	}

	pub fn set_children(&self, children: Vec<Node<D>>) {
		*self.children.borrow_mut() = children;
	}

	#[must_use]
	pub fn children(&self) -> Vec<Node<D>> {
		self.children.borrow().clone()
	}
}

impl<D: Dom> Debug for Component<D> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Component")
			.field("name", &self.name())
			.field("element", &self.element)
			.field("connected", &self.connected.get())
			.field("state_count", &self.state_count())
			.finish_non_exhaustive()
	}
}

/// Reader/writer handle of one state slot.
pub struct State<D: Dom, T> {
	host: Weak<Component<D>>,
	token: SlotToken,
	cell: Rc<RefCell<T>>,
	_dom: PhantomData<D>,
}

impl<D: Dom, T> State<D, T> {
	#[must_use]
	pub fn token(&self) -> SlotToken {
		self.token
	}

	#[must_use]
	pub fn get(&self) -> T
	where
		T: Clone,
	{
		self.cell.borrow().clone()
	}

	pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
		f(&self.cell.borrow())
	}

	/// Stores `value` and re-renders the owning component, even if the value didn't change.
	///
	/// # Errors
	///
	/// [`Error::ComponentDropped`] if the component is gone, otherwise whatever [`Component::update`] reports.
	pub fn set(&self, value: T) -> Result<(), Error> {
		*self.cell.borrow_mut() = value;
		self.host.upgrade().ok_or(Error::ComponentDropped)?.update()
	}
}

impl<D: Dom, T> Clone for State<D, T> {
	fn clone(&self) -> Self {
		Self {
			host: self.host.clone(),
			token: self.token,
			cell: Rc::clone(&self.cell),
			_dom: PhantomData,
		}
	}
}

impl<D: Dom, T: Debug> Debug for State<D, T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("State").field("token", &self.token).field("value", &*self.cell.borrow()).finish()
	}
}

/// Logs instead of propagating, for lifecycle callbacks invoked by the platform.
pub(crate) fn connect_logged<D: Dom>(host: &Component<D>) {
	if let Err(error) = host.connect() {
		error!("Failed to connect <{}>: {}", host.name(), error);
	}
}
