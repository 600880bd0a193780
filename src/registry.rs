//! Component registration and the top-level mount entry point.

use crate::{component::Component, diff::Differ, dom::Dom, node::Node, Error};
use core::fmt::{self, Debug, Formatter};
use std::rc::Rc;
use tracing::{info, instrument};

/// Runs once per connection of a component instance and registers its render callback, hooks and state.
pub type Factory<D> = Rc<dyn Fn(&Component<D>) -> Result<(), Error>>;

/// Isolation strictness of a component's rendering root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowRootMode {
	Open,
	Closed,
}

/// Options applied to every instance of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentOptions {
	pub mode: ShadowRootMode,
	pub delegates_focus: bool,
}

impl Default for ComponentOptions {
	fn default() -> Self {
		Self {
			mode: ShadowRootMode::Closed,
			delegates_focus: false,
		}
	}
}

/// Everything a platform adapter needs to construct instances of one defined component.
pub struct ComponentClass<D: Dom> {
	name: String,
	factory: Factory<D>,
	options: ComponentOptions,
	differ: Differ<D>,
}

impl<D: Dom> ComponentClass<D> {
	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[must_use]
	pub fn factory(&self) -> &Factory<D> {
		&self.factory
	}

	#[must_use]
	pub fn options(&self) -> ComponentOptions {
		self.options
	}

	#[must_use]
	pub fn differ(&self) -> &Differ<D> {
		&self.differ
	}
}

impl<D: Dom> Debug for ComponentClass<D> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("ComponentClass").field("name", &self.name).field("options", &self.options).finish_non_exhaustive()
	}
}

/// A successful registration, kept for introspection only.
#[derive(Debug, Clone)]
pub struct RegistryEntry<D: Dom> {
	pub name: String,
	pub class: Rc<ComponentClass<D>>,
}

/// The registration context of one application.
///
/// Entries are append-only until [`Registry::reset`], and the engines never consult them.
#[derive(Debug)]
pub struct Registry<D: Dom> {
	differ: Differ<D>,
	entries: Vec<RegistryEntry<D>>,
}

impl<D: Dom> Registry<D> {
	#[must_use]
	pub fn new(dom: D) -> Self {
		Self::with_differ(Differ::new(dom))
	}

	/// Uses `differ` (and its configuration) for all components defined through this registry.
	#[must_use]
	pub fn with_differ(differ: Differ<D>) -> Self {
		Self { differ, entries: Vec::new() }
	}

	#[must_use]
	pub fn differ(&self) -> &Differ<D> {
		&self.differ
	}

	/// Defines a component under `name`.
	///
	/// # Errors
	///
	/// [`Error::EmptyComponentName`], [`Error::AlreadyDefined`] if the platform already knows `name`,
	/// or whatever the platform reports when registering the element.
	#[instrument(skip(self, factory))]
	pub fn define_component(&mut self, name: &str, factory: impl Fn(&Component<D>) -> Result<(), Error> + 'static, options: Option<ComponentOptions>) -> Result<Rc<ComponentClass<D>>, Error> {
		if name.is_empty() {
			return Err(Error::EmptyComponentName);
		}
		if self.differ.dom().is_defined(name) || self.entries.iter().any(|entry| entry.name == name) {
			return Err(Error::AlreadyDefined(name.to_owned()));
		}

		let class = Rc::new(ComponentClass {
			name: name.to_owned(),
			factory: Rc::new(factory),
			options: options.unwrap_or_default(),
			differ: self.differ.clone(),
		});
		self.differ.dom().define_element(Rc::clone(&class))?;
		self.entries.push(RegistryEntry { name: name.to_owned(), class: Rc::clone(&class) });
		info!("Defined component <{}>", name);
		Ok(class)
	}

	#[must_use]
	pub fn entries(&self) -> &[RegistryEntry<D>] {
		&self.entries
	}

	#[must_use]
	pub fn get(&self, name: &str) -> Option<&RegistryEntry<D>> {
		self.entries.iter().find(|entry| entry.name == name)
	}

	/// Forgets all entries.
	///
	/// Platform definitions stay in place, so the names remain taken on the surface itself.
	pub fn reset(&mut self) {
		self.entries.clear();
	}

	/// Replaces all children of `parent` with the freshly mounted `app`.
	///
	/// # Errors
	///
	/// Whatever mounting or inserting the tree reports.
	#[instrument(skip(self, app))]
	pub fn init_app(&self, parent: &D::Node, app: &mut Node<D>) -> Result<(), Error> {
		let live = self.differ.mount(app)?;
		self.differ.dom().replace_children(parent, &[live])
	}
}
