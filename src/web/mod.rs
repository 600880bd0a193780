//! The browser DOM, through `web-sys`.
//!
//! Component classes are registered as custom elements whose constructor, `connectedCallback` and
//! `disconnectedCallback` forward to the [`Component`] behind each instance.

use crate::{
	component::{self, Component},
	dom::{Dom, Handler, NodeKind},
	registry::{ComponentClass, ComponentOptions, ShadowRootMode},
	Error,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use tracing::{error, trace};
use wasm_bindgen::{closure::Closure, prelude::wasm_bindgen, JsCast, JsValue};

mod host_map;

/// An attached event listener. Dropping the last handle invalidates the JavaScript function.
pub type WebListener = Rc<Closure<dyn Fn(web_sys::Event)>>;

type LifecycleCallback = Closure<dyn Fn(web_sys::HtmlElement)>;

#[wasm_bindgen(inline_js = "
export function host_element_class(construct, connect, disconnect) {
	return class extends HTMLElement {
		constructor() {
			super();
			construct(this);
		}
		connectedCallback() {
			connect(this);
		}
		disconnectedCallback() {
			disconnect(this);
		}
	};
}
")]
extern "C" {
	fn host_element_class(construct: &JsValue, connect: &JsValue, disconnect: &JsValue) -> js_sys::Function;
}

/// A handle to one browser document.
#[derive(Debug, Clone)]
pub struct WebDom {
	document: web_sys::Document,
}

impl WebDom {
	/// Binds to the document of the current window.
	///
	/// # Errors
	///
	/// Fails outside of a window context.
	pub fn new() -> Result<Self, Error> {
		let document = web_sys::window()
			.and_then(|window| window.document())
			.ok_or_else(|| Error::Platform("no document available".to_owned()))?;
		Ok(Self { document })
	}

	#[must_use]
	pub fn with_document(document: web_sys::Document) -> Self {
		Self { document }
	}

	#[must_use]
	pub fn document(&self) -> &web_sys::Document {
		&self.document
	}

	fn custom_elements() -> Result<web_sys::CustomElementRegistry, Error> {
		web_sys::window()
			.map(|window| window.custom_elements())
			.ok_or_else(|| Error::Platform("no custom element registry available".to_owned()))
	}
}

#[allow(clippy::needless_pass_by_value)]
fn platform(error: JsValue) -> Error {
	Error::Platform(format!("{:?}", error))
}

fn as_element(node: &web_sys::Node) -> Result<&web_sys::Element, Error> {
	node.dyn_ref::<web_sys::Element>().ok_or_else(|| Error::Platform(format!("{:?} is not an element", node)))
}

impl Dom for WebDom {
	type Node = web_sys::Node;
	type Event = web_sys::Event;
	type Listener = WebListener;

	fn create_text_node(&self, data: &str) -> web_sys::Node {
		self.document.create_text_node(data).into()
	}

	fn create_element(&self, tag_name: &str) -> Result<web_sys::Node, Error> {
		self.document.create_element(tag_name).map(Into::into).map_err(platform)
	}

	fn create_element_ns(&self, namespace: &str, tag_name: &str) -> Result<web_sys::Node, Error> {
		self.document.create_element_ns(Some(namespace), tag_name).map(Into::into).map_err(platform)
	}

	fn kind(&self, node: &web_sys::Node) -> NodeKind {
		match node.node_type() {
			web_sys::Node::ELEMENT_NODE => NodeKind::Element,
			web_sys::Node::TEXT_NODE => NodeKind::Text,
			_ => NodeKind::Other,
		}
	}

	fn component(&self, node: &web_sys::Node) -> Option<Rc<Component<Self>>> {
		host_map::get(node)
	}

	fn set_text(&self, text: &web_sys::Node, data: &str) -> Result<(), Error> {
		text.set_node_value(Some(data));
		Ok(())
	}

	fn set_attribute(&self, element: &web_sys::Node, name: &str, value: &str) -> Result<(), Error> {
		as_element(element)?.set_attribute(name, value).map_err(platform)
	}

	fn remove_attribute(&self, element: &web_sys::Node, name: &str) -> Result<(), Error> {
		as_element(element)?.remove_attribute(name).map_err(platform)
	}

	fn add_event_listener(&self, element: &web_sys::Node, event: &str, handler: Handler<Self>) -> Result<WebListener, Error> {
		let target = element.clone();
		let closure = Closure::wrap(Box::new(move |event: web_sys::Event| handler(&event, &target)) as Box<dyn Fn(web_sys::Event)>);
		element.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref()).map_err(platform)?;
		Ok(Rc::new(closure))
	}

	fn remove_event_listener(&self, element: &web_sys::Node, event: &str, listener: &WebListener) -> Result<(), Error> {
		let function: &js_sys::Function = (**listener).as_ref().unchecked_ref();
		element.remove_event_listener_with_callback(event, function).map_err(platform)
	}

	fn append_child(&self, parent: &web_sys::Node, child: &web_sys::Node) -> Result<(), Error> {
		parent.append_child(child).map(drop).map_err(platform)
	}

	fn prepend_child(&self, parent: &web_sys::Node, child: &web_sys::Node) -> Result<(), Error> {
		parent.insert_before(child, parent.first_child().as_ref()).map(drop).map_err(platform)
	}

	fn replace_with(&self, old: &web_sys::Node, new: &web_sys::Node) -> Result<(), Error> {
		match old.parent_node() {
			Some(parent) => parent.replace_child(new, old).map(drop).map_err(platform),
			None => Ok(()),
		}
	}

	fn remove(&self, node: &web_sys::Node) -> Result<(), Error> {
		match node.parent_node() {
			Some(parent) => parent.remove_child(node).map(drop).map_err(platform),
			None => Ok(()),
		}
	}

	fn replace_children(&self, parent: &web_sys::Node, children: &[web_sys::Node]) -> Result<(), Error> {
		while let Some(child) = parent.first_child() {
			parent.remove_child(&child).map_err(platform)?;
		}
		for child in children {
			parent.append_child(child).map_err(platform)?;
		}
		Ok(())
	}

	fn attach_render_root(&self, host: &web_sys::Node, options: ComponentOptions) -> Result<web_sys::Node, Error> {
		let mode = match options.mode {
			ShadowRootMode::Open => web_sys::ShadowRootMode::Open,
			ShadowRootMode::Closed => web_sys::ShadowRootMode::Closed,
		};
		let init = web_sys::ShadowRootInit::new(mode);
		init.set_delegates_focus(options.delegates_focus);
		as_element(host)?.attach_shadow(&init).map(Into::into).map_err(platform)
	}

	fn is_defined(&self, name: &str) -> bool {
		Self::custom_elements().map_or(false, |registry| !registry.get(name).is_undefined())
	}

	fn define_element(&self, class: Rc<ComponentClass<Self>>) -> Result<(), Error> {
		if !class.name().contains('-') {
			return Err(Error::InvalidComponentName(class.name().to_owned()));
		}
		let registry = Self::custom_elements()?;

		let construct_class = Rc::clone(&class);
		let construct: LifecycleCallback = Closure::wrap(Box::new(move |element: web_sys::HtmlElement| {
			let element: web_sys::Node = element.into();
			match Component::construct(Rc::clone(&construct_class), element.clone()) {
				Ok(host) => host_map::publish(&element, host),
				Err(error) => error!("Failed to construct <{}>: {}", construct_class.name(), error),
			}
		}) as Box<dyn Fn(web_sys::HtmlElement)>);

		let connect: LifecycleCallback = Closure::wrap(Box::new(|element: web_sys::HtmlElement| match host_map::get(&element) {
			Some(host) => component::connect_logged(&host),
			None => error!("Connected a component host that was never constructed: {:?}", element),
		}) as Box<dyn Fn(web_sys::HtmlElement)>);

		let disconnect: LifecycleCallback = Closure::wrap(Box::new(|element: web_sys::HtmlElement| {
			if let Some(host) = host_map::get(&element) {
				host.disconnect();
			}
		}) as Box<dyn Fn(web_sys::HtmlElement)>);

		let constructor = host_element_class(construct.as_ref(), connect.as_ref(), disconnect.as_ref());
		registry.define(class.name(), &constructor).map_err(platform)?;
		host_map::retain(class.name(), [construct, connect, disconnect]);
		trace!(name = class.name(), "Defined custom element");
		Ok(())
	}

	fn spawn_local(&self, future: LocalBoxFuture<'static, ()>) {
		wasm_bindgen_futures::spawn_local(future);
	}
}
