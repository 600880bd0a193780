use super::{LifecycleCallback, WebDom};
use crate::component::Component;
use core::cell::{Cell, RefCell};
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::{error, trace};
use wasm_bindgen::JsValue;

/// Property on each host element holding its key into `HOSTS`.
const HOST_ID: &str = "__legotHostId";

thread_local! {
	//TODO: Release hosts whose elements were garbage-collected, via a `FinalizationRegistry`.
	static HOSTS: RefCell<HashMap<u32, Rc<Component<WebDom>>>> = RefCell::default();
	static NEXT_ID: Cell<u32> = Cell::new(0);
	static CALLBACKS: RefCell<HashMap<String, [LifecycleCallback; 3]>> = RefCell::default();
}

/// Maps `element` to `host`. An element published before drops its earlier host.
pub(super) fn publish(element: &web_sys::Node, host: Rc<Component<WebDom>>) {
	let id = NEXT_ID.with(|next| {
		let id = next.get();
		next.set(id + 1);
		id
	});
	let previous = id_of(element);
	if let Err(error) = js_sys::Reflect::set(element, &JsValue::from_str(HOST_ID), &JsValue::from(id)) {
		return error!("Could not tag component host element {:?}: {:?}", element, error);
	}
	HOSTS.with(|hosts| {
		let mut hosts = hosts.borrow_mut();
		if let Some(previous) = previous {
			trace!(previous, "Releasing replaced component host");
			hosts.remove(&previous);
		}
		hosts.insert(id, host);
	});
	trace!(id, "Published component host");
}

pub(super) fn get(element: &web_sys::Node) -> Option<Rc<Component<WebDom>>> {
	let id = id_of(element)?;
	HOSTS.with(|hosts| hosts.borrow().get(&id).cloned())
}

fn id_of(element: &web_sys::Node) -> Option<u32> {
	let id = js_sys::Reflect::get(element, &JsValue::from_str(HOST_ID)).ok()?.as_f64()?;
	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	Some(id as u32)
}

/// Keeps a defined class's lifecycle callbacks alive. Custom element definitions are permanent, so these are never freed.
pub(super) fn retain(name: &str, callbacks: [LifecycleCallback; 3]) {
	CALLBACKS.with(|retained| retained.borrow_mut().insert(name.to_owned(), callbacks));
}
