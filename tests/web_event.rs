#![cfg(all(target_arch = "wasm32", feature = "web"))]

use legot::{web::WebDom, Differ, Element, Node};
use std::{cell::Cell, rc::Rc, sync::Once};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::HtmlElement;

wasm_bindgen_test_configure!(run_in_browser);

type El = Element<WebDom>;

fn init_logging() {
	static INIT: Once = Once::new();
	INIT.call_once(tracing_wasm::set_as_global_default);
}

#[wasm_bindgen_test]
fn click() {
	init_logging();
	let dom = WebDom::new().unwrap();
	let differ = Differ::new(dom.clone());
	let body: web_sys::Node = dom.document().body().unwrap().into();

	let click_count = Rc::new(Cell::new(0));
	let button = || -> Node<WebDom> {
		El::new("button")
			.prop("id", "test-button")
			.on("onClick", {
				let click_count = Rc::clone(&click_count);
				move |event, _| {
					assert!(event.dyn_ref::<web_sys::MouseEvent>().is_some());
					click_count.set(click_count.get() + 1);
				}
			})
			.into()
	};

	let vdom = differ.reconcile(&body, None, Some(button())).unwrap();
	assert_eq!(click_count.get(), 0);

	let element: HtmlElement = dom.document().get_element_by_id("test-button").unwrap().dyn_into().unwrap();
	element.click();
	assert_eq!(click_count.get(), 1);

	// A fresh handler replaces the old listener instead of adding a second one.
	let vdom = differ.reconcile(&body, vdom, Some(button())).unwrap();
	element.click();
	assert_eq!(click_count.get(), 2);

	let vdom = differ.reconcile(&body, vdom, Some(El::new("button").prop("id", "test-button").into())).unwrap();
	element.click();
	assert_eq!(click_count.get(), 2);

	differ.reconcile(&body, vdom, None).unwrap();
}
