use futures::channel::oneshot;
use legot::{
	component::Cleanup,
	memory::{MemoryDom, Mutation},
	registry::ComponentClass,
	Component, ComponentOptions, Differ, Dom, Error, MountEffect, Registry, ShadowRootMode, State, Value,
};
use std::{
	cell::{Cell, RefCell},
	rc::Rc,
};

mod memory_fixture_;
use memory_fixture_::{init_logging, El, N};

fn define_counter(registry: &mut Registry<MemoryDom>) -> Rc<ComponentClass<MemoryDom>> {
	registry
		.define_component(
			"x-counter",
			|host: &Component<MemoryDom>| {
				let count = host.create_state(0);
				host.render(move || {
					let current = count.get();
					let count = count.clone();
					El::new("span").on("onClick", move |_, _| count.set(current + 1).unwrap()).child(current).into()
				})
			},
			None,
		)
		.unwrap()
}

fn start(registry: &Registry<MemoryDom>, app: impl Into<N>) -> (N, Rc<Component<MemoryDom>>) {
	let mut app = app.into();
	let dom = registry.differ().dom();
	registry.init_app(&dom.document(), &mut app).unwrap();
	let host = dom.component(app.rendered().unwrap()).unwrap();
	(app, host)
}

#[test]
fn counter_end_to_end() {
	init_logging();
	let dom = MemoryDom::new();
	let mut registry = Registry::new(dom.clone());
	define_counter(&mut registry);

	let (_app, host) = start(&registry, El::new("x-counter"));
	assert!(host.is_connected());
	assert_eq!(host.name(), "x-counter");

	let root = *host.render_root();
	assert_eq!(dom.text_content(root), "0");
	let span = dom.children(root)[0];
	dom.take_mutations();

	assert_eq!(dom.dispatch(span, "click"), 1);
	assert_eq!(dom.text_content(root), "1");
	assert_eq!(dom.children(root), vec![span]);
	assert!(!dom
		.take_mutations()
		.iter()
		.any(|mutation| matches!(mutation, Mutation::Insert { .. } | Mutation::Remove { .. } | Mutation::Replace { .. } | Mutation::ReplaceChildren { .. })));

	dom.dispatch(span, "click");
	assert_eq!(dom.text_content(root), "2");
	assert_eq!(dom.listener_count(span, "click"), 1);
}

#[test]
fn rendering_root_is_isolated() {
	init_logging();
	let dom = MemoryDom::new();
	let mut registry = Registry::new(dom.clone());
	define_counter(&mut registry);
	registry
		.define_component(
			"x-open",
			|host: &Component<MemoryDom>| host.render(|| El::new("i").into()),
			Some(ComponentOptions {
				mode: ShadowRootMode::Open,
				delegates_focus: true,
			}),
		)
		.unwrap();

	let (closed, counter) = start(&registry, El::new("x-counter"));
	let closed = *closed.rendered().unwrap();
	assert_eq!(dom.shadow_root(closed), None);
	assert_eq!(dom.text_content(dom.document()), "");
	assert!(dom.children(closed).is_empty());
	assert!(dom.is_connected(dom.children(*counter.render_root())[0]));

	let (open, host) = start(&registry, El::new("x-open"));
	assert_eq!(dom.shadow_root(*open.rendered().unwrap()), Some(*host.render_root()));
	assert!(!counter.is_connected());
}

#[test]
fn state_slots_are_independent() {
	init_logging();
	let dom = MemoryDom::new();
	let mut registry = Registry::new(dom.clone());

	type Pair = (State<MemoryDom, i32>, State<MemoryDom, i32>);
	let slots: Rc<RefCell<Option<Pair>>> = Rc::default();
	registry
		.define_component(
			"x-pair",
			{
				let slots = Rc::clone(&slots);
				move |host: &Component<MemoryDom>| {
					let (a, b) = (host.create_state(0), host.create_state(0));
					*slots.borrow_mut() = Some((a.clone(), b.clone()));
					host.render(move || El::new("p").child(format!("{} {}", a.get(), b.get())).into())
				}
			},
			None,
		)
		.unwrap();

	let (_app, host) = start(&registry, El::new("x-pair"));
	let (a, b) = slots.borrow().clone().unwrap();
	assert_ne!(a.token(), b.token());
	assert_eq!(host.state_count(), 2);

	a.set(5).unwrap();
	assert_eq!(b.get(), 0);
	assert_eq!(dom.text_content(*host.render_root()), "5 0");

	b.set(7).unwrap();
	assert_eq!(a.get(), 5);
	assert_eq!(b.with(|value| value * 2), 14);
	assert_eq!(dom.text_content(*host.render_root()), "5 7");
}

#[test]
fn every_write_re_renders() {
	init_logging();
	let dom = MemoryDom::new();
	let mut registry = Registry::new(dom.clone());

	let log = Rc::new(RefCell::new(Vec::new()));
	let state = Rc::new(RefCell::new(None));
	registry
		.define_component(
			"x-logged",
			{
				let (log, state) = (Rc::clone(&log), Rc::clone(&state));
				move |host: &Component<MemoryDom>| {
					let value = host.create_state("same");
					*state.borrow_mut() = Some(value.clone());
					host.on_update({
						let log = Rc::clone(&log);
						move || log.borrow_mut().push("update")
					});
					let log = Rc::clone(&log);
					host.render(move || {
						log.borrow_mut().push("render");
						El::new("p").child(value.get()).into()
					})
				}
			},
			None,
		)
		.unwrap();

	start(&registry, El::new("x-logged"));
	assert_eq!(*log.borrow(), ["render"]);
	dom.take_mutations();

	let value = state.borrow().clone().unwrap();
	value.set("same").unwrap();
	assert_eq!(*log.borrow(), ["render", "update", "render"]);
	assert!(dom.take_mutations().is_empty());
}

#[test]
fn update_before_render_fails() {
	init_logging();
	let dom = MemoryDom::new();
	let mut registry = Registry::new(dom.clone());
	registry.define_component("x-lazy", |_: &Component<MemoryDom>| Ok(()), None).unwrap();

	let (_app, host) = start(&registry, El::new("x-lazy"));
	dom.take_mutations();

	assert!(matches!(host.update(), Err(Error::UpdateBeforeRender)));
	assert!(matches!(host.create_state(1).set(2), Err(Error::UpdateBeforeRender)));
	assert!(dom.take_mutations().is_empty());
	assert!(dom.children(*host.render_root()).is_empty());
}

#[test]
fn writes_after_the_host_is_gone_fail() {
	init_logging();
	let dom = MemoryDom::new();
	let mut registry = Registry::new(dom.clone());
	let class = define_counter(&mut registry);

	let element = dom.create_element("div").unwrap();
	let host = Component::construct(class, element).unwrap();
	let state = host.create_state(0);
	drop(host);

	assert!(matches!(state.set(1), Err(Error::ComponentDropped)));
	assert_eq!(state.get(), 1);
}

#[test]
fn failing_factory_is_contained() {
	init_logging();
	let dom = MemoryDom::new();
	let mut registry = Registry::new(dom.clone());
	registry
		.define_component("x-broken", |_: &Component<MemoryDom>| Err(Error::Platform("broken on purpose".to_owned())), None)
		.unwrap();

	let (app, host) = start(&registry, El::new("x-broken"));
	assert_eq!(dom.children(dom.document()), vec![*app.rendered().unwrap()]);
	assert!(dom.children(*host.render_root()).is_empty());
}

#[test]
fn styles_stay_in_front() {
	init_logging();
	let dom = MemoryDom::new();
	let mut registry = Registry::new(dom.clone());
	registry
		.define_component(
			"x-styled",
			|host: &Component<MemoryDom>| {
				host.set_styles("p { color: red; }")?;
				host.render(|| El::new("p").child("styled").into())
			},
			Some(ComponentOptions {
				mode: ShadowRootMode::Open,
				..ComponentOptions::default()
			}),
		)
		.unwrap();

	let (app, host) = start(&registry, El::new("x-styled"));
	let root = dom.shadow_root(*app.rendered().unwrap()).unwrap();
	let children = dom.children(root);
	assert_eq!(children.len(), 2);
	assert_eq!(dom.tag_name(children[0]).as_deref(), Some("style"));
	assert_eq!(dom.text_content(children[0]), "p { color: red; }");
	assert_eq!(dom.tag_name(children[1]).as_deref(), Some("p"));

	host.set_styles("p { color: blue; }").unwrap();
	host.update().unwrap();
	assert_eq!(dom.children(root), children);
	assert_eq!(dom.text_content(children[0]), "p { color: blue; }");
}

#[test]
fn mount_effect_cleanup_runs_on_disconnect() {
	init_logging();
	let dom = MemoryDom::new();
	let mut registry = Registry::new(dom.clone());

	let (factory_runs, mounts, cleanups) = (Rc::new(Cell::new(0)), Rc::new(Cell::new(0)), Rc::new(Cell::new(0)));
	registry
		.define_component(
			"x-effect",
			{
				let (factory_runs, mounts, cleanups) = (Rc::clone(&factory_runs), Rc::clone(&mounts), Rc::clone(&cleanups));
				move |host: &Component<MemoryDom>| {
					factory_runs.set(factory_runs.get() + 1);
					let (mounts, cleanups) = (Rc::clone(&mounts), Rc::clone(&cleanups));
					host.on_mount(move || {
						mounts.set(mounts.get() + 1);
						let cleanups = Rc::clone(&cleanups);
						MountEffect::cleanup(move || cleanups.set(cleanups.get() + 1))
					});
					host.create_state(());
					host.render(|| El::new("p").into())
				}
			},
			None,
		)
		.unwrap();

	let (app, host) = start(&registry, El::new("x-effect"));
	let element = *app.rendered().unwrap();
	assert_eq!((factory_runs.get(), mounts.get(), cleanups.get()), (1, 1, 0));

	dom.remove(&element).unwrap();
	assert!(!host.is_connected());
	assert_eq!((factory_runs.get(), mounts.get(), cleanups.get()), (1, 1, 1));

	// Reconnecting runs the factory again, on the same instance.
	dom.append_child(&dom.document(), &element).unwrap();
	assert!(host.is_connected());
	assert_eq!((factory_runs.get(), mounts.get(), cleanups.get()), (2, 2, 1));
	// Only the new connection's slot is counted. The first one lives on in its handles only.
	assert_eq!(host.state_count(), 1);

	dom.replace_children(&dom.document(), &[]).unwrap();
	assert_eq!((factory_runs.get(), mounts.get(), cleanups.get()), (2, 2, 2));
}

#[test]
fn unit_mount_effect_has_no_cleanup() {
	init_logging();
	let dom = MemoryDom::new();
	let mut registry = Registry::new(dom.clone());

	let mounts = Rc::new(Cell::new(0));
	registry
		.define_component(
			"x-plain",
			{
				let mounts = Rc::clone(&mounts);
				move |host: &Component<MemoryDom>| {
					let mounts = Rc::clone(&mounts);
					host.on_mount(move || mounts.set(mounts.get() + 1));
					host.render(|| El::new("p").into())
				}
			},
			None,
		)
		.unwrap();

	let (app, host) = start(&registry, El::new("x-plain"));
	assert_eq!(mounts.get(), 1);
	dom.remove(app.rendered().unwrap()).unwrap();
	assert!(!host.is_connected());
	assert_eq!(mounts.get(), 1);
}

fn define_deferred(registry: &mut Registry<MemoryDom>, gate: oneshot::Receiver<()>, cleanups: &Rc<Cell<usize>>) {
	let gate = Rc::new(RefCell::new(Some(gate)));
	let cleanups = Rc::clone(cleanups);
	registry
		.define_component(
			"x-deferred",
			move |host: &Component<MemoryDom>| {
				let (gate, cleanups) = (Rc::clone(&gate), Rc::clone(&cleanups));
				host.on_mount(move || {
					let gate = gate.borrow_mut().take();
					let cleanups = Rc::clone(&cleanups);
					MountEffect::deferred(async move {
						if let Some(gate) = gate {
							if gate.await.is_err() {
								return None;
							}
						}
						Some(Box::new(move || cleanups.set(cleanups.get() + 1)) as Cleanup)
					})
				});
				host.render(|| El::new("p").into())
			},
			None,
		)
		.unwrap();
}

#[test]
fn deferred_cleanup_resolved_while_connected() {
	init_logging();
	let dom = MemoryDom::new();
	let mut registry = Registry::new(dom.clone());
	let (open, gate) = oneshot::channel();
	let cleanups = Rc::new(Cell::new(0));
	define_deferred(&mut registry, gate, &cleanups);

	let (app, _host) = start(&registry, El::new("x-deferred"));
	dom.run_until_stalled();
	open.send(()).unwrap();
	dom.run_until_stalled();
	assert_eq!(cleanups.get(), 0);

	dom.remove(app.rendered().unwrap()).unwrap();
	assert_eq!(cleanups.get(), 1);
}

#[test]
fn deferred_cleanup_resolved_after_disconnect_runs_immediately() {
	init_logging();
	let dom = MemoryDom::new();
	let mut registry = Registry::new(dom.clone());
	let (open, gate) = oneshot::channel();
	let cleanups = Rc::new(Cell::new(0));
	define_deferred(&mut registry, gate, &cleanups);

	let (app, host) = start(&registry, El::new("x-deferred"));
	dom.run_until_stalled();
	dom.remove(app.rendered().unwrap()).unwrap();
	assert!(!host.is_connected());
	assert_eq!(cleanups.get(), 0);

	open.send(()).unwrap();
	dom.run_until_stalled();
	assert_eq!(cleanups.get(), 1);
}

#[test]
fn parent_updates_forward_props_to_children() {
	init_logging();
	let dom = MemoryDom::new();
	let mut registry = Registry::new(dom.clone());
	registry
		.define_component(
			"x-label",
			|host: &Component<MemoryDom>| {
				let this = host.weak_ref();
				host.render(move || {
					let text = this.upgrade().and_then(|host| host.props().get("text").and_then(Value::to_attribute)).unwrap_or_default();
					El::new("span").child(text).into()
				})
			},
			None,
		)
		.unwrap();
	registry
		.define_component(
			"x-parent",
			|host: &Component<MemoryDom>| {
				let count = host.create_state(0);
				host.render(move || {
					let current = count.get();
					let count = count.clone();
					El::new("div")
						.on("onClick", move |_, _| count.set(current + 1).unwrap())
						.child(El::new("x-label").prop("text", current))
						.into()
				})
			},
			None,
		)
		.unwrap();

	let (_app, parent) = start(&registry, El::new("x-parent"));
	let div = dom.children(*parent.render_root())[0];
	let label_element = dom.children(div)[0];
	let label = dom.component(&label_element).unwrap();
	assert!(label.is_connected());
	assert_eq!(dom.text_content(*label.render_root()), "0");
	let span = dom.children(*label.render_root())[0];

	dom.dispatch(div, "click");
	assert_eq!(dom.children(div), vec![label_element]);
	assert!(Rc::ptr_eq(&dom.component(&label_element).unwrap(), &label));
	assert_eq!(dom.children(*label.render_root()), vec![span]);
	assert_eq!(dom.text_content(*label.render_root()), "1");
}

#[test]
fn children_are_forwarded_to_the_host() {
	init_logging();
	let dom = MemoryDom::new();
	let mut registry = Registry::new(dom.clone());
	registry
		.define_component(
			"x-frame",
			|host: &Component<MemoryDom>| {
				let this = host.weak_ref();
				host.render(move || El::new("section").children(this.upgrade().map(|host| host.children()).unwrap_or_default()).into())
			},
			None,
		)
		.unwrap();

	let (app, host) = start(&registry, El::new("x-frame").child(El::new("b").child("inner")).child(" text"));
	assert!(dom.children(*app.rendered().unwrap()).is_empty());
	assert_eq!(dom.text_content(dom.document()), "");
	assert_eq!(dom.text_content(*host.render_root()), "inner text");
}

#[test]
fn component_tag_change_replaces_the_host() {
	init_logging();
	let dom = MemoryDom::new();
	let mut registry = Registry::new(dom.clone());
	define_counter(&mut registry);
	registry.define_component("x-other", |host: &Component<MemoryDom>| host.render(|| El::new("em").into()), None).unwrap();

	let (app, counter) = start(&registry, El::new("x-counter"));
	let new = registry
		.differ()
		.reconcile(&dom.document(), Some(app), Some(El::new("x-other").into()))
		.unwrap()
		.unwrap();

	assert!(!counter.is_connected());
	let other = dom.component(new.rendered().unwrap()).unwrap();
	assert_eq!(other.name(), "x-other");
	assert!(other.is_connected());
}

#[test]
fn failed_update_clears_the_rendering_root() {
	init_logging();
	let dom = MemoryDom::new();
	let mut registry = Registry::with_differ(Differ::new(dom.clone()).with_depth_limit(6));

	let deep: Rc<RefCell<Option<State<MemoryDom, bool>>>> = Rc::default();
	registry
		.define_component(
			"x-deep",
			{
				let deep = Rc::clone(&deep);
				move |host: &Component<MemoryDom>| {
					let slot = host.create_state(false);
					*deep.borrow_mut() = Some(slot.clone());
					host.render(move || {
						if slot.get() {
							(0..10).fold(El::new("div"), |inner, _| El::new("div").child(inner)).into()
						} else {
							El::new("p").child("shallow").into()
						}
					})
				}
			},
			None,
		)
		.unwrap();

	let (_app, host) = start(&registry, El::new("x-deep"));
	let root = *host.render_root();
	assert_eq!(dom.text_content(root), "shallow");
	let deep = deep.borrow().clone().unwrap();

	assert!(matches!(deep.set(true), Err(Error::DepthLimitReached(6))));
	assert!(dom.children(root).is_empty());

	deep.set(false).unwrap();
	let children = dom.children(root);
	assert_eq!(children.len(), 1);
	assert_eq!(dom.tag_name(children[0]).as_deref(), Some("p"));
	assert_eq!(dom.text_content(root), "shallow");

	// Back on a baseline, so this patches in place.
	deep.set(false).unwrap();
	assert_eq!(dom.children(root), children);
}
