use arbor_dom::{
	h,
	host::{
		memory::{MemoryHost, MemoryNode, MutationStats},
		Host,
	},
	Component, ComponentDef, ComponentMetadata, Error, Listener, NodeRef, Props, RenderFn, Renderer, VNode, Value,
};
use std::{
	cell::{Cell, RefCell},
	rc::Rc,
};

mod logging_;

fn setup() -> (MemoryHost, Renderer<MemoryHost>, MemoryNode) {
	logging_::init();
	let host = MemoryHost::new();
	let body = host.create_root();
	(host.clone(), Renderer::new(host), body)
}

#[test]
fn identical_patch_is_a_no_op() {
	let (host, renderer, body) = setup();
	let vnode = renderer.render(&h("div", Props::new().with("id", "x"), vec!["text".into()]), &body).unwrap();
	host.reset_stats();

	let patched = renderer.patch(&vnode, &vnode, &body).unwrap();
	assert!(patched.ptr_eq(&vnode));
	assert_eq!(host.stats(), MutationStats::default());
}

#[test]
fn text_is_updated_in_place() {
	let (host, renderer, body) = setup();
	let old = renderer.render(&VNode::text("before"), &body).unwrap();
	let text_node = old.host_node().unwrap().clone();
	host.reset_stats();

	let new = renderer.patch(&VNode::text("after"), &old, &body).unwrap();
	assert_eq!(new.host_node(), Some(&text_node));
	assert_eq!(body.text_content(), "after");
	assert_eq!(host.stats().text_updates, 1);
	assert_eq!(host.stats().created, 0);

	renderer.patch(&VNode::text("after"), &new, &body).unwrap();
	assert_eq!(host.stats().text_updates, 1);
}

#[test]
fn attributes_and_properties() {
	let (_, renderer, body) = setup();
	let old = renderer
		.render(&h("input", Props::new().with("name", "a").with("disabled", true).with("value", "1"), Vec::new()), &body)
		.unwrap();
	let input = old.host_node().unwrap().clone();

	let new = renderer.patch(&h("input", Props::new().with("name", "b").with("placeholder", "p"), Vec::new()), &old, &body).unwrap();
	assert_eq!(new.host_node(), Some(&input));
	assert_eq!(input.attribute("name").as_deref(), Some("b"));
	assert_eq!(input.attribute("placeholder").as_deref(), Some("p"));
	assert_eq!(input.attribute("disabled"), None);
	assert_eq!(input.property("value"), None);
}

#[test]
fn styles_are_merged() {
	let (_, renderer, body) = setup();
	let old = renderer.render(&h("p", Props::new().with("style", Value::style([("color", "red"), ("margin", "0")])), Vec::new()), &body).unwrap();
	let p = old.host_node().unwrap().clone();

	let new = renderer.patch(&h("p", Props::new().with("style", Value::style([("color", "blue"), ("padding", "1px")])), Vec::new()), &old, &body).unwrap();
	assert_eq!(p.style("color").as_deref(), Some("blue"));
	assert_eq!(p.style("margin"), None);
	assert_eq!(p.style("padding").as_deref(), Some("1px"));

	renderer.patch(&h("p", None, Vec::new()), &new, &body).unwrap();
	assert_eq!(p.attribute("style"), None);
}

#[test]
fn class_strings_replace() {
	let (_, renderer, body) = setup();
	let old = renderer.render(&h("p", Props::new().with("class", "a b"), Vec::new()), &body).unwrap();
	let p = old.host_node().unwrap().clone();

	let new = renderer.patch(&h("p", Props::new().with("class", Value::classes([("c", true)])), Vec::new()), &old, &body).unwrap();
	assert_eq!(p.attribute("class").as_deref(), Some("c"));

	renderer.patch(&h("p", None, Vec::new()), &new, &body).unwrap();
	assert_eq!(p.attribute("class"), None);
}

#[test]
fn listeners_are_swapped() {
	let (_, renderer, body) = setup();
	let log = Rc::new(RefCell::new(Vec::new()));
	let listener = |name: &'static str| {
		let log = log.clone();
		Listener::<MemoryHost>::new(move |_| log.borrow_mut().push(name))
	};

	let first = listener("first");
	let old = renderer.render(&h("button", Props::new().on("click", first.clone()), Vec::new()), &body).unwrap();
	let button = old.host_node().unwrap().clone();

	let same = renderer.patch(&h("button", Props::new().on("click", first), Vec::new()), &old, &body).unwrap();
	assert_eq!(button.listener_count("click"), 1);

	let swapped = renderer.patch(&h("button", Props::new().on("click", listener("second")), Vec::new()), &same, &body).unwrap();
	button.dispatch("click");
	assert_eq!(*log.borrow(), ["second"]);

	renderer.patch(&h("button", None, Vec::new()), &swapped, &body).unwrap();
	assert_eq!(button.listener_count("click"), 0);
}

#[test]
fn type_change_replaces() {
	let (host, renderer, body) = setup();
	let log = Rc::new(RefCell::new(Vec::new()));
	let l = log.clone();
	let node_ref = NodeRef::<MemoryHost>::new(move |node| l.borrow_mut().push(node.is_some()));

	let old = renderer.render(&h("div", Props::new().node_ref(node_ref), Vec::new()), &body).unwrap();
	let div = old.host_node().unwrap().clone();

	let new = renderer.patch(&h("section", None, Vec::new()), &old, &body).unwrap();
	let section = new.host_node().unwrap().clone();
	assert_ne!(section, div);
	assert_eq!(body.children(), vec![section]);
	assert_eq!(div.parent(), None);
	assert_eq!(*log.borrow(), [true, false]);
	assert_eq!(host.stats().removed, 1);
}

#[test]
fn refs_follow_identity() {
	let (_, renderer, body) = setup();
	let log = Rc::new(RefCell::new(Vec::new()));
	let node_ref = |name: &'static str| {
		let log = log.clone();
		NodeRef::<MemoryHost>::new(move |node| log.borrow_mut().push((name, node.is_some())))
	};

	let a = node_ref("a");
	let old = renderer.render(&h("div", Props::new().node_ref(a.clone()), Vec::new()), &body).unwrap();
	let same = renderer.patch(&h("div", Props::new().node_ref(a), Vec::new()), &old, &body).unwrap();
	assert_eq!(*log.borrow(), [("a", true)]);

	renderer.patch(&h("div", Props::new().node_ref(node_ref("b")), Vec::new()), &same, &body).unwrap();
	assert_eq!(*log.borrow(), [("a", true), ("a", false), ("b", true)]);
}

#[test]
fn custom_element_properties_and_slots() {
	let (_, renderer, body) = setup();
	let slotted = |slot: &str| h("span", Props::new().with("slot", slot), Vec::new());

	let old = renderer
		.render(&h("my-element", Props::new().with("items", 3).with("title", "t"), vec![slotted("start").into()]), &body)
		.unwrap();
	let element = old.host_node().unwrap().clone();
	assert_eq!(element.property("items"), Some(Value::from(3)));
	assert_eq!(element.attribute("title").as_deref(), Some("t"));

	let same_slots = renderer.patch(&h("my-element", Props::new().with("items", 4), vec![slotted("start").into()]), &old, &body).unwrap();
	assert_eq!(same_slots.host_node(), Some(&element));
	assert_eq!(element.property("items"), Some(Value::from(4)));
	assert_eq!(element.attribute("title"), None);

	let moved_slot = renderer.patch(&h("my-element", Props::new().with("items", 4), vec![slotted("end").into()]), &same_slots, &body).unwrap();
	assert_ne!(moved_slot.host_node(), Some(&element));
	assert_eq!(body.children().len(), 1);
	assert_eq!(body.inner_html(), r#"<my-element><span slot="end"></span></my-element>"#);
}

#[test]
fn templates_only_swap_render() {
	let (host, renderer, body) = setup();
	let render_a = Value::Opaque(Rc::new('a'));
	let old = renderer.render(&h("template", Props::new().with("render", render_a), vec![h("i", None, Vec::new()).into()]), &body).unwrap();
	let template = old.host_node().unwrap().clone();
	host.reset_stats();

	let render_b = Value::Opaque(Rc::new('b'));
	let new = renderer.patch(&h("template", Props::new().with("render", render_b.clone()), vec![h("b", None, Vec::new()).into()]), &old, &body).unwrap();
	assert_eq!(template.property("render"), Some(render_b));
	assert_eq!(template.content().unwrap().inner_html(), "<i></i>");
	assert!(new.children()[0].is_mounted());
	assert_eq!(host.stats().property_writes, 1);
	assert_eq!(host.stats().created, 0);
}

type Log = Rc<RefCell<Vec<String>>>;

fn names(props: &Props<MemoryHost>) -> String {
	props.iter().map(|(name, _)| name).collect::<Vec<_>>().join(",")
}

struct Labelled {
	log: Log,
	node: Option<MemoryNode>,
}

impl Component<MemoryHost> for Labelled {
	fn mount(&mut self, renderer: &Renderer<MemoryHost>, props: &Props<MemoryHost>, _: &[VNode<MemoryHost>], uncontrolled: &Props<MemoryHost>) -> Result<MemoryNode, Error> {
		let node = renderer.host().create_element("x-labelled", None)?;
		renderer.host().set_property(&node, "label", props.get("label").unwrap_or(&Value::Null))?;
		self.log.borrow_mut().push(format!("mount {} | {}", names(props), names(uncontrolled)));
		self.node = Some(node.clone());
		Ok(node)
	}

	fn patch(&mut self, renderer: &Renderer<MemoryHost>, props: &Props<MemoryHost>, _: &[VNode<MemoryHost>], uncontrolled: &Props<MemoryHost>, _: &Props<MemoryHost>) -> Result<(), Error> {
		let node = self.node.as_ref().ok_or(Error::NotMounted)?;
		renderer.host().set_property(node, "label", props.get("label").unwrap_or(&Value::Null))?;
		self.log.borrow_mut().push(format!("patch {} | {}", names(props), names(uncontrolled)));
		Ok(())
	}

	fn notify_mounted(&mut self) {
		self.log.borrow_mut().push("mounted".to_owned());
	}

	fn notify_unmounted(&mut self) {
		self.log.borrow_mut().push("unmounted".to_owned());
	}
}

fn labelled(log: &Log) -> Rc<ComponentDef<MemoryHost>> {
	let log = log.clone();
	ComponentDef::new("labelled", ComponentMetadata::new().property_with_default("size", 3).property("label").event("change"), move || {
		let component: Box<dyn Component<MemoryHost>> = Box::new(Labelled { log: log.clone(), node: None });
		component
	})
}

#[test]
fn components_split_props() {
	let (_, renderer, body) = setup();
	let log = Log::default();
	let def = labelled(&log);
	let noop = || Listener::<MemoryHost>::new(|_| ());

	let old = renderer
		.render(
			&h(
				def.clone(),
				Props::new().with("label", "a").with("id", "x").with("bogus", 1).on("click", noop()).on("change", noop()),
				Vec::new(),
			),
			&body,
		)
		.unwrap();
	let root = old.host_node().unwrap().clone();
	assert_eq!(*log.borrow(), ["mount size,label,onChange | id,onClick", "mounted"]);
	assert_eq!(root.property("label"), Some(Value::from("a")));
	assert_eq!(root.attribute("id").as_deref(), Some("x"));
	assert_eq!(root.attribute("bogus"), None);
	assert_eq!(root.listener_count("click"), 1);
	assert_eq!(root.listener_count("change"), 0);

	let new = renderer.patch(&h(def, Props::new().with("label", "b").with("id", "y"), Vec::new()), &old, &body).unwrap();
	assert_eq!(new.host_node(), Some(&root));
	assert_eq!(log.borrow()[2], "patch size,label | id");
	assert_eq!(root.property("label"), Some(Value::from("b")));
	assert_eq!(root.attribute("id").as_deref(), Some("y"));
	assert_eq!(root.listener_count("click"), 0);

	renderer.patch(&h("div", None, Vec::new()), &new, &body).unwrap();
	assert_eq!(log.borrow().last().map(String::as_str), Some("unmounted"));
	assert_eq!(body.inner_html(), "<div></div>");
}

#[test]
fn controlled_class_keeps_foreign_tokens() {
	let (host, renderer, body) = setup();
	let log = Log::default();
	let def = labelled(&log);

	let old = renderer.render(&h(def.clone(), Props::new().with("class", "a b"), Vec::new()), &body).unwrap();
	let root = old.host_node().unwrap().clone();
	host.add_class(&root, "internal").unwrap();

	renderer.patch(&h(def, Props::new().with("class", "b c"), Vec::new()), &old, &body).unwrap();
	assert!(!root.has_class("a"));
	assert!(root.has_class("b"));
	assert!(root.has_class("c"));
	assert!(root.has_class("internal"));
}

#[test]
fn component_refs() {
	let (_, renderer, body) = setup();
	let log = Log::default();
	let def = labelled(&log);
	let refs = Rc::new(RefCell::new(Vec::new()));
	let node_ref = |name: &'static str| {
		let refs = refs.clone();
		NodeRef::<MemoryHost>::new(move |node| refs.borrow_mut().push((name, node.is_some())))
	};

	let a = node_ref("a");
	let old = renderer.render(&h(def.clone(), Props::new().node_ref(a.clone()), Vec::new()), &body).unwrap();
	assert_eq!(*refs.borrow(), [("a", true)]);
	assert_eq!(log.borrow()[1], "mounted");

	let same = renderer.patch(&h(def.clone(), Props::new().node_ref(a), Vec::new()), &old, &body).unwrap();
	assert_eq!(*refs.borrow(), [("a", true)]);

	let swapped = renderer.patch(&h(def, Props::new().node_ref(node_ref("b")), Vec::new()), &same, &body).unwrap();
	assert_eq!(*refs.borrow(), [("a", true), ("a", false), ("b", true)]);

	renderer.patch(&h("div", None, Vec::new()), &swapped, &body).unwrap();
	assert_eq!(*refs.borrow(), [("a", true), ("a", false), ("b", true), ("b", false)]);
	assert_eq!(log.borrow().last().map(String::as_str), Some("unmounted"));
}

/// Mounts its content into its own root.
struct Frame;

impl Component<MemoryHost> for Frame {
	fn mount(&mut self, renderer: &Renderer<MemoryHost>, _: &Props<MemoryHost>, content: &[VNode<MemoryHost>], _: &Props<MemoryHost>) -> Result<MemoryNode, Error> {
		let node = renderer.host().create_element("x-frame", None)?;
		for child in content {
			let child = renderer.mount(child)?;
			renderer.host().insert_before(&node, &child, None)?;
		}
		Ok(node)
	}

	fn patch(&mut self, _: &Renderer<MemoryHost>, _: &Props<MemoryHost>, _: &[VNode<MemoryHost>], _: &Props<MemoryHost>, _: &Props<MemoryHost>) -> Result<(), Error> {
		Ok(())
	}
}

#[test]
fn discarded_components_release_their_content() {
	let (_, renderer, body) = setup();
	let def = ComponentDef::new("frame", ComponentMetadata::<MemoryHost>::new(), || {
		let component: Box<dyn Component<MemoryHost>> = Box::new(Frame);
		component
	});
	let refs = Rc::new(RefCell::new(Vec::new()));
	let r = refs.clone();
	let content_ref = NodeRef::<MemoryHost>::new(move |node| r.borrow_mut().push(node.is_some()));
	let noop = || Listener::<MemoryHost>::new(|_| ());

	let old = renderer
		.render(
			&h(
				def,
				Props::new().on("click", noop()),
				vec![h("button", Props::new().node_ref(content_ref).on("click", noop()), Vec::new()).into()],
			),
			&body,
		)
		.unwrap();
	let frame = old.host_node().unwrap().clone();
	let button = frame.children()[0].clone();
	assert_eq!(frame.listener_count("click"), 1);
	assert_eq!(button.listener_count("click"), 1);
	assert_eq!(*refs.borrow(), [true]);

	renderer.patch(&h("div", None, Vec::new()), &old, &body).unwrap();
	assert_eq!(*refs.borrow(), [true, false]);
	assert_eq!(frame.listener_count("click"), 0);
	assert_eq!(button.listener_count("click"), 0);
}

#[test]
fn removed_children_release_listeners() {
	let (_, renderer, body) = setup();
	let noop = || Listener::<MemoryHost>::new(|_| ());
	let button = |key: &str| h("button", Props::new().key(key).on("click", noop()), Vec::new());

	let old = renderer.render(&h("div", None, vec![button("a").into(), button("b").into(), button("c").into()]), &body).unwrap();
	let buttons = old.host_node().unwrap().children();

	let partial = renderer.patch(&h("div", None, vec![button("a").into(), button("c").into()]), &old, &body).unwrap();
	assert_eq!(buttons[1].listener_count("click"), 0);
	assert_eq!(buttons[0].listener_count("click"), 1);

	renderer.patch(&h("div", None, Vec::new()), &partial, &body).unwrap();
	assert!(buttons.iter().all(|button| button.listener_count("click") == 0));
}

#[test]
fn render_functions_skip_unchanged_props() {
	let (host, renderer, body) = setup();
	let renders = Rc::new(Cell::new(0));
	let r = renders.clone();
	let greeting = RenderFn::<MemoryHost>::new("greeting", move |props, _| {
		r.set(r.get() + 1);
		let name = props.get("name").and_then(Value::as_text).unwrap_or_default().to_owned();
		h("p", None, vec![name.into()])
	});

	let old = renderer.render(&h(greeting.clone(), Props::new().with("name", "a"), Vec::new()), &body).unwrap();
	let p = old.host_node().unwrap().clone();
	host.reset_stats();

	let same = renderer.patch(&h(greeting.clone(), Props::new().with("name", "a"), Vec::new()), &old, &body).unwrap();
	assert_eq!(renders.get(), 1);
	assert_eq!(same.host_node(), Some(&p));
	assert!(same.rendered().unwrap().ptr_eq(old.rendered().unwrap()));

	renderer.patch(&h(greeting, Props::new().with("name", "b"), Vec::new()), &same, &body).unwrap();
	assert_eq!(renders.get(), 2);
	assert_eq!(body.inner_html(), "<p>b</p>");
	assert_eq!(host.stats().text_updates, 1);
	assert_eq!(host.stats().created, 0);
}

#[test]
fn render_functions_honor_should_update() {
	let (_, renderer, body) = setup();
	let frozen = RenderFn::<MemoryHost>::with_should_update(
		"frozen",
		|props, _| h("p", None, vec![props.get("text").and_then(Value::as_text).unwrap_or_default().to_owned().into()]),
		|_, _, _, _| false,
	);

	let old = renderer.render(&h(frozen.clone(), Props::new().with("text", "first"), Vec::new()), &body).unwrap();
	renderer.patch(&h(frozen, Props::new().with("text", "second"), Vec::new()), &old, &body).unwrap();
	assert_eq!(body.inner_html(), "<p>first</p>");
}
