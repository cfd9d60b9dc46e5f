#![cfg(target_arch = "wasm32")]

use arbor_dom::{h, host::web::WebHost, NodeRef, Props, VNode};
use std::{cell::RefCell, rc::Rc};
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};

wasm_bindgen_test_configure!(run_in_browser);


#[wasm_bindgen_test]
fn text() {
	let (renderer, body) = web_body_::setup();
	renderer.render(&VNode::text("Hello arbor-dom!"), &body).unwrap();
	assert_eq!(body.text_content().as_deref(), Some("Hello arbor-dom!"));
}

#[wasm_bindgen_test]
fn element() {
	let (renderer, body) = web_body_::setup();
	let got_ref = Rc::new(RefCell::new(0));
	let g = got_ref.clone();
	let node_ref = NodeRef::<WebHost>::new(move |_| *g.borrow_mut() += 1);

	renderer
		.render(
			&h(
				"div",
				Props::new().node_ref(node_ref).with("id", "created").with("style", arbor_dom::Value::style([("color", "red")])),
				vec!["Hello ".into(), h("b", None, vec!["arbor-dom".into()]).into()],
			),
			&body,
		)
		.unwrap();

	assert_eq!(*got_ref.borrow(), 1);
	let element = renderer.host().document().get_element_by_id("created").unwrap();
	assert_eq!(element.inner_html(), "Hello <b>arbor-dom</b>");
	assert_eq!(element.get_attribute("style").as_deref(), Some("color: red;"));
}

#[wasm_bindgen_test]
fn svg() {
	let (renderer, body) = web_body_::setup();
	let vnode = renderer.render(&h("svg", None, vec![h("circle", Props::new().with("r", 5), Vec::new()).into()]), &body).unwrap();
	let circle = vnode.children()[0].host_node().unwrap().clone();
	let circle: &web_sys::Element = wasm_bindgen::JsCast::unchecked_ref(&circle);
	assert_eq!(circle.namespace_uri().as_deref(), Some(arbor_dom::host::SVG_NAMESPACE));
	assert_eq!(circle.get_attribute("r").as_deref(), Some("5"));
}
