//! The browser DOM through [`web_sys`].

use super::{Host, NodeId};
use crate::{
	props::{Listener, ListenerOptions, Value},
	rc_hash_map::RcHashMap,
	Error,
};
use core::cell::{Cell, RefCell};
use js_sys::{Function, Reflect};
use tracing::{instrument, trace, warn};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};

/// Expando property used for [`Host::node_id`].
const NODE_ID_PROPERTY: &str = "__arborNodeId";

fn js_error(value: JsValue) -> Error {
	Error::Host(format!("{:?}", value))
}

fn cast<T: JsCast>(node: &web_sys::Node, what: &str) -> Result<T, Error> {
	node.clone().dyn_into::<T>().map_err(|node| Error::Host(format!("Expected {} but found {:?}", what, node)))
}

/// Binds a [`Renderer`](`crate::Renderer`) to a [`web_sys::Document`].
///
/// # Safety
///
/// Listener closures are reference-counted per callback allocation and freed once no node uses them anymore.
/// `once` listeners that already fired stay counted until they are removed through the renderer.
#[allow(clippy::type_complexity)]
#[derive(Debug)]
pub struct WebHost {
	document: web_sys::Document,
	handler_handles: RefCell<RcHashMap<usize, u16, Closure<dyn Fn(web_sys::Event)>>>,
	event_listener_options_cache: RefCell<[Option<web_sys::AddEventListenerOptions>; 8]>,
	next_id: Cell<u64>,
}

impl WebHost {
	#[must_use]
	pub fn new(document: web_sys::Document) -> Self {
		Self {
			document,
			handler_handles: RefCell::default(),
			event_listener_options_cache: RefCell::new([None, None, None, None, None, None, None, None]),
			next_id: Cell::new(0),
		}
	}

	/// The document of the current window.
	///
	/// # Errors
	///
	/// Outside a browser main thread.
	pub fn from_window() -> Result<Self, Error> {
		let document = web_sys::window().and_then(|window| window.document()).ok_or_else(|| Error::Host("No window document".to_owned()))?;
		Ok(Self::new(document))
	}

	#[must_use]
	pub fn document(&self) -> &web_sys::Document {
		&self.document
	}

	/// How many distinct listener closures are alive.
	#[must_use]
	pub fn listener_closure_count(&self) -> usize {
		self.handler_handles.borrow().len()
	}

	fn add_event_listener_options(&self, options: ListenerOptions) -> web_sys::AddEventListenerOptions {
		let mut cache = self.event_listener_options_cache.borrow_mut();
		let entry = &mut cache[usize::from(options.capture) + usize::from(options.once) * 2 + usize::from(options.passive) * 4];
		entry
			.get_or_insert_with(|| {
				let web_options = web_sys::AddEventListenerOptions::new();
				web_options.set_capture(options.capture);
				web_options.set_once(options.once);
				web_options.set_passive(options.passive);
				web_options
			})
			.clone()
	}

	fn to_js(value: &Value<Self>) -> Option<JsValue> {
		match value {
			Value::Null => Some(JsValue::NULL),
			Value::Bool(value) => Some(JsValue::from_bool(*value)),
			Value::Number(value) => Some(JsValue::from_f64(*value)),
			Value::Text(text) => Some(JsValue::from_str(text)),
			Value::Style(_) | Value::Classes(_) => value.to_attribute().map(|text| JsValue::from_str(&text)),
			Value::Opaque(opaque) => opaque.downcast_ref::<JsValue>().cloned(),
			Value::Listener(_) => None,
		}
	}
}

impl Host for WebHost {
	type Node = web_sys::Node;
	type Event = web_sys::Event;

	fn create_element(&self, tag: &str, namespace: Option<&str>) -> Result<web_sys::Node, Error> {
		let element = match namespace {
			Some(namespace) => self.document.create_element_ns(Some(namespace), tag),
			None => self.document.create_element(tag),
		};
		element.map(Into::into).map_err(js_error)
	}

	fn create_text(&self, text: &str) -> Result<web_sys::Node, Error> {
		Ok(self.document.create_text_node(text).into())
	}

	fn set_text(&self, node: &web_sys::Node, text: &str) -> Result<(), Error> {
		cast::<web_sys::CharacterData>(node, "character data")?.set_data(text);
		Ok(())
	}

	fn insert_before(&self, parent: &web_sys::Node, child: &web_sys::Node, reference: Option<&web_sys::Node>) -> Result<(), Error> {
		parent.insert_before(child, reference).map(drop).map_err(js_error)
	}

	fn remove_child(&self, parent: &web_sys::Node, child: &web_sys::Node) -> Result<(), Error> {
		parent.remove_child(child).map(drop).map_err(js_error)
	}

	fn clear_children(&self, parent: &web_sys::Node) -> Result<(), Error> {
		parent.set_text_content(Some(""));
		Ok(())
	}

	fn child_count(&self, parent: &web_sys::Node) -> usize {
		parent.child_nodes().length() as usize
	}

	fn parent(&self, node: &web_sys::Node) -> Option<web_sys::Node> {
		node.parent_node()
	}

	fn same_node(&self, a: &web_sys::Node, b: &web_sys::Node) -> bool {
		a.is_same_node(Some(b))
	}

	#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]
	fn node_id(&self, node: &web_sys::Node) -> NodeId {
		let key = JsValue::from_str(NODE_ID_PROPERTY);
		if let Some(id) = Reflect::get(node, &key).ok().and_then(|id| id.as_f64()) {
			return NodeId(id as u64);
		}
		let id = self.next_id.get() + 1;
		self.next_id.set(id);
		if Reflect::set(node, &key, &JsValue::from_f64(id as f64)).is_err() {
			warn!("Could not tag {:?} with a node id.", node);
		}
		NodeId(id)
	}

	fn template_content(&self, template: &web_sys::Node) -> Option<web_sys::Node> {
		template.dyn_ref::<web_sys::HtmlTemplateElement>().map(|template| template.content().into())
	}

	fn get_attribute(&self, node: &web_sys::Node, name: &str) -> Option<String> {
		node.dyn_ref::<web_sys::Element>().and_then(|element| element.get_attribute(name))
	}

	fn set_attribute(&self, node: &web_sys::Node, namespace: Option<&str>, name: &str, value: &str) -> Result<(), Error> {
		let element = cast::<web_sys::Element>(node, "element")?;
		match namespace {
			Some(namespace) => element.set_attribute_ns(Some(namespace), name, value),
			None => element.set_attribute(name, value),
		}
		.map_err(js_error)
	}

	fn remove_attribute(&self, node: &web_sys::Node, namespace: Option<&str>, name: &str) -> Result<(), Error> {
		let element = cast::<web_sys::Element>(node, "element")?;
		match namespace {
			Some(namespace) => element.remove_attribute_ns(Some(namespace), name.split_once(':').map_or(name, |(_, local)| local)),
			None => element.remove_attribute(name),
		}
		.map_err(js_error)
	}

	fn set_property(&self, node: &web_sys::Node, name: &str, value: &Value<Self>) -> Result<(), Error> {
		match Self::to_js(value) {
			Some(value) => Reflect::set(node, &JsValue::from_str(name), &value).map(drop).map_err(js_error),
			None => {
				warn!("Can't express {:?} as JavaScript value for property {:?}. Skipping.", value, name);
				Ok(())
			}
		}
	}

	fn set_style(&self, node: &web_sys::Node, name: &str, value: Option<&str>) -> Result<(), Error> {
		let style = if let Some(element) = node.dyn_ref::<web_sys::HtmlElement>() {
			element.style()
		} else if let Some(element) = node.dyn_ref::<web_sys::SvgElement>() {
			element.style()
		} else {
			return Err(Error::Host(format!("No inline style on {:?}", node)));
		};
		match value {
			Some(value) => style.set_property(name, value),
			None => style.remove_property(name).map(drop),
		}
		.map_err(js_error)
	}

	fn set_class_name(&self, node: &web_sys::Node, class_name: &str) -> Result<(), Error> {
		// `className` is an `SVGAnimatedString` on SVG elements, so go through the attribute.
		self.set_attribute(node, None, "class", class_name)
	}

	fn add_class(&self, node: &web_sys::Node, token: &str) -> Result<(), Error> {
		cast::<web_sys::Element>(node, "element")?.class_list().add_1(token).map_err(js_error)
	}

	fn remove_class(&self, node: &web_sys::Node, token: &str) -> Result<(), Error> {
		cast::<web_sys::Element>(node, "element")?.class_list().remove_1(token).map_err(js_error)
	}

	#[instrument(skip(self, listener))]
	fn add_listener(&self, node: &web_sys::Node, event: &str, listener: &Listener<Self>) -> Result<(), Error> {
		let options = self.add_event_listener_options(listener.options);
		let mut handles = self.handler_handles.borrow_mut();
		let closure = handles
			.increment_or_insert_with(listener.callback_address(), |_| {
				trace!("Creating listener closure.");
				let callback = listener.callback().clone();
				Closure::wrap(Box::new(move |event: web_sys::Event| callback(&event)) as Box<dyn Fn(web_sys::Event)>)
			})
			.map_err(|_| Error::Host("Too many (more than 65k) active references to the same listener".to_owned()))?;
		node.add_event_listener_with_callback_and_add_event_listener_options(event, closure.as_ref().unchecked_ref::<Function>(), &options)
			.map_err(js_error)
	}

	#[instrument(skip(self, listener))]
	fn remove_listener(&self, node: &web_sys::Node, event: &str, listener: &Listener<Self>) -> Result<(), Error> {
		let mut handles = self.handler_handles.borrow_mut();
		match handles.weak_decrement(&listener.callback_address()) {
			Ok(Some(closure)) => node
				.remove_event_listener_with_callback_and_bool(event, closure.as_ref().unchecked_ref::<Function>(), listener.options.capture)
				.map_err(js_error)?,
			Ok(None) => warn!("Removing a listener that was never added."),
			Err(_) => warn!("Listener reference count underflow."),
		}

		let freed = handles.drain_weak().count();
		if freed > 0 {
			trace!("Freed {} listener closure(s).", freed);
		}
		Ok(())
	}
}
