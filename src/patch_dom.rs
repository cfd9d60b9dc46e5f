//! Property and attribute patching of a single host node.

use crate::{
	host::Host,
	props::{attribute_namespace, class_tokens, classify, listener_event_name, ElementCategory, Props, PropertyTarget, Value},
	Error,
};
use tracing::{instrument, trace, warn};

/// Brings the properties of `node` from `old_props` (or nothing, on mount) to `new_props`.
///
/// In a `controlled` context (component roots), `class` is patched token by token so classes added by the component survive.
#[instrument(skip(host, new_props, old_props))]
pub fn patch_dom<H: Host>(host: &H, node: &H::Node, category: ElementCategory, new_props: &Props<H>, old_props: Option<&Props<H>>, controlled: bool) -> Result<(), Error> {
	for (name, value) in new_props.iter() {
		let old_value = old_props.and_then(|old_props| old_props.get(name));
		if old_value == Some(value) {
			continue;
		}
		patch_property(host, node, category, name, Some(value), old_value, controlled)?;
	}

	if let Some(old_props) = old_props {
		for (name, old_value) in old_props.iter() {
			if new_props.get(name).is_none() {
				patch_property(host, node, category, name, None, Some(old_value), controlled)?;
			}
		}
	}
	Ok(())
}

/// Drops the listeners `props` registered on `node`, which is being discarded.
///
/// Other properties are left as they are.
pub fn release_listeners<H: Host>(host: &H, node: &H::Node, category: ElementCategory, props: &Props<H>) -> Result<(), Error> {
	for (name, value) in props.iter() {
		if let (PropertyTarget::Listener, Value::Listener(listener)) = (classify(category, name), value) {
			if let Some(event) = listener_event_name(name) {
				trace!("Releasing {:?} listener", event);
				host.remove_listener(node, &event, listener)?;
			}
		}
	}
	Ok(())
}

fn patch_property<H: Host>(host: &H, node: &H::Node, category: ElementCategory, name: &str, value: Option<&Value<H>>, old_value: Option<&Value<H>>, controlled: bool) -> Result<(), Error> {
	match classify(category, name) {
		PropertyTarget::Ignored => {
			trace!("Ignoring reserved property {:?}", name);
			Ok(())
		}
		PropertyTarget::Style => patch_style(host, node, value, old_value),
		PropertyTarget::Class => patch_class(host, node, value, old_value, controlled),
		PropertyTarget::Listener => patch_listener(host, node, name, value, old_value),
		PropertyTarget::Attribute => patch_attribute(host, node, name, value),
		PropertyTarget::Property => host.set_property(node, name, value.unwrap_or(&Value::Null)),
	}
}

fn patch_style<H: Host>(host: &H, node: &H::Node, value: Option<&Value<H>>, old_value: Option<&Value<H>>) -> Result<(), Error> {
	match (value, old_value) {
		(Some(Value::Style(style)), Some(Value::Style(old_style))) => {
			for (name, old) in old_style.iter() {
				if !style.contains_key(name) {
					trace!("Unsetting style {:?} (was {:?})", name, old);
					host.set_style(node, name, None)?;
				}
			}
			for (name, new) in style.iter() {
				if old_style.get(name) != Some(new) {
					host.set_style(node, name, Some(new.as_str()))?;
				}
			}
			Ok(())
		}
		(Some(Value::Style(style)), old_value) => {
			if old_value.is_some() {
				host.remove_attribute(node, None, "style")?;
			}
			for (name, new) in style.iter() {
				host.set_style(node, name, Some(new.as_str()))?;
			}
			Ok(())
		}
		(value, Some(Value::Style(old_style))) => {
			for name in old_style.keys() {
				host.set_style(node, name, None)?;
			}
			set_style_attribute(host, node, value)
		}
		(value, _) => set_style_attribute(host, node, value),
	}
}

fn set_style_attribute<H: Host>(host: &H, node: &H::Node, value: Option<&Value<H>>) -> Result<(), Error> {
	match value.and_then(Value::to_attribute) {
		Some(style) => host.set_attribute(node, None, "style", &style),
		None => host.remove_attribute(node, None, "style"),
	}
}

fn patch_class<H: Host>(host: &H, node: &H::Node, value: Option<&Value<H>>, old_value: Option<&Value<H>>, controlled: bool) -> Result<(), Error> {
	if controlled {
		let new_tokens = value.map(class_tokens).unwrap_or_default();
		let old_tokens = old_value.map(class_tokens).unwrap_or_default();
		for removed in old_tokens.iter().filter(|token| !new_tokens.contains(*token)) {
			host.remove_class(node, removed)?;
		}
		for added in new_tokens.iter().filter(|token| !old_tokens.contains(*token)) {
			host.add_class(node, added)?;
		}
		Ok(())
	} else {
		match value {
			Some(value) => host.set_class_name(node, &class_tokens(value).join(" ")),
			None => host.remove_attribute(node, None, "class"),
		}
	}
}

fn patch_listener<H: Host>(host: &H, node: &H::Node, name: &str, value: Option<&Value<H>>, old_value: Option<&Value<H>>) -> Result<(), Error> {
	let event = match listener_event_name(name) {
		Some(event) => event,
		None => return Ok(()),
	};

	if let Some(Value::Listener(old)) = old_value {
		host.remove_listener(node, &event, old)?;
	}
	match value {
		Some(Value::Listener(listener)) => host.add_listener(node, &event, listener),
		Some(Value::Null) | None => Ok(()),
		Some(other) => {
			warn!("Expected a listener for {:?} but found {:?}. Ignoring.", name, other);
			Ok(())
		}
	}
}

fn patch_attribute<H: Host>(host: &H, node: &H::Node, name: &str, value: Option<&Value<H>>) -> Result<(), Error> {
	let namespace = attribute_namespace(name);
	match value.and_then(Value::to_attribute) {
		Some(attribute) => host.set_attribute(node, namespace, name, &attribute),
		None => host.remove_attribute(node, namespace, name),
	}
}
