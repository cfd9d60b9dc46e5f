#![doc(html_root_url = "https://docs.rs/arbor-dom/0.1.0")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod busy;
mod children;
pub mod component;
mod error;
pub mod host;
pub mod list_diff;
mod patch;
pub mod patch_dom;
pub mod props;
mod rc_hash_map;
mod renderer;
mod vnode;

pub use component::{Component, ComponentDef, ComponentMetadata, RenderFn};
pub use error::{BusyError, Error, ReadyError};
pub use props::{Key, Listener, ListenerOptions, NodeRef, Props, Value};
pub use renderer::{DiffOptions, Renderer};
pub use vnode::{flatten, h, Child, NodeKind, VNode};
