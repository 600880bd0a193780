#![doc(html_root_url = "https://docs.rs/legot/0.1.0")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! A minimal component UI library.
//!
//! - [`Node`] trees describe what should be on screen.
//! - A [`Differ`] mounts them ([`Differ::mount`]) and patches the live result to match the next tree ([`Differ::reconcile`]).
//! - [`Component`] hosts own state slots and re-render themselves whenever one is written.
//! - A [`Registry`] defines components under hyphenated tag names and mounts the application root.
//!
//! The live surface is abstracted by [`Dom`]: [`MemoryDom`](`memory::MemoryDom`) for headless use,
//! and `web::WebDom` for the browser (feature `web`).

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod component;
mod create;
pub mod diff;
pub mod dom;
mod error;
pub mod memory;
pub mod node;
pub mod props;
pub mod registry;
#[cfg(feature = "web")]
pub mod web;

pub use component::{Component, MountEffect, State};
pub use diff::Differ;
pub use dom::Dom;
pub use error::Error;
pub use node::{Element, Node, Text};
pub use props::{Props, Value};
pub use registry::{ComponentOptions, Registry, ShadowRootMode};
