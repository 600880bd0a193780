//! Prop values and the naming convention shared between tree producers and the engines.
//!
//! Keys matching `on` followed by an ASCII uppercase letter are event bindings.
//! Every other key is an attribute, serialized through [`Value::to_attribute`].

use crate::dom::{Dom, Handler};
use core::fmt::{self, Debug, Formatter};
use hashbrown::HashMap;
use std::rc::Rc;

/// Unordered prop mapping of an element.
pub type Props<D> = HashMap<String, Value<D>>;

/// A single prop value.
pub enum Value<D: Dom> {
	Str(String),
	Number(f64),
	Bool(bool),
	Handler(Handler<D>),
}

impl<D: Dom> Value<D> {
	pub fn handler(handler: impl Fn(&D::Event, &D::Node) + 'static) -> Self {
		Self::Handler(Rc::new(handler))
	}

	#[must_use]
	pub fn as_handler(&self) -> Option<&Handler<D>> {
		match self {
			Self::Handler(handler) => Some(handler),
			_ => None,
		}
	}

	/// Coerces the value into the platform's attribute representation.
	///
	/// Handlers have none and yield [`None`].
	#[must_use]
	pub fn to_attribute(&self) -> Option<String> {
		match self {
			Self::Str(value) => Some(value.clone()),
			Self::Number(value) => Some(number_to_string(*value)),
			Self::Bool(value) => Some(value.to_string()),
			Self::Handler(_) => None,
		}
	}

	/// Loose (coercing) comparison.
	///
	/// Strings compare as strings, any other primitive pairing compares numerically,
	/// and handlers are only equal to the very same handler.
	#[must_use]
	pub fn loosely_eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Handler(a), Self::Handler(b)) => Rc::as_ptr(a).cast::<()>() == Rc::as_ptr(b).cast::<()>(),
			(Self::Handler(_), _) | (_, Self::Handler(_)) => false,
			(Self::Str(a), Self::Str(b)) => a == b,
			(a, b) => a.to_number() == b.to_number(),
		}
	}

	fn to_number(&self) -> f64 {
		match self {
			Self::Number(value) => *value,
			Self::Bool(value) => f64::from(u8::from(*value)),
			Self::Str(value) => string_to_number(value),
			Self::Handler(_) => f64::NAN,
		}
	}
}

impl<D: Dom> Clone for Value<D> {
	fn clone(&self) -> Self {
		match self {
			Self::Str(value) => Self::Str(value.clone()),
			Self::Number(value) => Self::Number(*value),
			Self::Bool(value) => Self::Bool(*value),
			Self::Handler(handler) => Self::Handler(Rc::clone(handler)),
		}
	}
}

impl<D: Dom> Debug for Value<D> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Self::Str(value) => f.debug_tuple("Str").field(value).finish(),
			Self::Number(value) => f.debug_tuple("Number").field(value).finish(),
			Self::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
			Self::Handler(handler) => f.debug_tuple("Handler").field(&Rc::as_ptr(handler).cast::<()>()).finish(),
		}
	}
}

impl<D: Dom> From<&str> for Value<D> {
	fn from(value: &str) -> Self {
		Self::Str(value.to_owned())
	}
}

impl<D: Dom> From<String> for Value<D> {
	fn from(value: String) -> Self {
		Self::Str(value)
	}
}

impl<D: Dom> From<bool> for Value<D> {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl<D: Dom> From<f64> for Value<D> {
	fn from(value: f64) -> Self {
		Self::Number(value)
	}
}

macro_rules! number_values {
	($($int:ty),*$(,)?) => {$(
		impl<D: Dom> From<$int> for Value<D> {
			fn from(value: $int) -> Self {
				Self::Number(f64::from(value))
			}
		}
	)*};
}
number_values!(i8, i16, i32, u8, u16, u32, f32);

/// Whether `key` names an event binding (`on` + ASCII uppercase letter).
#[must_use]
pub fn is_event_prop(key: &str) -> bool {
	key.strip_prefix("on").and_then(|rest| rest.chars().next()).map_or(false, |c| c.is_ascii_uppercase())
}

/// Derives the runtime event name of an event prop: `onClick` → `click`.
///
/// Only the first character after `on` is lowercased.
#[must_use]
pub fn event_name(key: &str) -> Option<String> {
	if !is_event_prop(key) {
		return None;
	}
	let rest = &key[2..];
	let mut chars = rest.chars();
	let first = chars.next()?;
	let mut name = String::with_capacity(rest.len());
	name.push(first.to_ascii_lowercase());
	name.push_str(chars.as_str());
	Some(name)
}

/// Whether `tag_name` is a component tag.
#[must_use]
pub fn is_component_tag(tag_name: &str) -> bool {
	tag_name.contains('-')
}

fn number_to_string(value: f64) -> String {
	if value.is_nan() {
		"NaN".to_owned()
	} else if value.is_infinite() {
		let sign = if value > 0. { "" } else { "-" };
		format!("{}Infinity", sign)
	} else if value == 0. {
		"0".to_owned()
	} else {
		value.to_string()
	}
}

fn string_to_number(value: &str) -> f64 {
	let value = value.trim();
	match value {
		"" => 0.,
		"Infinity" | "+Infinity" => f64::INFINITY,
		"-Infinity" => f64::NEG_INFINITY,
		_ if value.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
		_ => value.parse().unwrap_or(f64::NAN),
	}
}
