#![allow(dead_code)]

use legot::{memory::MemoryDom, Element, Node, Value};
use tracing_subscriber::EnvFilter;

pub type El = Element<MemoryDom>;
pub type N = Node<MemoryDom>;
pub type V = Value<MemoryDom>;

pub fn init_logging() {
	let _ = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).with_test_writer().try_init();
}

pub fn text(value: &str) -> N {
	N::text(value)
}
