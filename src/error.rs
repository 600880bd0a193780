use thiserror::Error;

/// Everything that can go wrong while mounting, reconciling or hosting components.
///
/// All variants except [`Error::Platform`] are caller precondition violations and are not recovered from locally.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
	#[error("invalid component name: the name must not be empty")]
	EmptyComponentName,

	#[error("component with the name {0:?} already defined")]
	AlreadyDefined(String),

	/// The platform refuses the name, e.g. because it contains no hyphen.
	#[error("invalid component name {0:?}: custom element names must contain a hyphen")]
	InvalidComponentName(String),

	#[error("invalid render callback: `update` was called before `render`")]
	UpdateBeforeRender,

	/// An old node handed to the reconciler was never mounted.
	#[error("old node <{0}> exists, but no rendered node is attached")]
	NotMounted(String),

	#[error("depth limit ({0}) reached")]
	DepthLimitReached(usize),

	/// A state slot was written after its component instance went away.
	#[error("the component instance owning this state was dropped")]
	ComponentDropped,

	/// A call into the live rendering surface failed.
	#[error("platform error: {0}")]
	Platform(String),
}
