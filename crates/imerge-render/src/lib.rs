//! # imerge-render
//!
//! The compositor. Resolves every image reference to a self-contained data
//! URI, decodes it, sizes the output surface from the background, draws each
//! overlay as it finishes loading, and encodes the result once all overlay
//! loads have settled.

pub mod compositor;
pub mod image_loader;
pub mod resolver;
pub mod session;
pub mod settle;

pub use compositor::Compositor;
pub use resolver::{HttpResolver, ResourceResolver, StaticResolver};
pub use session::{EventSink, MergeEvent, MergeReport, MergeSession, OverlayOutcome};
pub use settle::{SettleBarrier, Settled};
