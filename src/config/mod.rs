//! Configuration model, inheritance merge, loading and hand-off selection.

pub mod handoff;
pub mod merge;
pub mod model;
pub mod resolver;

pub use handoff::{HandoffError, Selection};
pub use merge::{INHERIT_KEY, merge, merge_configuration};
pub use model::{
    BuildConfig, Configuration, DEFAULT_PRODUCT_NAME, PostBuildTask, Target, ToolRole, Toolchain,
    is_private,
};
pub use resolver::{ConfigResolver, Processing, SubscriptionId, product_file, resolve_document};
