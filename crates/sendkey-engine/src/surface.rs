//! The seam between the engine and whatever renders the composer.

use std::fmt;

use async_trait::async_trait;
use keychord::KeyEvent;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::Result;

/// Stable identity of one editor node within a document context.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct EditorId(pub u64);

impl fmt::Display for EditorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "editor#{}", self.0)
    }
}

/// Strategies for locating an editor's send control, in probe priority order.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ControlSelector {
    /// A dedicated test id on the control.
    TestId,
    /// The control's accessibility label.
    AriaLabel,
    /// Structural position relative to the editor node.
    Structural,
}

impl ControlSelector {
    /// Probe order: most specific selector first.
    pub const PROBE_ORDER: [Self; 3] = [Self::TestId, Self::AriaLabel, Self::Structural];

    /// Stable lowercase name, used in logs and driver output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TestId => "test-id",
            Self::AriaLabel => "aria-label",
            Self::Structural => "structural",
        }
    }
}

/// A send control the host located for one (editor, selector) probe.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SendControl {
    /// The editor this control belongs to.
    pub editor: EditorId,
    /// The selector that located it.
    pub selector: ControlSelector,
    /// Whether the control is currently activatable.
    pub enabled: bool,
}

/// One batch of document mutations, as reported by the host's feed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MutationBatch {
    /// Editor nodes that appeared.
    pub added: Vec<EditorId>,
    /// Editor nodes that disappeared.
    pub removed: Vec<EditorId>,
}

impl MutationBatch {
    /// True when the batch carries no changes.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Host surface contract.
///
/// The engine addresses editors and controls only through this trait; it
/// never assumes anything about how the host renders or delivers events.
#[async_trait]
pub trait EditorHost: Send + Sync {
    /// Editor nodes currently present in the document.
    async fn editors(&self) -> Vec<EditorId>;

    /// Locate the send control for `editor` using one selector strategy.
    /// Returns `None` when the strategy finds nothing.
    async fn query_control(&self, editor: EditorId, selector: ControlSelector)
    -> Option<SendControl>;

    /// Activate a previously located control.
    async fn click(&self, control: SendControl) -> Result<()>;

    /// Deliver a synthetic key event to `editor`, as if the user pressed it.
    async fn dispatch_key(&self, editor: EditorId, event: KeyEvent) -> Result<()>;

    /// Subscribe to document mutations. Every call returns a fresh feed
    /// carrying batches that occur after the call; the current document
    /// population is observed via [`EditorHost::editors`].
    fn mutations(&self) -> UnboundedReceiver<MutationBatch>;
}
