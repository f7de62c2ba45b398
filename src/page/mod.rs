//! Host page seam.
//!
//! The content script never touches a real DOM directly. It reads the page
//! through [`HostPage`], which a browser binding or the in-memory
//! [`SnapshotPage`] implements.

pub mod dom;
pub mod snapshot;

pub use dom::{PageElement, Selector};
pub use snapshot::SnapshotPage;

use tokio::sync::{mpsc, watch};

/// One batch of DOM mutations under an observed element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationBatch {
    pub records: usize,
}

/// Receiving end of a mutation observer. Dropping it disconnects the observer.
pub type MutationWatch = mpsc::UnboundedReceiver<MutationBatch>;

/// Small status overlay the content script draws on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Connected,
    Recording,
}

impl Indicator {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Connected => "🟢 Meet Enhancer Connected",
            Self::Recording => "🔴 Recording",
        }
    }
}

pub trait HostPage: Send + Sync {
    /// Full current URL of the page.
    fn location(&self) -> String;

    /// Elements matching `selector`, in document order.
    fn query_all(&self, selector: &Selector) -> Vec<PageElement>;

    /// Watch the first element matching `target` for subtree changes.
    /// `None` when no such element exists yet.
    fn observe(&self, target: &Selector) -> Option<MutationWatch>;

    /// Notified whenever the URL changes without a full page load.
    fn location_changes(&self) -> watch::Receiver<String>;

    fn show_indicator(&self, indicator: Option<Indicator>);

    fn show_notice(&self, message: &str);

    fn query(&self, selector: &Selector) -> Option<PageElement> {
        self.query_all(selector).into_iter().next()
    }
}
