//! In-memory host page.

use std::sync::{Mutex, MutexGuard};

use tokio::sync::{mpsc, watch};
use tracing::debug;

use super::{HostPage, Indicator, MutationBatch, MutationWatch, PageElement, Selector};

struct PageState {
    document: PageElement,
    observers: Vec<(Selector, mpsc::UnboundedSender<MutationBatch>)>,
    indicator: Option<Indicator>,
    notices: Vec<String>,
}

/// A page whose document and URL are replaced wholesale by the caller.
///
/// Every replacement counts as one mutation batch for each observer whose
/// target element is still present.
pub struct SnapshotPage {
    state: Mutex<PageState>,
    location: watch::Sender<String>,
}

impl SnapshotPage {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_document(url, PageElement::new("body"))
    }

    pub fn with_document(url: impl Into<String>, body: PageElement) -> Self {
        let (location, _) = watch::channel(url.into());
        Self {
            state: Mutex::new(PageState {
                document: document_root(body),
                observers: Vec::new(),
                indicator: None,
                notices: Vec::new(),
            }),
            location,
        }
    }

    /// Navigate without reloading, as a single-page app does.
    pub fn set_location(&self, url: impl Into<String>) {
        let url = url.into();
        debug!("Page location -> {}", url);
        self.location.send_replace(url);
    }

    pub fn replace_body(&self, body: PageElement) {
        let mut state = self.lock();
        state.document = document_root(body);
        Self::notify(&mut state);
    }

    pub fn indicator(&self) -> Option<Indicator> {
        self.lock().indicator
    }

    pub fn notices(&self) -> Vec<String> {
        self.lock().notices.clone()
    }

    /// Observers that have not been dropped yet.
    pub fn observer_count(&self) -> usize {
        let mut state = self.lock();
        state.observers.retain(|(_, tx)| !tx.is_closed());
        state.observers.len()
    }

    fn notify(state: &mut PageState) {
        let PageState {
            document,
            observers,
            ..
        } = state;
        observers.retain(|(target, tx)| {
            if tx.is_closed() {
                return false;
            }
            if document.query(target).is_some() {
                let _ = tx.send(MutationBatch { records: 1 });
            }
            true
        });
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn document_root(body: PageElement) -> PageElement {
    PageElement::new("html").child(body)
}

impl HostPage for SnapshotPage {
    fn location(&self) -> String {
        self.location.borrow().clone()
    }

    fn query_all(&self, selector: &Selector) -> Vec<PageElement> {
        self.lock()
            .document
            .query_all(selector)
            .into_iter()
            .cloned()
            .collect()
    }

    fn observe(&self, target: &Selector) -> Option<MutationWatch> {
        let mut state = self.lock();
        state.document.query(target)?;

        let (tx, rx) = mpsc::unbounded_channel();
        state.observers.push((target.clone(), tx));
        Some(rx)
    }

    fn location_changes(&self) -> watch::Receiver<String> {
        self.location.subscribe()
    }

    fn show_indicator(&self, indicator: Option<Indicator>) {
        self.lock().indicator = indicator;
    }

    fn show_notice(&self, message: &str) {
        self.lock().notices.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container() -> PageElement {
        PageElement::new("body").child(PageElement::new("div").attr("data-participants-container", ""))
    }

    #[test]
    fn test_observe_requires_target() {
        let page = SnapshotPage::new("https://meet.google.com/abc-defg-hij");
        assert!(page
            .observe(&Selector::attr("data-participants-container"))
            .is_none());
    }

    #[tokio::test]
    async fn test_replace_body_notifies_observers() {
        let page = SnapshotPage::with_document("https://meet.google.com/abc-defg-hij", container());
        let mut watch = page
            .observe(&Selector::attr("data-participants-container"))
            .unwrap();

        page.replace_body(container());

        let batch = watch.recv().await.unwrap();
        assert_eq!(batch.records, 1);
    }

    #[test]
    fn test_dropped_observer_is_pruned() {
        let page = SnapshotPage::with_document("https://meet.google.com/abc-defg-hij", container());
        let watch = page
            .observe(&Selector::attr("data-participants-container"))
            .unwrap();
        assert_eq!(page.observer_count(), 1);

        drop(watch);
        assert_eq!(page.observer_count(), 0);
    }

    #[tokio::test]
    async fn test_set_location_wakes_subscribers() {
        let page = SnapshotPage::new("https://meet.google.com/");
        let mut changes = page.location_changes();

        page.set_location("https://meet.google.com/abc-defg-hij");

        changes.changed().await.unwrap();
        assert_eq!(*changes.borrow(), "https://meet.google.com/abc-defg-hij");
        assert_eq!(page.location(), "https://meet.google.com/abc-defg-hij");
    }

    #[test]
    fn test_indicator_and_notices_are_recorded() {
        let page = SnapshotPage::new("https://meet.google.com/");
        page.show_indicator(Some(Indicator::Recording));
        page.show_notice("Microphone permission denied");

        assert_eq!(page.indicator(), Some(Indicator::Recording));
        assert_eq!(page.notices(), vec!["Microphone permission denied".to_string()]);
    }
}
