use crate::message::Message;
use crate::store::{MessageStore, StoreChange};

pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Keeps a contiguous suffix of the store materialised for display.
///
/// New messages reset the window to the newest batch and request a scroll to
/// the bottom. Reaching the top of the viewport pages one batch further back
/// without moving the viewport.
#[derive(Debug, Clone)]
pub struct WindowedRenderer {
    batch_size: usize,
    start_index: usize,
    seen_revision: Option<u64>,
    pending_scroll_to_bottom: bool,
}

impl Default for WindowedRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl WindowedRenderer {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            start_index: 0,
            seen_revision: None,
            pending_scroll_to_bottom: false,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn start_index(&self) -> usize {
        self.start_index
    }

    /// Recomputes the window from the store, showing the newest batch.
    pub fn on_store_changed(&mut self, store: &MessageStore) {
        self.start_index = store.len().saturating_sub(self.batch_size);
        self.seen_revision = Some(store.revision());
        if store.last_change() == Some(StoreChange::Appended) {
            self.pending_scroll_to_bottom = true;
        }
    }

    /// Applies [`Self::on_store_changed`] only when the store moved on since
    /// the last call. Returns whether the window was recomputed.
    pub fn sync(&mut self, store: &MessageStore) -> bool {
        if self.seen_revision == Some(store.revision()) {
            return false;
        }
        self.on_store_changed(store);
        true
    }

    /// Reveals the previous batch of older messages. No-op at the start of
    /// the log. Never requests a scroll.
    pub fn on_scroll_to_top(&mut self) -> bool {
        if self.start_index == 0 {
            return false;
        }
        self.start_index = self.start_index.saturating_sub(self.batch_size);
        tracing::debug!(start_index = self.start_index, "revealed older messages");
        true
    }

    pub fn has_older(&self) -> bool {
        self.start_index > 0
    }

    pub fn visible<'a>(&self, store: &'a MessageStore) -> Vec<&'a Message> {
        store.tail_from(self.start_index).collect()
    }

    pub fn visible_len(&self, store: &MessageStore) -> usize {
        store.len().saturating_sub(self.start_index)
    }

    /// Returns true once per append-driven change: the viewport should jump to
    /// the bottom.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.pending_scroll_to_bottom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(n: usize) -> MessageStore {
        let mut store = MessageStore::with_capacity(100);
        store.append_many((0..n).map(|i| Message::user(i.to_string())));
        store
    }

    fn visible_texts(window: &WindowedRenderer, store: &MessageStore) -> Vec<String> {
        window
            .visible(store)
            .into_iter()
            .map(|m| m.text().to_string())
            .collect()
    }

    #[test]
    fn shows_the_newest_batch_after_append() {
        for n in [0, 1, 19, 20, 21, 45] {
            let store = store_with(n);
            let mut window = WindowedRenderer::new(20);
            window.on_store_changed(&store);

            let expected: Vec<String> = (n.saturating_sub(20)..n).map(|i| i.to_string()).collect();
            assert_eq!(visible_texts(&window, &store), expected, "n = {n}");
        }
    }

    #[test]
    fn scroll_to_top_extends_the_slice_backwards() {
        let store = store_with(45);
        let mut window = WindowedRenderer::new(20);
        window.on_store_changed(&store);
        assert!(window.take_scroll_request());

        let before = visible_texts(&window, &store);
        assert!(window.on_scroll_to_top());
        let after = visible_texts(&window, &store);

        assert_eq!(window.start_index(), 5);
        assert!(after.len() > before.len());
        assert!(after.ends_with(&before));
        assert!(!window.take_scroll_request());

        assert!(window.on_scroll_to_top());
        assert_eq!(window.start_index(), 0);
        assert_eq!(window.visible_len(&store), 45);
    }

    #[test]
    fn scroll_to_top_is_a_no_op_at_the_start() {
        let store = store_with(5);
        let mut window = WindowedRenderer::new(20);
        window.on_store_changed(&store);

        assert!(!window.on_scroll_to_top());
        assert_eq!(window.start_index(), 0);
        assert!(!window.has_older());
    }

    #[test]
    fn new_append_resets_a_paged_window() {
        let mut store = store_with(60);
        let mut window = WindowedRenderer::new(20);
        window.sync(&store);
        window.on_scroll_to_top();
        window.on_scroll_to_top();
        assert_eq!(window.start_index(), 0);

        store.append(Message::bot("new"));
        assert!(window.sync(&store));

        assert_eq!(window.start_index(), 41);
        assert_eq!(window.visible(&store).last().unwrap().text(), "new");
        assert!(window.take_scroll_request());
        assert!(!window.sync(&store));
    }

    #[test]
    fn clearing_does_not_request_a_scroll() {
        let mut store = store_with(3);
        let mut window = WindowedRenderer::default();
        window.sync(&store);
        window.take_scroll_request();

        store.clear();
        window.sync(&store);

        assert!(window.visible(&store).is_empty());
        assert!(!window.take_scroll_request());
    }
}
