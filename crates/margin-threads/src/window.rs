//! Deciding which top-level threads to render
//!
//! Only threads in or near the viewport are rendered. The rest are replaced
//! by spacers whose heights come from the last measurement of each thread,
//! or an estimate for threads never measured.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use tracing::trace;

use margin_core::Identity;

use crate::config::WindowConfig;
use crate::error::{ThreadError, ThreadResult};
use crate::thread::Thread;

/// The slice of top-level threads to render
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadWindow {
    /// Indices into the root's children
    pub visible: Range<usize>,
    /// Height of the threads before the visible range
    pub offscreen_above: f64,
    /// Height of the threads after the visible range
    pub offscreen_below: f64,
}

impl ThreadWindow {
    /// The visible threads of `root`
    pub fn threads<'a>(&self, root: &'a Thread) -> &'a [Thread] {
        let end = self.visible.end.min(root.children.len());
        let start = self.visible.start.min(end);
        &root.children[start..end]
    }
}

struct Memo {
    root: Arc<Thread>,
    scroll_top: f64,
    viewport_height: f64,
    heights_revision: u64,
    window: Arc<ThreadWindow>,
}

/// Window calculation with per-thread height tracking
pub struct WindowCalculator {
    config: WindowConfig,
    heights: HashMap<Identity, f64>,
    /// Bumped whenever a stored height changes
    heights_revision: u64,
    memo: Option<Memo>,
}

impl WindowCalculator {
    pub fn new(config: WindowConfig) -> Self {
        Self {
            config,
            heights: HashMap::new(),
            heights_revision: 0,
            memo: None,
        }
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Record a measured height. Returns whether the stored height changed.
    pub fn set_thread_height(&mut self, id: Identity, height: f64) -> ThreadResult<bool> {
        if height.is_nan() || height <= 0.0 {
            return Err(ThreadError::InvalidHeight { id, height });
        }
        if self.heights.get(&id) == Some(&height) {
            return Ok(false);
        }
        trace!(thread = %id, height, "Thread height changed");
        self.heights.insert(id, height);
        self.heights_revision += 1;
        Ok(true)
    }

    /// Last measured height, or the default estimate
    pub fn height(&self, id: Option<&Identity>) -> f64 {
        id.and_then(|id| self.heights.get(id))
            .copied()
            .unwrap_or(self.config.default_height)
    }

    /// Distance from the top of the list to the thread `id`; 0 when the
    /// thread is not a top-level thread of `root`
    pub fn y_offset_of(&self, root: &Thread, id: &Identity) -> f64 {
        let Some(position) = root.children.iter().position(|t| t.id.as_ref() == Some(id)) else {
            return 0.0;
        };
        root.children[..position]
            .iter()
            .map(|thread| self.height(thread.id.as_ref()))
            .sum()
    }

    /// Window for the given scroll position and viewport height.
    ///
    /// Returns the previous result when neither the thread list, the
    /// scroll position, the viewport nor any height has changed.
    pub fn calculate(&mut self, root: &Arc<Thread>, scroll_top: f64, viewport_height: f64) -> Arc<ThreadWindow> {
        if let Some(memo) = &self.memo {
            if Arc::ptr_eq(&memo.root, root)
                && memo.scroll_top == scroll_top
                && memo.viewport_height == viewport_height
                && memo.heights_revision == self.heights_revision
            {
                return Arc::clone(&memo.window);
            }
        }

        let window = Arc::new(self.compute(root, scroll_top, viewport_height));
        self.memo = Some(Memo {
            root: Arc::clone(root),
            scroll_top,
            viewport_height,
            heights_revision: self.heights_revision,
            window: Arc::clone(&window),
        });
        window
    }

    fn compute(&self, root: &Thread, scroll_top: f64, viewport_height: f64) -> ThreadWindow {
        let above_limit = scroll_top - self.config.margin_above;
        let below_limit = scroll_top + viewport_height + self.config.margin_below;

        let mut window = ThreadWindow::default();
        let mut first_visible = None;
        let mut end_visible = 0;
        let mut used = 0.0;

        for (idx, thread) in root.children.iter().enumerate() {
            let height = self.height(thread.id.as_ref());
            if used + height < above_limit {
                window.offscreen_above += height;
            } else if used < below_limit {
                first_visible.get_or_insert(idx);
                end_visible = idx + 1;
            } else {
                window.offscreen_below += height;
            }
            used += height;
        }

        let start = first_visible.unwrap_or(end_visible);
        window.visible = start..end_visible.max(start);
        window
    }
}

impl Default for WindowCalculator {
    fn default() -> Self {
        Self::new(WindowConfig::default())
    }
}
