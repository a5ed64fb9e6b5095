//! Background recalculation of the thread window
//!
//! Scroll, resize and measurement events arrive in bursts. The tracker
//! applies them as they come but only recalculates once input has been
//! quiet for the configured debounce, then publishes the new window on a
//! `watch` channel.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use margin_core::Identity;

use crate::config::WindowConfig;
use crate::error::{ThreadError, ThreadResult};
use crate::thread::Thread;
use crate::window::{ThreadWindow, WindowCalculator};

/// Something that may move the window
#[derive(Debug, Clone)]
pub enum WindowInput {
    Scroll(f64),
    Resize(f64),
    ThreadHeight { id: Identity, height: f64 },
    Threads(Arc<Thread>),
}

/// Sending side of a running [`WindowTracker`]
#[derive(Debug, Clone)]
pub struct WindowHandle {
    input_tx: mpsc::UnboundedSender<WindowInput>,
    window_rx: watch::Receiver<Arc<ThreadWindow>>,
}

impl WindowHandle {
    fn send(&self, input: WindowInput) -> ThreadResult<()> {
        self.input_tx
            .send(input)
            .map_err(|_| ThreadError::TrackerStopped)
    }

    pub fn scroll_to(&self, scroll_top: f64) -> ThreadResult<()> {
        self.send(WindowInput::Scroll(scroll_top))
    }

    pub fn resize(&self, viewport_height: f64) -> ThreadResult<()> {
        self.send(WindowInput::Resize(viewport_height))
    }

    pub fn set_thread_height(&self, id: Identity, height: f64) -> ThreadResult<()> {
        self.send(WindowInput::ThreadHeight { id, height })
    }

    pub fn set_threads(&self, root: Arc<Thread>) -> ThreadResult<()> {
        self.send(WindowInput::Threads(root))
    }

    /// Latest published window
    pub fn window(&self) -> Arc<ThreadWindow> {
        Arc::clone(&self.window_rx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ThreadWindow>> {
        self.window_rx.clone()
    }
}

/// Debounced window recalculation task
pub struct WindowTracker {
    calculator: WindowCalculator,
    root: Arc<Thread>,
    scroll_top: f64,
    viewport_height: f64,
    input_rx: mpsc::UnboundedReceiver<WindowInput>,
    window_tx: watch::Sender<Arc<ThreadWindow>>,
}

impl WindowTracker {
    /// Create a tracker and compute the initial window
    pub fn new(config: WindowConfig, root: Arc<Thread>, viewport_height: f64) -> (Self, WindowHandle) {
        let mut calculator = WindowCalculator::new(config);
        let initial = calculator.calculate(&root, 0.0, viewport_height);
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (window_tx, window_rx) = watch::channel(initial);

        let tracker = Self {
            calculator,
            root,
            scroll_top: 0.0,
            viewport_height,
            input_rx,
            window_tx,
        };
        (tracker, WindowHandle { input_tx, window_rx })
    }

    pub fn spawn(self, shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run(shutdown_rx).await;
        })
    }

    async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("Window tracker started");
        let debounce = self.calculator.config().debounce;
        let mut deadline: Option<Instant> = None;

        loop {
            let wake = deadline.unwrap_or_else(Instant::now);
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Window tracker shutting down");
                    break;
                }
                input = self.input_rx.recv() => match input {
                    Some(input) => {
                        if self.apply(input) {
                            deadline = Some(Instant::now() + debounce);
                        }
                    }
                    None => break,
                },
                _ = sleep_until(wake), if deadline.is_some() => {
                    deadline = None;
                    self.publish();
                }
            }
        }
    }

    /// Returns whether the window may have moved
    fn apply(&mut self, input: WindowInput) -> bool {
        match input {
            WindowInput::Scroll(scroll_top) => {
                self.scroll_top = scroll_top;
                true
            }
            WindowInput::Resize(viewport_height) => {
                self.viewport_height = viewport_height;
                true
            }
            WindowInput::ThreadHeight { id, height } => {
                match self.calculator.set_thread_height(id, height) {
                    Ok(changed) => changed,
                    Err(e) => {
                        warn!(error = %e, "Ignoring thread measurement");
                        false
                    }
                }
            }
            WindowInput::Threads(root) => {
                if Arc::ptr_eq(&self.root, &root) {
                    return false;
                }
                self.root = root;
                true
            }
        }
    }

    fn publish(&mut self) {
        let window = self
            .calculator
            .calculate(&self.root, self.scroll_top, self.viewport_height);
        let changed = self.window_tx.send_if_modified(|current| {
            if **current == *window {
                return false;
            }
            *current = Arc::clone(&window);
            true
        });
        if changed {
            debug!(
                start = window.visible.start,
                end = window.visible.end,
                above = window.offscreen_above,
                below = window.offscreen_below,
                "Thread window moved"
            );
        }
    }
}
