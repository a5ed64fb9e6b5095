//! Connected content frames

use margin_core::{Frame, FrameId};

/// Frames in connection order; at most one entry per frame id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameList {
    frames: Vec<Frame>,
}

impl FrameList {
    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, id: Option<&FrameId>) -> Option<&Frame> {
        self.frames.iter().find(|f| f.id.as_ref() == id)
    }

    /// Register a frame, replacing any entry with the same id
    pub fn connect(&mut self, frame: Frame) {
        match self.frames.iter_mut().find(|f| f.id == frame.id) {
            Some(existing) => *existing = frame,
            None => self.frames.push(frame),
        }
    }

    pub fn destroy(&mut self, id: Option<&FrameId>) -> Option<Frame> {
        let index = self.frames.iter().position(|f| f.id.as_ref() == id)?;
        Some(self.frames.remove(index))
    }

    /// Mark annotation fetching done (or not) for frames showing `uri`
    pub fn update_fetch_status(&mut self, uri: &str, complete: bool) -> bool {
        let mut changed = false;
        for frame in self.frames.iter_mut().filter(|f| !f.uri.is_empty() && f.uri == uri) {
            if frame.is_annotation_fetch_complete != complete {
                frame.is_annotation_fetch_complete = complete;
                changed = true;
            }
        }
        changed
    }

    /// The host frame, which is the one without an id
    pub fn main_frame(&self) -> Option<&Frame> {
        self.frames.iter().find(|f| f.is_main())
    }

    /// Main frame if there is one, otherwise the first connected frame
    pub fn default_content_frame(&self) -> Option<&Frame> {
        self.main_frame().or_else(|| self.frames.first())
    }

    /// Frame showing exactly `uri`, falling back to the default content frame
    pub fn frame_for_uri(&self, uri: Option<&str>) -> Option<&Frame> {
        uri.and_then(|uri| self.frames.iter().find(|f| f.uri == uri))
            .or_else(|| self.default_content_frame())
    }

    /// True when frames exist and every one has finished fetching
    pub fn all_fetch_complete(&self) -> bool {
        !self.frames.is_empty() && self.frames.iter().all(|f| f.is_annotation_fetch_complete)
    }

    /// Every URI annotations should be searched for, across frames
    pub fn search_uris(&self) -> Vec<String> {
        let mut uris: Vec<String> = Vec::new();
        for uri in self.frames.iter().flat_map(|f| f.search_uris.iter()) {
            if !uris.contains(uri) {
                uris.push(uri.clone());
            }
        }
        uris
    }
}
