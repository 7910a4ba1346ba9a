use serde::Serialize;

/// One active flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlowFrame {
    pub flow_id: i64,
    /// Discovery that launched the flow; `None` for branch flows
    pub origin: Option<i64>,
}

/// Active flows, most recent last, plus a lookup cursor counted from the
/// top. Moving the cursor never changes the stack; `commit` drops every
/// frame above it.
#[derive(Debug, Clone, Default)]
pub struct FlowStack {
    frames: Vec<FlowFrame>,
    index_from_last: usize,
}

impl FlowStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: FlowFrame) {
        self.frames.push(frame);
        self.index_from_last = 0;
    }

    pub fn pop(&mut self) -> Option<FlowFrame> {
        self.index_from_last = 0;
        self.frames.pop()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.index_from_last = 0;
    }

    pub fn top(&self) -> Option<&FlowFrame> {
        self.frames.last()
    }

    /// The flow the session started with.
    pub fn root(&self) -> Option<&FlowFrame> {
        self.frames.first()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn contains(&self, flow_id: i64) -> bool {
        self.frames.iter().any(|f| f.flow_id == flow_id)
    }

    /// Flow ids, bottom first.
    pub fn flow_ids(&self) -> Vec<i64> {
        self.frames.iter().map(|f| f.flow_id).collect()
    }

    pub fn index_from_last(&self) -> usize {
        self.index_from_last
    }

    /// Frame under the cursor.
    pub fn current(&self) -> Option<&FlowFrame> {
        let len = self.frames.len();
        if self.index_from_last >= len {
            return None;
        }
        self.frames.get(len - 1 - self.index_from_last)
    }

    /// Move the cursor one flow down. `None` once the stack is exhausted.
    pub fn look_at_parent(&mut self) -> Option<&FlowFrame> {
        if self.index_from_last < self.frames.len() {
            self.index_from_last += 1;
        }
        self.current()
    }

    /// Make the frame under the cursor the top of the stack.
    pub fn commit(&mut self) {
        let keep = self.frames.len().saturating_sub(self.index_from_last);
        self.frames.truncate(keep);
        self.index_from_last = 0;
    }

    pub fn reset_lookup(&mut self) {
        self.index_from_last = 0;
    }
}
