use crate::snapshot::snapshot_model::{
    ContainerRef, ElementDescriptor, ElementHandle, EmbeddedContainer, Rect, Snapshot,
};

/// Builds a snapshot tree while keeping parent/child handles consistent.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    snapshot: Snapshot,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn screen(mut self, screen: &str) -> Self {
        self.snapshot.active_screen = Some(screen.to_string());
        self
    }

    /// Add an element, optionally as the last child of `parent`.
    pub fn push(&mut self, mut element: ElementDescriptor, parent: Option<ElementHandle>) -> ElementHandle {
        let handle = ElementHandle(self.snapshot.elements.len());
        element.parent = parent;
        element.children.clear();
        if element.reference == 0 {
            element.reference = handle.0 as u64 + 1;
        }
        self.snapshot.elements.push(element);

        if let Some(parent) = parent {
            if let Some(p) = self.snapshot.elements.get_mut(parent.0) {
                p.children.push(handle);
            }
        }
        handle
    }

    pub fn container(&mut self, id: &str, frame: Rect) -> ContainerRef {
        let id = ContainerRef(id.to_string());
        self.snapshot.containers.push(EmbeddedContainer {
            id: id.clone(),
            frame,
            screen: self.snapshot.active_screen.clone(),
        });
        id
    }

    pub fn build(self) -> Snapshot {
        self.snapshot
    }
}
