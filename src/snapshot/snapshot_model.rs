use serde::{Deserialize, Serialize};

// ============================================================================
// Geometry
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Half-open containment: the right and bottom edges are outside.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.y >= self.y
            && point.x < self.x + self.width
            && point.y < self.y + self.height
    }
}

// ============================================================================
// Elements
// ============================================================================

/// Index of an element inside one snapshot. Only meaningful for the
/// snapshot it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementHandle(pub usize);

/// One normalized on-screen native element.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDescriptor {
    #[serde(default)]
    pub type_tag: String,
    #[serde(default)]
    pub accessibility_id: Option<String>,
    #[serde(default)]
    pub accessibility_label: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub frame: Rect,
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Screen/controller the element belongs to
    #[serde(default)]
    pub screen: Option<String>,
    /// Opaque back-reference understood by the platform layer
    #[serde(default)]
    pub reference: u64,
    #[serde(default)]
    pub parent: Option<ElementHandle>,
    #[serde(default)]
    pub children: Vec<ElementHandle>,
}

impl ElementDescriptor {
    pub fn new(type_tag: &str) -> Self {
        Self {
            type_tag: type_tag.to_string(),
            visible: true,
            ..Default::default()
        }
    }

    pub fn with_accessibility_id(mut self, id: &str) -> Self {
        self.accessibility_id = Some(id.to_string());
        self
    }

    pub fn with_accessibility_label(mut self, label: &str) -> Self {
        self.accessibility_label = Some(label.to_string());
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_string());
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }

    pub fn with_frame(mut self, frame: Rect) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_reference(mut self, reference: u64) -> Self {
        self.reference = reference;
        self
    }

    pub fn on_screen(mut self, screen: &str) -> Self {
        self.screen = Some(screen.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

// ============================================================================
// Embedded web content
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerRef(pub String);

impl std::fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedContainer {
    pub id: ContainerRef,
    #[serde(default)]
    pub frame: Rect,
    #[serde(default)]
    pub screen: Option<String>,
}

// ============================================================================
// Snapshot
// ============================================================================

/// Point-in-time view of the application's UI. Elements form a tree through
/// `parent`/`children` handles; guidance overlays are never included.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub active_screen: Option<String>,
    #[serde(default)]
    pub elements: Vec<ElementDescriptor>,
    #[serde(default)]
    pub containers: Vec<EmbeddedContainer>,
}

impl Snapshot {
    pub fn element(&self, handle: ElementHandle) -> Option<&ElementDescriptor> {
        self.elements.get(handle.0)
    }

    pub fn handles(&self) -> impl Iterator<Item = ElementHandle> + '_ {
        (0..self.elements.len()).map(ElementHandle)
    }

    pub fn parent_of(&self, handle: ElementHandle) -> Option<ElementHandle> {
        self.element(handle).and_then(|e| e.parent)
    }

    pub fn child_at(&self, handle: ElementHandle, index: usize) -> Option<ElementHandle> {
        self.element(handle)
            .and_then(|e| e.children.get(index).copied())
    }

    /// Whether `screen` is the active screen of this snapshot.
    pub fn is_active_screen(&self, screen: &str) -> bool {
        self.active_screen.as_deref() == Some(screen)
    }
}

/// What part of the UI a provider should walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeHint {
    /// Every window
    All,
    /// Only the key window's active screen
    ActiveScreen,
}

/// Produces normalized snapshots of the live UI.
pub trait SnapshotProvider {
    fn snapshot(&mut self, scope: ScopeHint) -> Snapshot;
}

fn default_visible() -> bool {
    true
}
