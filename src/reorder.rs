//! Drag and drop over the enabled/disabled lists, independent of any UI.
//!
//! The lists are edited optimistically while the pointer moves; only the
//! state at drop time is handed back as a [`Commit`].

use crate::load_order::DisplayItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Container {
    Enabled,
    Disabled,
}

impl Container {
    pub fn other(self) -> Self {
        match self {
            Container::Enabled => Container::Disabled,
            Container::Disabled => Container::Enabled,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Container::Enabled => "Enabled",
            Container::Disabled => "Disabled",
        }
    }
}

/// Working copy of the two sequences. Every id lives in exactly one of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lists {
    pub enabled: Vec<DisplayItem>,
    pub disabled: Vec<DisplayItem>,
}

impl Lists {
    pub fn new(enabled: Vec<DisplayItem>, disabled: Vec<DisplayItem>) -> Self {
        Self { enabled, disabled }
    }

    pub fn get(&self, container: Container) -> &[DisplayItem] {
        match container {
            Container::Enabled => &self.enabled,
            Container::Disabled => &self.disabled,
        }
    }

    fn get_mut(&mut self, container: Container) -> &mut Vec<DisplayItem> {
        match container {
            Container::Enabled => &mut self.enabled,
            Container::Disabled => &mut self.disabled,
        }
    }

    pub fn position(&self, container: Container, id: &str) -> Option<usize> {
        self.get(container).iter().position(|item| item.id == id)
    }

    pub fn locate(&self, id: &str) -> Option<(Container, usize)> {
        [Container::Enabled, Container::Disabled]
            .into_iter()
            .find_map(|container| self.position(container, id).map(|idx| (container, idx)))
    }

    pub fn len(&self) -> usize {
        self.enabled.len() + self.disabled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty() && self.disabled.is_empty()
    }

    fn take(&mut self, container: Container, id: &str) -> Option<DisplayItem> {
        let idx = self.position(container, id)?;
        Some(self.get_mut(container).remove(idx))
    }
}

/// Vertical extent of the hovered row and where the pointer is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoverPoint {
    pub pointer_y: f32,
    pub top: f32,
    pub bottom: f32,
}

impl HoverPoint {
    /// Moving down must reach the row's midpoint, moving up must not pass
    /// below it.
    fn allows_move(&self, from: usize, to: usize) -> bool {
        let middle = (self.bottom - self.top) / 2.0;
        let offset = self.pointer_y - self.top;
        !((from < to && offset < middle) || (from > to && offset > middle))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drag {
    pub id: String,
    pub index: usize,
    pub container: Container,
    pub changed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging(Drag),
}

/// Final sequences at the end of a gesture that changed something.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub enabled: Vec<DisplayItem>,
    pub disabled: Vec<DisplayItem>,
}

impl Commit {
    fn from_lists(lists: &Lists) -> Self {
        Self {
            enabled: lists.enabled.clone(),
            disabled: lists.disabled.clone(),
        }
    }
}

impl DragState {
    pub fn is_dragging(&self) -> bool {
        matches!(self, DragState::Dragging(_))
    }

    pub fn drag(&self) -> Option<&Drag> {
        match self {
            DragState::Dragging(drag) => Some(drag),
            DragState::Idle => None,
        }
    }

    /// Picks up the item at `index`. The item stays where it is until a
    /// hover moves it.
    pub fn begin(&mut self, lists: &Lists, container: Container, index: usize) -> bool {
        let Some(item) = lists.get(container).get(index) else {
            return false;
        };
        *self = DragState::Dragging(Drag {
            id: item.id.clone(),
            index,
            container,
            changed: false,
        });
        true
    }

    /// Pointer over row `index` of `container`.
    pub fn hover_item(
        &mut self,
        lists: &mut Lists,
        container: Container,
        index: usize,
        point: HoverPoint,
    ) -> bool {
        let DragState::Dragging(drag) = self else {
            return false;
        };
        if drag.container != container {
            return self.hover_container(lists, container);
        }
        if drag.index == index || index >= lists.get(container).len() {
            return false;
        }
        if !point.allows_move(drag.index, index) {
            return false;
        }
        let Some(item) = lists.take(container, &drag.id) else {
            return false;
        };
        let list = lists.get_mut(container);
        let target = index.min(list.len());
        list.insert(target, item);
        drag.index = target;
        drag.changed = true;
        true
    }

    /// Pointer entered `container` from the other list: the item moves to
    /// the top of it.
    pub fn hover_container(&mut self, lists: &mut Lists, container: Container) -> bool {
        let DragState::Dragging(drag) = self else {
            return false;
        };
        if drag.container == container {
            return false;
        }
        // Not in the source list means it was already taken out.
        let item = lists
            .take(drag.container, &drag.id)
            .or_else(|| lists.take(container, &drag.id));
        let Some(item) = item else {
            *self = DragState::Idle;
            return false;
        };
        lists.get_mut(container).insert(0, item);
        drag.container = container;
        drag.index = 0;
        drag.changed = true;
        true
    }

    /// Ends the gesture. Returns the sequences only if the gesture moved
    /// something.
    pub fn drop(&mut self, lists: &Lists) -> Option<Commit> {
        let state = std::mem::take(self);
        match state {
            DragState::Dragging(drag) if drag.changed => Some(Commit::from_lists(lists)),
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        *self = DragState::Idle;
    }
}

/// Moves the item at `from` to `to` inside one list.
pub fn move_within(lists: &mut Lists, container: Container, from: usize, to: usize) -> bool {
    let list = lists.get_mut(container);
    if from == to || from >= list.len() {
        return false;
    }
    let item = list.remove(from);
    let target = to.min(list.len());
    list.insert(target, item);
    true
}

/// Moves `id` into `container` at `index`, wherever it currently is.
pub fn transfer(lists: &mut Lists, id: &str, container: Container, index: usize) -> bool {
    let Some((current, current_idx)) = lists.locate(id) else {
        return false;
    };
    if current == container {
        return move_within(lists, container, current_idx, index);
    }
    let Some(item) = lists.take(current, id) else {
        return false;
    };
    let list = lists.get_mut(container);
    let target = index.min(list.len());
    list.insert(target, item);
    true
}
