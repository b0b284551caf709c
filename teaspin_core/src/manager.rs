use crate::item::Category;

/// Where the item manager overlay currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManagerView {
    #[default]
    Closed,
    CategorySelect,
    CategoryDetail(Category),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerAction {
    AddToLibrary,
    RemoveFromLibrary,
    AddToActive,
    RemoveFromActive,
}

impl ManagerView {
    pub fn is_open(self) -> bool {
        self != ManagerView::Closed
    }

    /// Category in view, if a detail page is showing.
    pub fn category(self) -> Option<Category> {
        match self {
            ManagerView::CategoryDetail(category) => Some(category),
            _ => None,
        }
    }

    // Transitions return false and leave the view alone when not allowed.

    pub fn open(&mut self) -> bool {
        self.go(ManagerView::Closed, ManagerView::CategorySelect)
    }

    pub fn pick(&mut self, category: Category) -> bool {
        self.go(ManagerView::CategorySelect, ManagerView::CategoryDetail(category))
    }

    pub fn back(&mut self) -> bool {
        if matches!(self, ManagerView::CategoryDetail(_)) {
            *self = ManagerView::CategorySelect;
            return true;
        }
        false
    }

    pub fn close(&mut self) -> bool {
        let was_open = self.is_open();
        *self = ManagerView::Closed;
        was_open
    }

    fn go(&mut self, from: ManagerView, to: ManagerView) -> bool {
        if *self != from {
            return false;
        }
        *self = to;
        true
    }

    pub fn permits(self, action: ManagerAction) -> bool {
        match (self, action) {
            (ManagerView::Closed, _) => false,
            (ManagerView::CategorySelect, ManagerAction::RemoveFromActive) => true,
            (ManagerView::CategorySelect, _) => false,
            (ManagerView::CategoryDetail(_), _) => true,
        }
    }
}
