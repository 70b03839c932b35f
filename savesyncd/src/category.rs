use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Saves,
    States,
    StatePreviews,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Saves, Category::States, Category::StatePreviews];

    /// Folder name in the app-private space.
    pub fn remote_name(self) -> &'static str {
        match self {
            Category::Saves => "saves",
            Category::States => "states",
            Category::StatePreviews => "state-previews",
        }
    }

    /// Categories for one pass, in sync order. Saves always come first.
    pub fn requested(include_auxiliary: bool) -> &'static [Category] {
        if include_auxiliary {
            &Self::ALL
        } else {
            &Self::ALL[..1]
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRoots {
    pub saves: PathBuf,
    pub states: PathBuf,
    pub state_previews: PathBuf,
}

impl CategoryRoots {
    pub fn under(base: &Path) -> Self {
        Self {
            saves: base.join(Category::Saves.remote_name()),
            states: base.join(Category::States.remote_name()),
            state_previews: base.join(Category::StatePreviews.remote_name()),
        }
    }

    pub fn root(&self, category: Category) -> &Path {
        match category {
            Category::Saves => &self.saves,
            Category::States => &self.states,
            Category::StatePreviews => &self.state_previews,
        }
    }
}
