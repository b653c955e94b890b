use serde::{Deserialize, Serialize};

/// A named synthesis of related codes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    /// Identifier within the session (not stable across split/combine/add)
    pub theme_id: String,
    pub name: String,
    /// Roughly 25-word description
    pub description: String,
    /// Associated code ids, in order
    pub code_ids: Vec<usize>,
}

/// Theme content proposed by the model, before an id is assigned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeDraft {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub code_ids: Vec<usize>,
}

/// The working set of themes for a session
///
/// Owns id allocation so ids are never reused within a session, even after
/// the theme holding an id has been deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeSet {
    themes: Vec<Theme>,
    next_id: u32,
}

impl ThemeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from drafts, assigning ids in order
    pub fn from_drafts(drafts: impl IntoIterator<Item = ThemeDraft>) -> Self {
        let mut set = Self::new();
        for draft in drafts {
            set.push(draft);
        }
        set
    }

    /// Turn a draft into a theme with a fresh id (not inserted)
    pub fn create(&mut self, draft: ThemeDraft) -> Theme {
        let theme_id = format!("theme_{}", self.next_id);
        self.next_id += 1;
        Theme {
            theme_id,
            name: draft.name,
            description: draft.description,
            code_ids: draft.code_ids,
        }
    }

    /// Append a draft at the end of the set, returning its id
    pub fn push(&mut self, draft: ThemeDraft) -> String {
        let theme = self.create(draft);
        let id = theme.theme_id.clone();
        self.themes.push(theme);
        id
    }

    /// Insert a theme at `index` (clamped to the end)
    pub fn insert(&mut self, index: usize, theme: Theme) {
        let index = index.min(self.themes.len());
        self.themes.insert(index, theme);
    }

    pub fn position(&self, theme_id: &str) -> Option<usize> {
        self.themes.iter().position(|t| t.theme_id == theme_id)
    }

    pub fn contains(&self, theme_id: &str) -> bool {
        self.position(theme_id).is_some()
    }

    pub fn get(&self, theme_id: &str) -> Option<&Theme> {
        self.themes.iter().find(|t| t.theme_id == theme_id)
    }

    pub fn get_mut(&mut self, theme_id: &str) -> Option<&mut Theme> {
        self.themes.iter_mut().find(|t| t.theme_id == theme_id)
    }

    pub fn remove(&mut self, theme_id: &str) -> Option<Theme> {
        let index = self.position(theme_id)?;
        Some(self.themes.remove(index))
    }

    pub fn themes(&self) -> &[Theme] {
        &self.themes
    }

    pub fn iter(&self) -> impl Iterator<Item = &Theme> {
        self.themes.iter()
    }

    pub fn len(&self) -> usize {
        self.themes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.themes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str) -> ThemeDraft {
        ThemeDraft {
            name: name.to_string(),
            description: format!("{} description", name),
            code_ids: vec![],
        }
    }

    #[test]
    fn test_ids_are_not_reused_after_removal() {
        let mut set = ThemeSet::from_drafts(vec![draft("a"), draft("b")]);
        assert_eq!(set.themes()[0].theme_id, "theme_0");
        assert_eq!(set.themes()[1].theme_id, "theme_1");

        set.remove("theme_1");
        let id = set.push(draft("c"));
        assert_eq!(id, "theme_2");
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_insert_clamps_to_end() {
        let mut set = ThemeSet::from_drafts(vec![draft("a")]);
        let theme = set.create(draft("b"));
        set.insert(10, theme);
        assert_eq!(set.themes()[1].name, "b");
        assert_eq!(set.position("theme_1"), Some(1));
    }
}
