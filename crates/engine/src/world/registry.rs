use thiserror::Error;
use tracing::{debug, warn};

use super::{Character, Vec2};

const FRESH_ID_PREFIX: &str = "char_";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("character id '{0}' already exists")]
    DuplicateId(String),
    #[error("character id '{0}' not found")]
    NotFound(String),
    #[error("no active character: the roster is empty")]
    EmptyRoster,
}

/// Owns every character plus the active-selection pointer.
///
/// Invariants: ids are unique; `active_id` is `Some` iff the roster is non-empty and then
/// always names a member.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CharacterRegistry {
    characters: Vec<Character>,
    active_id: Option<String>,
}

impl CharacterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &mut self,
        id: impl Into<String>,
        position: Vec2,
        color: impl Into<String>,
        speed: f32,
    ) -> Result<&Character, RegistryError> {
        let id = id.into();
        if self.contains(&id) {
            return Err(RegistryError::DuplicateId(id));
        }
        self.insert(Character::new(id, position, color, speed))
    }

    /// Creates a character under the first unused `char_N` id (N starting at 1).
    pub fn create_with_fresh_id(
        &mut self,
        position: Vec2,
        color: impl Into<String>,
        speed: f32,
    ) -> &Character {
        let id = self.next_fresh_id();
        let index = self.characters.len();
        self.characters.push(Character::new(id, position, color, speed));
        self.elect_if_unset();
        &self.characters[index]
    }

    /// Inserts a fully built character (used when rehydrating a saved roster).
    pub fn insert(&mut self, character: Character) -> Result<&Character, RegistryError> {
        if self.contains(&character.id) {
            return Err(RegistryError::DuplicateId(character.id));
        }
        let index = self.characters.len();
        self.characters.push(character);
        self.elect_if_unset();
        Ok(&self.characters[index])
    }

    /// Removes the character, dropping its queue and in-flight motion with it.
    pub fn delete(&mut self, id: &str) -> Result<Character, RegistryError> {
        let Some(index) = self.index_of(id) else {
            warn!(character_id = id, "delete_unknown_character");
            return Err(RegistryError::NotFound(id.to_string()));
        };
        let removed = self.characters.remove(index);
        if self.active_id.as_deref() == Some(id) {
            self.active_id = self.characters.first().map(|character| character.id.clone());
            debug!(
                deleted = id,
                elected = self.active_id.as_deref().unwrap_or("<none>"),
                "active_reelected"
            );
        }
        Ok(removed)
    }

    pub fn set_active(&mut self, id: &str) -> Result<(), RegistryError> {
        if !self.contains(id) {
            warn!(character_id = id, "set_active_unknown_character");
            return Err(RegistryError::NotFound(id.to_string()));
        }
        self.active_id = Some(id.to_string());
        Ok(())
    }

    /// Replaces the active pointer with a recorded id, falling back to the first character
    /// when the id is absent or stale.
    pub fn restore_active(&mut self, recorded: Option<&str>) {
        self.active_id = match recorded {
            Some(id) if self.contains(id) => Some(id.to_string()),
            _ => {
                if let Some(id) = recorded {
                    warn!(character_id = id, "recorded_active_missing");
                }
                self.characters.first().map(|character| character.id.clone())
            }
        };
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active(&self) -> Option<&Character> {
        let id = self.active_id.as_deref()?;
        self.get(id)
    }

    pub fn active_mut(&mut self) -> Option<&mut Character> {
        let id = self.active_id.clone()?;
        self.get_mut(&id)
    }

    pub fn get(&self, id: &str) -> Option<&Character> {
        self.characters.iter().find(|character| character.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Character> {
        self.characters
            .iter_mut()
            .find(|character| character.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index_of(id).is_some()
    }

    pub fn list(&self) -> &[Character] {
        &self.characters
    }

    pub(crate) fn list_mut(&mut self) -> &mut [Character] {
        &mut self.characters
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    pub fn next_fresh_id(&self) -> String {
        let mut index = 1u32;
        loop {
            let candidate = format!("{FRESH_ID_PREFIX}{index}");
            if !self.contains(&candidate) {
                return candidate;
            }
            index = index.saturating_add(1);
        }
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.characters
            .iter()
            .position(|character| character.id == id)
    }

    fn elect_if_unset(&mut self) {
        if self.active_id.is_none() {
            self.active_id = self.characters.first().map(|character| character.id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Action, Direction};

    fn registry_with(ids: &[&str]) -> CharacterRegistry {
        let mut registry = CharacterRegistry::new();
        for (offset, id) in ids.iter().enumerate() {
            registry
                .create(*id, Vec2::new(offset as f32, 0.0), "#fff", 4.8)
                .expect("create");
        }
        registry
    }

    #[test]
    fn first_created_character_becomes_active() {
        let registry = registry_with(&["a", "b"]);
        assert_eq!(registry.active_id(), Some("a"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn create_rejects_duplicate_id_and_keeps_roster() {
        let mut registry = registry_with(&["a"]);
        let error = registry
            .create("a", Vec2::default(), "#000", 1.0)
            .expect_err("duplicate");
        assert_eq!(error, RegistryError::DuplicateId("a".to_string()));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("a").expect("a").color, "#fff");
    }

    #[test]
    fn fresh_ids_fill_the_first_gap() {
        let mut registry = registry_with(&["char_1", "char_3"]);
        let created = registry.create_with_fresh_id(Vec2::default(), "#0f0", 4.8);
        assert_eq!(created.id, "char_2");
        let next = registry.create_with_fresh_id(Vec2::default(), "#0f0", 4.8);
        assert_eq!(next.id, "char_4");
    }

    #[test]
    fn fresh_id_on_empty_registry_is_char_1_and_active() {
        let mut registry = CharacterRegistry::new();
        let id = registry
            .create_with_fresh_id(Vec2::default(), "#0f0", 4.8)
            .id
            .clone();
        assert_eq!(id, "char_1");
        assert_eq!(registry.active_id(), Some("char_1"));
    }

    #[test]
    fn deleting_active_elects_first_survivor() {
        let mut registry = registry_with(&["a", "b", "c"]);
        registry.set_active("b").expect("set active");

        registry.delete("b").expect("delete");

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.active_id(), Some("a"));
    }

    #[test]
    fn deleting_inactive_keeps_selection() {
        let mut registry = registry_with(&["a", "b", "c"]);
        registry.set_active("c").expect("set active");

        registry.delete("a").expect("delete");

        assert_eq!(registry.active_id(), Some("c"));
        let ids = registry
            .list()
            .iter()
            .map(|character| character.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn deleting_last_character_leaves_no_selection() {
        let mut registry = registry_with(&["a"]);
        registry.delete("a").expect("delete");
        assert!(registry.is_empty());
        assert_eq!(registry.active_id(), None);
        assert!(registry.active().is_none());
    }

    #[test]
    fn delete_unknown_is_not_found_no_op() {
        let mut registry = registry_with(&["a"]);
        assert_eq!(
            registry.delete("ghost"),
            Err(RegistryError::NotFound("ghost".to_string()))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn delete_returns_character_with_its_pending_work() {
        let mut registry = registry_with(&["a", "b"]);
        registry
            .get_mut("a")
            .expect("a")
            .enqueue(Action::step(Direction::Up));

        let removed = registry.delete("a").expect("delete");

        assert_eq!(removed.queue_len(), 1);
        assert!(registry.get("a").is_none());
    }

    #[test]
    fn set_active_unknown_leaves_pointer_unchanged() {
        let mut registry = registry_with(&["a", "b"]);
        registry.set_active("b").expect("set active");
        assert!(registry.set_active("zzz").is_err());
        assert_eq!(registry.active_id(), Some("b"));
    }

    #[test]
    fn restore_active_falls_back_to_first_or_none() {
        let mut registry = registry_with(&["a", "b"]);
        registry.restore_active(Some("b"));
        assert_eq!(registry.active_id(), Some("b"));
        registry.restore_active(Some("missing"));
        assert_eq!(registry.active_id(), Some("a"));
        registry.restore_active(None);
        assert_eq!(registry.active_id(), Some("a"));

        let mut empty = CharacterRegistry::new();
        empty.restore_active(Some("a"));
        assert_eq!(empty.active_id(), None);
    }
}
