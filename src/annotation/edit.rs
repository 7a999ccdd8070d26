//! Inline text editing, one state machine per segment.
//!
//! Several segments may be in `Editing` at once; each commits independently.

use std::collections::HashMap;

use super::types::SegmentId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EditState {
    #[default]
    Viewing,
    Editing { draft: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditIntent {
    /// Begin editing, seeding the draft with the segment's current text.
    Start { current_text: String },
    /// Replace the draft while editing.
    Change(String),
    Save,
}

/// What the store must do after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditEffect {
    None,
    Commit { text: String },
}

/// Pure transition function for a single segment.
pub fn reduce(state: &EditState, intent: EditIntent) -> (EditState, EditEffect) {
    match (state, intent) {
        (EditState::Viewing, EditIntent::Start { current_text }) => (
            EditState::Editing {
                draft: current_text,
            },
            EditEffect::None,
        ),
        // Re-entering edit mode keeps the draft in progress.
        (EditState::Editing { .. }, EditIntent::Start { .. }) => (state.clone(), EditEffect::None),
        (EditState::Editing { .. }, EditIntent::Change(draft)) => {
            (EditState::Editing { draft }, EditEffect::None)
        }
        (EditState::Editing { draft }, EditIntent::Save) => (
            EditState::Viewing,
            EditEffect::Commit {
                text: draft.trim().to_string(),
            },
        ),
        (EditState::Viewing, EditIntent::Change(_) | EditIntent::Save) => {
            (EditState::Viewing, EditEffect::None)
        }
    }
}

/// Edit states for every segment that is not simply being viewed.
#[derive(Debug, Default)]
pub struct EditSessions {
    editing: HashMap<SegmentId, EditState>,
}

impl EditSessions {
    pub fn state(&self, id: SegmentId) -> EditState {
        self.editing.get(&id).cloned().unwrap_or_default()
    }

    pub fn is_editing(&self, id: SegmentId) -> bool {
        matches!(self.editing.get(&id), Some(EditState::Editing { .. }))
    }

    pub fn apply(&mut self, id: SegmentId, intent: EditIntent) -> EditEffect {
        let (next, effect) = reduce(&self.state(id), intent);
        match next {
            EditState::Viewing => {
                self.editing.remove(&id);
            }
            editing => {
                self.editing.insert(id, editing);
            }
        }
        effect
    }

    pub fn editing_ids(&self) -> Vec<SegmentId> {
        let mut ids: Vec<_> = self.editing.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Drop sessions whose segment no longer exists.
    pub fn retain_ids(&mut self, mut exists: impl FnMut(SegmentId) -> bool) {
        self.editing.retain(|id, _| exists(*id));
    }

    pub fn clear(&mut self) {
        self.editing.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_then_save_commits_trimmed_draft() {
        let (state, effect) = reduce(
            &EditState::Viewing,
            EditIntent::Start {
                current_text: " Patient has arrived.".into(),
            },
        );
        assert_eq!(effect, EditEffect::None);
        let (state, _) = reduce(&state, EditIntent::Change("  Patient arrived.  ".into()));
        let (state, effect) = reduce(&state, EditIntent::Save);
        assert_eq!(state, EditState::Viewing);
        assert_eq!(
            effect,
            EditEffect::Commit {
                text: "Patient arrived.".into()
            }
        );
    }

    #[test]
    fn restarting_an_edit_is_a_no_op() {
        let editing = EditState::Editing {
            draft: "half typed".into(),
        };
        let (state, effect) = reduce(
            &editing,
            EditIntent::Start {
                current_text: "original".into(),
            },
        );
        assert_eq!(state, editing);
        assert_eq!(effect, EditEffect::None);
    }

    #[test]
    fn save_while_viewing_does_nothing() {
        let (state, effect) = reduce(&EditState::Viewing, EditIntent::Save);
        assert_eq!(state, EditState::Viewing);
        assert_eq!(effect, EditEffect::None);
    }

    #[test]
    fn sessions_track_segments_independently() {
        let mut sessions = EditSessions::default();
        sessions.apply(1, EditIntent::Start { current_text: "a".into() });
        sessions.apply(2, EditIntent::Start { current_text: "b".into() });
        assert_eq!(sessions.editing_ids(), vec![1, 2]);

        let effect = sessions.apply(1, EditIntent::Save);
        assert_eq!(effect, EditEffect::Commit { text: "a".into() });
        assert!(!sessions.is_editing(1));
        assert!(sessions.is_editing(2));

        sessions.retain_ids(|id| id != 2);
        assert!(sessions.editing_ids().is_empty());
    }
}
