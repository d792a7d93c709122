//! Bounded-history edit session over a [`Scene`].
//!
//! All mutation goes through [`EditSession::transaction`], which commits
//! exactly one history snapshot no matter how many scene changes the
//! closure makes. Undo can never step past the initial snapshot.

use std::collections::VecDeque;

use crate::scene::{Color, Scene, SceneError};

/// Maximum retained snapshots, initial state included.
pub const HISTORY_LIMIT: usize = 50;

/// Prebuilt cover layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    Blank,
    Business,
    Academic,
    Creative,
}

pub struct EditSession {
    scene: Scene,
    history: VecDeque<String>,
    redo: Vec<String>,
}

impl EditSession {
    pub fn new(scene: Scene) -> Result<Self, SceneError> {
        let initial = scene.to_json()?;
        let mut history = VecDeque::with_capacity(HISTORY_LIMIT);
        history.push_back(initial);
        Ok(Self { scene, history, redo: Vec::new() })
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn can_undo(&self) -> bool {
        self.history.len() > 1
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Applies `mutate` to the scene and commits one snapshot.
    ///
    /// A new snapshot invalidates any redo trail.
    pub fn transaction<F>(&mut self, mutate: F) -> Result<(), SceneError>
    where
        F: FnOnce(&mut Scene),
    {
        mutate(&mut self.scene);
        let snapshot = self.scene.to_json()?;
        self.history.push_back(snapshot);
        if self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.redo.clear();
        Ok(())
    }

    /// Steps back one snapshot. Returns `false` at the initial state.
    pub fn undo(&mut self) -> Result<bool, SceneError> {
        if self.history.len() <= 1 {
            return Ok(false);
        }
        if let Some(current) = self.history.pop_back() {
            self.redo.push(current);
        }
        if let Some(previous) = self.history.back() {
            self.scene = Scene::from_json(previous)?;
        }
        Ok(true)
    }

    /// Reapplies the most recently undone snapshot, if any.
    pub fn redo(&mut self) -> Result<bool, SceneError> {
        let Some(snapshot) = self.redo.pop() else {
            return Ok(false);
        };
        self.scene = Scene::from_json(&snapshot)?;
        self.history.push_back(snapshot);
        if self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }
        Ok(true)
    }

    /// Replaces the scene content with a prebuilt layout as a single
    /// undoable step.
    pub fn apply_template(&mut self, template: Template) -> Result<(), SceneError> {
        self.transaction(|scene| {
            scene.clear_objects();
            scene.background = Color::WHITE;
            let w = scene.width as f32;
            let h = scene.height as f32;
            match template {
                Template::Blank => {}
                Template::Business => {
                    scene.add_rect(0.0, 0.0, w, h * 0.18, Color::rgb(29, 78, 216));
                    scene.add_text(
                        "Business Report",
                        w * 0.08,
                        h * 0.06,
                        h * 0.05,
                        Color::WHITE,
                    );
                    scene.add_text(
                        "Annual Overview",
                        w * 0.08,
                        h * 0.28,
                        h * 0.03,
                        Color::rgb(55, 65, 81),
                    );
                }
                Template::Academic => {
                    scene.add_text(
                        "Research Paper",
                        w * 0.15,
                        h * 0.25,
                        h * 0.045,
                        Color::BLACK,
                    );
                    scene.add_rect(w * 0.15, h * 0.33, w * 0.7, 2.0, Color::BLACK);
                    scene.add_text(
                        "Author Name",
                        w * 0.15,
                        h * 0.38,
                        h * 0.025,
                        Color::rgb(55, 65, 81),
                    );
                }
                Template::Creative => {
                    scene.add_ellipse(
                        w * 0.55,
                        -h * 0.1,
                        w * 0.45,
                        h * 0.3,
                        Color::rgb(245, 158, 11),
                    );
                    scene.add_rect(0.0, h * 0.75, w, h * 0.08, Color::rgb(236, 72, 153));
                    scene.add_text(
                        "Creative Portfolio",
                        w * 0.1,
                        h * 0.45,
                        h * 0.06,
                        Color::rgb(124, 58, 237),
                    );
                }
            }
        })
    }
}
