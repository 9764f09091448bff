//! Repetition counting over per-frame predictions.
//!
//! A classifier (outside this crate) labels every frame with an exercise and
//! a rep stage. Single-frame predictions are noisy, so both are smoothed with
//! bounded label buffers before a rep is counted:
//!
//! - the exercise must be the majority of the recent exercise predictions;
//! - the stage must be unanimous over the recent stage predictions;
//! - a rep is counted on every confirmed transition into the `start` stage.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Default number of exercise predictions the majority vote runs over.
pub const EXERCISE_BUFFER_SIZE: usize = 120;

/// Default number of stage predictions that must agree.
pub const STAGE_BUFFER_SIZE: usize = 5;

/// Stage label that starts a repetition.
pub const START_STAGE: &str = "start";

/// Bounded buffer of recent labels, most recent first.
#[derive(Debug, Clone)]
pub struct LabelBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone + Eq + Hash> LabelBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Push a label, evicting the oldest one when full.
    pub fn push(&mut self, item: T) {
        if self.items.len() >= self.capacity {
            self.items.pop_back();
        }
        self.items.push_front(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.front()
    }

    /// The label with the highest count. Ties go to the label seen most
    /// recently.
    pub fn most_frequent(&self) -> Option<&T> {
        let mut counts: HashMap<&T, usize> = HashMap::new();
        for item in &self.items {
            *counts.entry(item).or_insert(0) += 1;
        }

        // Most recent first, so the first label reaching the top count wins.
        let mut best: Option<(&T, usize)> = None;
        for item in &self.items {
            let count = counts[item];
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((item, count));
            }
        }
        best.map(|(item, _)| item)
    }

    /// Whether every buffered label equals `item`. False when empty.
    pub fn is_only(&self, item: &T) -> bool {
        !self.items.is_empty() && self.items.iter().all(|i| i == item)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// The counter's view after a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepState {
    /// Confirmed exercise, empty until one is confirmed
    pub exercise: String,
    /// Confirmed stage, empty until one is confirmed
    pub stage: String,
    pub reps: u32,
}

/// Counts repetitions from per-frame (exercise, stage) predictions.
#[derive(Debug, Clone)]
pub struct RepCounter {
    exercises: LabelBuffer<String>,
    stages: LabelBuffer<String>,
    current_exercise: String,
    current_stage: String,
    reps: u32,
}

impl RepCounter {
    pub fn new(exercise_window: usize, stage_window: usize) -> Self {
        Self {
            exercises: LabelBuffer::new(exercise_window),
            stages: LabelBuffer::new(stage_window),
            current_exercise: String::new(),
            current_stage: String::new(),
            reps: 0,
        }
    }

    /// Feed one frame's predictions and get the updated state.
    pub fn process(&mut self, exercise: &str, stage: &str) -> RepState {
        let exercise = exercise.to_string();
        let stage = stage.to_string();

        self.exercises.push(exercise.clone());
        if self.exercises.most_frequent() == Some(&exercise) {
            self.stages.push(stage.clone());

            if self.current_exercise == exercise {
                if self.stages.is_only(&stage) && self.current_stage != stage {
                    if stage == START_STAGE {
                        self.reps += 1;
                    }
                    self.current_stage = stage;
                }
            } else {
                self.reps = 0;
                self.current_exercise = exercise;
            }
        }

        self.state()
    }

    pub fn state(&self) -> RepState {
        RepState {
            exercise: self.current_exercise.clone(),
            stage: self.current_stage.clone(),
            reps: self.reps,
        }
    }

    pub fn reps(&self) -> u32 {
        self.reps
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.exercises.capacity(), self.stages.capacity());
    }
}

impl Default for RepCounter {
    fn default() -> Self {
        Self::new(EXERCISE_BUFFER_SIZE, STAGE_BUFFER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(counter: &mut RepCounter, exercise: &str, stage: &str, frames: usize) -> RepState {
        let mut state = counter.state();
        for _ in 0..frames {
            state = counter.process(exercise, stage);
        }
        state
    }

    #[test]
    fn test_label_buffer_eviction() {
        let mut buffer = LabelBuffer::new(3);
        for label in ["a", "b", "c", "d"] {
            buffer.push(label);
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.latest(), Some(&"d"));
        assert_eq!(buffer.most_frequent(), Some(&"d"));
    }

    #[test]
    fn test_most_frequent_and_ties() {
        let mut buffer = LabelBuffer::new(10);
        assert_eq!(buffer.most_frequent(), None);

        for label in ["a", "b", "a", "b"] {
            buffer.push(label);
        }
        // Tied two to two, "b" was pushed last.
        assert_eq!(buffer.most_frequent(), Some(&"b"));

        buffer.push("a");
        assert_eq!(buffer.most_frequent(), Some(&"a"));
    }

    #[test]
    fn test_is_only() {
        let mut buffer = LabelBuffer::new(2);
        assert!(!buffer.is_only(&"start"));
        buffer.push("start");
        buffer.push("start");
        assert!(buffer.is_only(&"start"));
        buffer.push("end");
        assert!(!buffer.is_only(&"start"));
    }

    #[test]
    fn test_counts_reps_on_start_transitions() {
        let mut counter = RepCounter::new(10, 3);

        // First frame confirms the exercise; stages are confirmed afterwards.
        let state = feed(&mut counter, "squat", "end", 3);
        assert_eq!(state.exercise, "squat");
        assert_eq!(state.stage, "end");
        assert_eq!(state.reps, 0);

        for expected in 1..=3 {
            let state = feed(&mut counter, "squat", "start", 3);
            assert_eq!(state.reps, expected);
            assert_eq!(state.stage, "start");
            feed(&mut counter, "squat", "end", 3);
        }
        assert_eq!(counter.reps(), 3);
    }

    #[test]
    fn test_unstable_stage_does_not_count() {
        let mut counter = RepCounter::new(10, 3);
        feed(&mut counter, "push-up", "end", 3);

        // Alternating stage predictions never become unanimous.
        for i in 0..10 {
            let stage = if i % 2 == 0 { "start" } else { "end" };
            counter.process("push-up", stage);
        }
        assert_eq!(counter.reps(), 0);
    }

    #[test]
    fn test_exercise_switch_resets_count() {
        let mut counter = RepCounter::new(4, 2);
        feed(&mut counter, "squat", "end", 2);
        feed(&mut counter, "squat", "start", 2);
        assert_eq!(counter.reps(), 1);

        // A single outlier frame does not change the majority.
        let state = counter.process("pull-up", "start");
        assert_eq!(state.exercise, "squat");
        assert_eq!(state.reps, 1);

        let state = feed(&mut counter, "pull-up", "end", 4);
        assert_eq!(state.exercise, "pull-up");
        assert_eq!(state.reps, 0);

        counter.reset();
        assert_eq!(counter.state().exercise, "");
    }
}
