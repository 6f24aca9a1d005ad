use crate::error::{Error, Result};
use ordered_float::NotNan;
use std::collections::BTreeSet;

/// Ordered index over all particles, keyed by next impact time.
///
/// Backed by a `BTreeSet` of `(time, particle)` pairs: O(log N) insert and
/// remove, ordered head access, and a deterministic tie-break on the
/// particle index when two events share a time. Event times are stored as
/// [`NotNan`] so the ordering is total.
#[derive(Debug, Default)]
pub struct EventQueue {
    entries: BTreeSet<(NotNan<f64>, usize)>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Schedule `particle` at `time`. Rejects NaN times and duplicate keys.
    pub fn insert(&mut self, time: f64, particle: usize) -> Result<()> {
        let time = NotNan::new(time)
            .map_err(|_| Error::InvalidParam("event time cannot be NaN".into()))?;
        if !self.entries.insert((time, particle)) {
            return Err(Error::BrokenInvariant(format!(
                "particle {particle} scheduled twice at t={time}"
            )));
        }
        Ok(())
    }

    /// The earliest scheduled event, without removing it.
    pub fn peek_min(&self) -> Option<(f64, usize)> {
        self.entries.first().map(|&(t, i)| (t.into_inner(), i))
    }

    /// Remove and return the earliest scheduled event.
    pub fn pop_min(&mut self) -> Option<(f64, usize)> {
        self.entries.pop_first().map(|(t, i)| (t.into_inner(), i))
    }

    /// Move `particle` from its old slot to `new_time`.
    ///
    /// When the particle was the queue minimum the head is popped directly;
    /// otherwise it is removed by its exact `(old_time, particle)` key. A
    /// particle missing from its expected slot is a fatal bookkeeping error.
    pub fn reinsert(
        &mut self,
        particle: usize,
        old_time: f64,
        new_time: f64,
        was_minimum: bool,
    ) -> Result<()> {
        if was_minimum {
            match self.entries.pop_first() {
                Some((_, head)) if head == particle => {}
                other => {
                    return Err(Error::BrokenInvariant(format!(
                        "particle {particle} expected at the queue head, found {other:?}"
                    )))
                }
            }
        } else {
            let old_time = NotNan::new(old_time)
                .map_err(|_| Error::InvalidParam("event time cannot be NaN".into()))?;
            if !self.entries.remove(&(old_time, particle)) {
                return Err(Error::BrokenInvariant(format!(
                    "particle {particle} lost from the event queue"
                )));
            }
        }
        self.insert(new_time, particle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_time_order() -> Result<()> {
        let mut q = EventQueue::new();
        q.insert(3.0, 0)?;
        q.insert(1.0, 1)?;
        q.insert(2.0, 2)?;
        assert_eq!(q.pop_min(), Some((1.0, 1)));
        assert_eq!(q.pop_min(), Some((2.0, 2)));
        assert_eq!(q.pop_min(), Some((3.0, 0)));
        assert_eq!(q.pop_min(), None);
        Ok(())
    }

    #[test]
    fn ties_break_on_particle_index() -> Result<()> {
        let mut q = EventQueue::new();
        q.insert(1.0, 7)?;
        q.insert(1.0, 3)?;
        q.insert(1.0, 5)?;
        assert_eq!(q.pop_min(), Some((1.0, 3)));
        assert_eq!(q.pop_min(), Some((1.0, 5)));
        assert_eq!(q.pop_min(), Some((1.0, 7)));
        Ok(())
    }

    #[test]
    fn reinsert_from_the_head() -> Result<()> {
        let mut q = EventQueue::new();
        q.insert(1.0, 0)?;
        q.insert(2.0, 1)?;
        q.reinsert(0, 1.0, 3.0, true)?;
        assert_eq!(q.peek_min(), Some((2.0, 1)));
        assert_eq!(q.len(), 2);
        Ok(())
    }

    #[test]
    fn reinsert_from_the_middle() -> Result<()> {
        let mut q = EventQueue::new();
        q.insert(1.0, 0)?;
        q.insert(2.0, 1)?;
        q.insert(3.0, 2)?;
        q.reinsert(1, 2.0, 0.5, false)?;
        assert_eq!(q.pop_min(), Some((0.5, 1)));
        assert_eq!(q.pop_min(), Some((1.0, 0)));
        Ok(())
    }

    #[test]
    fn lost_particle_is_fatal() -> Result<()> {
        let mut q = EventQueue::new();
        q.insert(1.0, 0)?;
        let err = q.reinsert(1, 2.0, 3.0, false).unwrap_err();
        assert!(err.to_string().contains("lost"));
        let err = q.reinsert(1, 1.0, 3.0, true).unwrap_err();
        assert!(err.to_string().contains("queue head"));
        Ok(())
    }

    #[test]
    fn nan_times_rejected() {
        let mut q = EventQueue::new();
        assert!(q.insert(f64::NAN, 0).is_err());
    }
}
