// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Change notification between blocks, their facets and outside listeners.
//!
//! Every geometry mutation is tagged with the [`ChangeOrigin`] that caused it.
//! Only `External` changes reach observers or trigger a block resync; a block
//! re-forming its own facets tags the change `Owner`, which breaks the
//! facet → block → facet cycle.

use std::fmt;

/// Who caused a geometry change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeOrigin {
    /// Edit coming from outside the owning entity (UI, caller code)
    External,
    /// Re-derivation performed by the owning block
    Owner,
}

/// Payload passed to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryChanged {
    pub origin: ChangeOrigin,
    /// Revision of the entity after the change
    pub revision: u64,
}

/// Narrow callback for geometry changes
pub trait GeometryObserver {
    fn on_geometry_changed(&mut self, event: &GeometryChanged);
}

impl<F> GeometryObserver for F
where
    F: FnMut(&GeometryChanged),
{
    fn on_geometry_changed(&mut self, event: &GeometryChanged) {
        self(event)
    }
}

/// Revision counter plus optional observer, embedded in facets and blocks.
#[derive(Default)]
pub struct ChangeTracker {
    revision: u64,
    last_origin: Option<ChangeOrigin>,
    observer: Option<Box<dyn GeometryObserver + Send>>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[inline]
    pub fn last_origin(&self) -> Option<ChangeOrigin> {
        self.last_origin
    }

    pub fn set_observer(&mut self, observer: Box<dyn GeometryObserver + Send>) {
        self.observer = Some(observer);
    }

    pub fn clear_observer(&mut self) -> Option<Box<dyn GeometryObserver + Send>> {
        self.observer.take()
    }

    #[inline]
    pub fn has_observer(&self) -> bool {
        self.observer.is_some()
    }

    /// Record a change; the observer only hears about external ones.
    pub fn touch(&mut self, origin: ChangeOrigin) -> GeometryChanged {
        self.revision += 1;
        self.last_origin = Some(origin);
        let event = GeometryChanged {
            origin,
            revision: self.revision,
        };
        if origin == ChangeOrigin::External {
            if let Some(observer) = self.observer.as_mut() {
                observer.on_geometry_changed(&event);
            }
        }
        event
    }

    /// Whether an external change happened after `revision`
    #[inline]
    pub fn changed_externally_since(&self, revision: u64) -> bool {
        self.revision != revision && self.last_origin == Some(ChangeOrigin::External)
    }
}

/// Copies carry the revision but never the observer
impl Clone for ChangeTracker {
    fn clone(&self) -> Self {
        Self {
            revision: self.revision,
            last_origin: self.last_origin,
            observer: None,
        }
    }
}

impl fmt::Debug for ChangeTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeTracker")
            .field("revision", &self.revision)
            .field("last_origin", &self.last_origin)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn only_external_changes_reach_the_observer() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut tracker = ChangeTracker::new();
        tracker.set_observer(Box::new(move |e: &GeometryChanged| {
            sink.lock().unwrap().push(*e);
        }));

        tracker.touch(ChangeOrigin::Owner);
        tracker.touch(ChangeOrigin::External);
        tracker.touch(ChangeOrigin::Owner);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].revision, 2);
        assert_eq!(tracker.revision(), 3);
    }

    #[test]
    fn external_change_detection() {
        let mut tracker = ChangeTracker::new();
        let start = tracker.revision();
        assert!(!tracker.changed_externally_since(start));

        tracker.touch(ChangeOrigin::Owner);
        assert!(!tracker.changed_externally_since(start));

        tracker.touch(ChangeOrigin::External);
        assert!(tracker.changed_externally_since(start));
    }

    #[test]
    fn clone_drops_observer() {
        let mut tracker = ChangeTracker::new();
        tracker.set_observer(Box::new(|_: &GeometryChanged| {}));
        tracker.touch(ChangeOrigin::External);
        let copy = tracker.clone();
        assert!(!copy.has_observer());
        assert_eq!(copy.revision(), 1);
    }
}
