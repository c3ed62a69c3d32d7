use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use crate::{
    core::Progress,
    error::{CinescrollError, CinescrollResult},
};

/// A scrollable region: total content extent and visible viewport extent, in
/// the same length unit (typically CSS pixels).
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct ScrollRegion {
    pub content_extent: f64,
    pub viewport_extent: f64,
}

impl ScrollRegion {
    pub fn new(content_extent: f64, viewport_extent: f64) -> CinescrollResult<Self> {
        if !content_extent.is_finite() || content_extent < 0.0 {
            return Err(CinescrollError::validation(
                "content extent must be finite and >= 0",
            ));
        }
        if !viewport_extent.is_finite() || viewport_extent < 0.0 {
            return Err(CinescrollError::validation(
                "viewport extent must be finite and >= 0",
            ));
        }
        Ok(Self {
            content_extent,
            viewport_extent,
        })
    }

    /// Distance the viewport can travel inside the region.
    pub fn scrollable_extent(self) -> f64 {
        (self.content_extent - self.viewport_extent).max(0.0)
    }

    /// Normalized progress for an absolute scroll `offset`.
    ///
    /// Pure function of the latest offset; regions with no scrollable
    /// distance pin progress to the start.
    pub fn progress_at(self, offset: f64) -> Progress {
        let scrollable = self.scrollable_extent();
        if scrollable <= 0.0 {
            return Progress::START;
        }
        Progress::new(offset / scrollable)
    }
}

type ProgressObserver = Box<dyn FnMut(Progress)>;

struct Observer {
    id: u64,
    callback: ProgressObserver,
}

/// Single-threaded scroll-progress publisher.
///
/// Observers run synchronously on the publishing thread, in subscription
/// order, once per `publish` call. Notifications may arrive at per-pixel
/// scroll frequency, so observers must stay O(1) and non-blocking. Dropping
/// the returned [`Subscription`] stops delivery; observers must not
/// unsubscribe from inside a notification.
pub struct ScrollTimeline {
    region: ScrollRegion,
    latest: Progress,
    observers: Rc<RefCell<Vec<Observer>>>,
    next_id: u64,
}

/// Handle tying an observer's lifetime to the subscriber. Dropping it removes
/// the observer so no further updates reach a torn-down consumer.
#[must_use = "dropping the subscription immediately stops delivery"]
pub struct Subscription {
    id: u64,
    observers: Weak<RefCell<Vec<Observer>>>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(observers) = self.observers.upgrade() {
            observers.borrow_mut().retain(|o| o.id != self.id);
        }
    }
}

impl ScrollTimeline {
    pub fn new(region: ScrollRegion) -> Self {
        Self {
            region,
            latest: Progress::START,
            observers: Rc::new(RefCell::new(Vec::new())),
            next_id: 0,
        }
    }

    pub fn region(&self) -> ScrollRegion {
        self.region
    }

    /// The most recently published progress value.
    pub fn latest(&self) -> Progress {
        self.latest
    }

    pub fn subscribe(&mut self, callback: impl FnMut(Progress) + 'static) -> Subscription {
        let id = self.next_id;
        self.next_id += 1;
        self.observers.borrow_mut().push(Observer {
            id,
            callback: Box::new(callback),
        });
        Subscription {
            id,
            observers: Rc::downgrade(&self.observers),
        }
    }

    /// Recompute progress from `offset` and notify every observer.
    pub fn publish(&mut self, offset: f64) -> Progress {
        let progress = self.region.progress_at(offset);
        self.latest = progress;
        let mut observers = self.observers.borrow_mut();
        for observer in observers.iter_mut() {
            (observer.callback)(progress);
        }
        progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_offset_over_scrollable_extent() {
        // A 800vh page with a 100vh viewport: 7 viewport-heights of travel.
        let region = ScrollRegion::new(800.0, 100.0).unwrap();
        assert_eq!(region.scrollable_extent(), 700.0);
        assert_eq!(region.progress_at(0.0).as_f64(), 0.0);
        assert_eq!(region.progress_at(350.0).as_f64(), 0.5);
        assert_eq!(region.progress_at(700.0).as_f64(), 1.0);
    }

    #[test]
    fn progress_clamps_past_both_ends() {
        let region = ScrollRegion::new(200.0, 100.0).unwrap();
        assert_eq!(region.progress_at(-25.0).as_f64(), 0.0);
        assert_eq!(region.progress_at(1000.0).as_f64(), 1.0);
    }

    #[test]
    fn degenerate_region_pins_to_start() {
        let region = ScrollRegion::new(100.0, 100.0).unwrap();
        assert_eq!(region.progress_at(50.0).as_f64(), 0.0);

        let region = ScrollRegion::new(50.0, 100.0).unwrap();
        assert_eq!(region.progress_at(10.0).as_f64(), 0.0);
    }

    #[test]
    fn new_rejects_non_finite_extents() {
        assert!(ScrollRegion::new(f64::NAN, 100.0).is_err());
        assert!(ScrollRegion::new(100.0, -1.0).is_err());
    }

    #[test]
    fn publish_notifies_subscribers_with_latest_progress() {
        let mut timeline = ScrollTimeline::new(ScrollRegion::new(200.0, 100.0).unwrap());
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&seen);
        let sub = timeline.subscribe(move |p| sink.borrow_mut().push(p.as_f64()));

        timeline.publish(0.0);
        timeline.publish(50.0);
        timeline.publish(100.0);

        assert_eq!(seen.borrow().as_slice(), &[0.0, 0.5, 1.0]);
        assert_eq!(timeline.latest().as_f64(), 1.0);
        drop(sub);
    }

    #[test]
    fn dropping_the_subscription_stops_delivery() {
        let mut timeline = ScrollTimeline::new(ScrollRegion::new(200.0, 100.0).unwrap());
        let seen = Rc::new(RefCell::new(0u32));

        let sink = Rc::clone(&seen);
        let sub = timeline.subscribe(move |_| *sink.borrow_mut() += 1);

        timeline.publish(10.0);
        drop(sub);
        timeline.publish(20.0);
        timeline.publish(30.0);

        assert_eq!(*seen.borrow(), 1);
    }

    #[test]
    fn unsubscribe_only_removes_its_own_observer() {
        let mut timeline = ScrollTimeline::new(ScrollRegion::new(200.0, 100.0).unwrap());
        let a = Rc::new(RefCell::new(0u32));
        let b = Rc::new(RefCell::new(0u32));

        let sink_a = Rc::clone(&a);
        let sub_a = timeline.subscribe(move |_| *sink_a.borrow_mut() += 1);
        let sink_b = Rc::clone(&b);
        let sub_b = timeline.subscribe(move |_| *sink_b.borrow_mut() += 1);

        timeline.publish(10.0);
        sub_a.unsubscribe();
        timeline.publish(20.0);

        assert_eq!(*a.borrow(), 1);
        assert_eq!(*b.borrow(), 2);
        drop(sub_b);
    }
}
