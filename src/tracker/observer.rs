//! Current-page detection from scroll geometry.

use tokio::sync::watch;

/// Visible part of the scroll container, in the same coordinate space as the pages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub top: f64,
    pub height: f64,
}

impl Viewport {
    fn center(&self) -> f64 {
        self.top + self.height / 2.0
    }
}

/// Bounding box of one rendered page element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRect {
    pub page: u32,
    pub top: f64,
    pub height: f64,
}

impl PageRect {
    fn center(&self) -> f64 {
        self.top + self.height / 2.0
    }
}

/// The page whose vertical center is closest to the viewport's center.
///
/// Equidistant pages resolve to the first one in `pages` order. `None` when no page
/// has been laid out yet.
pub fn centered_page(viewport: &Viewport, pages: &[PageRect]) -> Option<u32> {
    let mid = viewport.center();
    let mut best: Option<(u32, f64)> = None;
    for rect in pages {
        let dist = (mid - rect.center()).abs();
        match best {
            Some((_, best_dist)) if dist >= best_dist => {}
            _ => best = Some((rect.page, dist)),
        }
    }
    best.map(|(page, _)| page)
}

/// Publishes the current page to any number of watchers.
#[derive(Debug)]
pub struct PositionObserver {
    current: watch::Sender<u32>,
}

impl PositionObserver {
    pub fn new() -> Self {
        let (current, _) = watch::channel(1);
        Self { current }
    }

    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.current.subscribe()
    }

    pub fn current(&self) -> u32 {
        *self.current.borrow()
    }

    /// Recompute the current page. Returns the new page only when it changed.
    pub fn observe(&self, viewport: &Viewport, pages: &[PageRect]) -> Option<u32> {
        let page = centered_page(viewport, pages)?;
        let changed = self.current.send_if_modified(|current| {
            if *current == page {
                false
            } else {
                *current = page;
                true
            }
        });
        changed.then_some(page)
    }
}

impl Default for PositionObserver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // pages of height 100, no gaps
    fn stacked_pages(count: u32) -> Vec<PageRect> {
        (1..=count)
            .map(|page| PageRect {
                page,
                top: f64::from(page - 1) * 100.0,
                height: 100.0,
            })
            .collect()
    }

    #[test]
    fn picks_page_closest_to_center() {
        let pages = stacked_pages(10);
        let viewport = Viewport { top: 420.0, height: 100.0 };
        assert_eq!(centered_page(&viewport, &pages), Some(5));

        let viewport = Viewport { top: 0.0, height: 100.0 };
        assert_eq!(centered_page(&viewport, &pages), Some(1));
    }

    #[test]
    fn tie_goes_to_first_page() {
        let pages = stacked_pages(2);
        // center at 100: page 1 center 50, page 2 center 150
        let viewport = Viewport { top: 50.0, height: 100.0 };
        assert_eq!(centered_page(&viewport, &pages), Some(1));
    }

    #[test]
    fn no_pages_no_result() {
        let observer = PositionObserver::new();
        let viewport = Viewport { top: 300.0, height: 100.0 };
        assert_eq!(observer.observe(&viewport, &[]), None);
        assert_eq!(observer.current(), 1);
    }

    #[test]
    fn publishes_only_changes() {
        let observer = PositionObserver::new();
        let mut rx = observer.subscribe();
        let pages = stacked_pages(10);

        assert_eq!(observer.observe(&Viewport { top: 0.0, height: 100.0 }, &pages), None);
        assert!(!rx.has_changed().unwrap());

        assert_eq!(observer.observe(&Viewport { top: 200.0, height: 100.0 }, &pages), Some(3));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 3);
    }

    #[test]
    fn keeps_working_without_watchers() {
        let observer = PositionObserver::new();
        let pages = stacked_pages(4);
        assert_eq!(observer.observe(&Viewport { top: 300.0, height: 100.0 }, &pages), Some(4));
        assert_eq!(observer.current(), 4);
    }
}
