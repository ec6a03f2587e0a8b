//! Auto-scroll Policy
//!
//! New content only pulls the view down if the user was already reading the
//! bottom of the conversation. Someone who scrolled up to read history stays
//! where they are.
//!
//! Units are whatever the surface measures in (rows in the terminal).

/// Default proximity threshold
pub const DEFAULT_SCROLL_THRESHOLD: u32 = 100;

/// Geometry of a scrollable view
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    /// Total content height
    pub scroll_height: u32,
    /// Offset of the first visible unit from the top
    pub scroll_top: u32,
    /// Visible height
    pub client_height: u32,
}

impl Viewport {
    /// Create a viewport
    #[must_use]
    pub fn new(scroll_height: u32, scroll_top: u32, client_height: u32) -> Self {
        Self {
            scroll_height,
            scroll_top,
            client_height,
        }
    }

    /// Distance between the bottom of the view and the end of the content
    #[must_use]
    pub fn distance_from_bottom(&self) -> u32 {
        self.scroll_height
            .saturating_sub(self.scroll_top)
            .saturating_sub(self.client_height)
    }

    /// Largest valid `scroll_top`
    #[must_use]
    pub fn max_scroll_top(&self) -> u32 {
        self.scroll_height.saturating_sub(self.client_height)
    }

    /// Same view pinned to the end of the content
    #[must_use]
    pub fn scrolled_to_bottom(self) -> Self {
        Self {
            scroll_top: self.max_scroll_top(),
            ..self
        }
    }

    /// Same offset over content of a new height
    #[must_use]
    pub fn with_scroll_height(self, scroll_height: u32) -> Self {
        let resized = Self {
            scroll_height,
            ..self
        };
        Self {
            scroll_top: resized.scroll_top.min(resized.max_scroll_top()),
            ..resized
        }
    }

    /// Scroll by a signed amount, clamped to the content
    #[must_use]
    pub fn scrolled_by(self, delta: i64) -> Self {
        let target = (i64::from(self.scroll_top) + delta).clamp(0, i64::from(self.max_scroll_top()));
        Self {
            scroll_top: u32::try_from(target).unwrap_or(0),
            ..self
        }
    }
}

/// Decides whether a content update should scroll the view
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AutoScrollPolicy {
    threshold: u32,
    follow: bool,
}

impl Default for AutoScrollPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SCROLL_THRESHOLD)
    }
}

impl AutoScrollPolicy {
    /// Policy with a proximity threshold; starts following
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            follow: true,
        }
    }

    /// Whether `viewport` is within the threshold of the bottom
    #[must_use]
    pub fn is_near_bottom(&self, viewport: &Viewport) -> bool {
        viewport.distance_from_bottom() < self.threshold
    }

    /// Record where the user left the view
    pub fn observe(&mut self, viewport: &Viewport) {
        self.follow = self.is_near_bottom(viewport);
    }

    /// Follow new content regardless of position (e.g. after sending)
    pub fn force_follow(&mut self) {
        self.follow = true;
    }

    /// Whether the next update will scroll
    #[must_use]
    pub fn is_following(&self) -> bool {
        self.follow
    }

    /// View after the content grew or shrank to `scroll_height`
    ///
    /// `before` is the view as it was before the update.
    #[must_use]
    pub fn apply(&self, before: Viewport, scroll_height: u32) -> Viewport {
        let after = before.with_scroll_height(scroll_height);
        if self.follow {
            after.scrolled_to_bottom()
        } else {
            after
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_far_from_bottom_does_not_scroll() {
        // 200 from the bottom with a threshold of 100
        let before = Viewport::new(1000, 300, 500);
        assert_eq!(before.distance_from_bottom(), 200);

        let mut policy = AutoScrollPolicy::new(100);
        policy.observe(&before);
        let after = policy.apply(before, 1200);

        assert!(!policy.is_following());
        assert_eq!(after.scroll_top, 300);
    }

    #[test]
    fn test_near_bottom_follows_new_content() {
        let before = Viewport::new(1000, 450, 500);
        let mut policy = AutoScrollPolicy::new(100);
        policy.observe(&before);
        let after = policy.apply(before, 1200);

        assert!(policy.is_following());
        assert_eq!(after.scroll_top, 700);
        assert_eq!(after.distance_from_bottom(), 0);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let policy = AutoScrollPolicy::new(100);
        assert!(!policy.is_near_bottom(&Viewport::new(1000, 400, 500)));
        assert!(policy.is_near_bottom(&Viewport::new(1000, 401, 500)));
    }

    #[test]
    fn test_force_follow_after_scrolling_away() {
        let mut policy = AutoScrollPolicy::new(3);
        policy.observe(&Viewport::new(100, 0, 20));
        assert!(!policy.is_following());

        policy.force_follow();
        assert_eq!(policy.apply(Viewport::new(100, 0, 20), 120).scroll_top, 100);
    }

    #[test]
    fn test_short_content_never_scrolls_negative() {
        let view = Viewport::new(5, 0, 20);
        assert_eq!(view.max_scroll_top(), 0);
        assert_eq!(view.scrolled_by(-3).scroll_top, 0);
        assert_eq!(view.scrolled_by(10).scroll_top, 0);
        assert_eq!(AutoScrollPolicy::default().apply(view, 8).scroll_top, 0);
    }
}
