//! Output side: where arbitrated announcements go.

use wayfinder_types::Announcement;

/// Speech synthesiser, sound player or any other consumer of alerts.
///
/// Hand-off only: the sink queues, mixes and plays on its own schedule and
/// never acknowledges back to the caller.
pub trait AnnouncementSink: Send + Sync {
    fn announce(&self, announcement: Announcement);
}

impl<T: AnnouncementSink + ?Sized> AnnouncementSink for std::sync::Arc<T> {
    fn announce(&self, announcement: Announcement) {
        (**self).announce(announcement);
    }
}
