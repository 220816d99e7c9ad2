use chrono::{DateTime, Utc};

use crate::models::{Batch, ServerMessage};

/// Client-side copy of the batch table, rebuilt from every snapshot
#[derive(Debug, Default, Clone)]
pub struct LocalView {
    batches: Vec<Batch>,
    as_of: Option<DateTime<Utc>>,
}

impl LocalView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a server message. Returns `true` when the view was replaced.
    ///
    /// Every snapshot replaces the whole view; the server delivers them in order.
    pub fn apply(&mut self, message: &ServerMessage) -> bool {
        match message {
            ServerMessage::Welcome { .. } => false,
            ServerMessage::BatchUpdate { data, timestamp } => {
                self.batches = data.clone();
                self.as_of = Some(*timestamp);
                true
            }
        }
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn as_of(&self) -> Option<DateTime<Utc>> {
        self.as_of
    }

    pub fn find(&self, id: i64) -> Option<&Batch> {
        self.batches.iter().find(|batch| batch.id == id)
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BatchStatus;
    use chrono::Duration;

    fn batch(id: i64, status: BatchStatus) -> Batch {
        Batch {
            id,
            batch_number: format!("BAT-2023-{}", 1000 + id),
            article_number: format!("ART-{}", id),
            description: "Ventil V-200".to_string(),
            location: None,
            total_weight: 120,
            inventored_weight: None,
            status,
            updated_at: None,
            user_id: None,
            user_name: None,
        }
    }

    fn snapshot(batches: Vec<Batch>, timestamp: DateTime<Utc>) -> ServerMessage {
        ServerMessage::BatchUpdate {
            data: batches,
            timestamp,
        }
    }

    #[test]
    fn snapshot_replaces_whole_view() {
        let now = Utc::now();
        let mut view = LocalView::new();

        assert!(view.apply(&snapshot(
            vec![batch(1, BatchStatus::NotStarted), batch(2, BatchStatus::NotStarted)],
            now
        )));
        assert_eq!(view.len(), 2);

        assert!(view.apply(&snapshot(vec![batch(2, BatchStatus::Completed)], now + Duration::seconds(2))));
        assert_eq!(view.len(), 1);
        assert!(view.find(1).is_none());
        assert_eq!(view.find(2).unwrap().status, BatchStatus::Completed);
        assert_eq!(view.as_of(), Some(now + Duration::seconds(2)));
    }

    #[test]
    fn welcome_leaves_view_untouched() {
        let mut view = LocalView::new();
        assert!(!view.apply(&ServerMessage::welcome("hi")));
        assert!(view.is_empty());
        assert!(view.as_of().is_none());
    }

    #[test]
    fn snapshot_replaces_view_even_when_stamped_earlier() {
        let now = Utc::now();
        let mut view = LocalView::new();
        view.apply(&snapshot(vec![batch(1, BatchStatus::Completed)], now));

        // Server clock stepped back, or the channel reconnected to another instance
        let earlier = now - Duration::seconds(5);
        assert!(view.apply(&snapshot(vec![batch(2, BatchStatus::NotStarted)], earlier)));
        assert_eq!(view.len(), 1);
        assert!(view.find(1).is_none());
        assert_eq!(view.find(2).unwrap().status, BatchStatus::NotStarted);
        assert_eq!(view.as_of(), Some(earlier));
    }
}
