//! Publication channels and the append-only submission log.

use crate::error::{CatalogError, Result};
use crate::lookups::resolve_slug;
use crate::store::{Catalog, bump};
use crate::types::{
    CarId, ChannelId, PublicationChannel, PublicationLog, PublicationLogId, PublicationResult,
};
use chrono::{DateTime, Utc};
use tracing::{info, instrument};

/// Fields for [`Catalog::create_channel`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewChannel {
    pub title: String,
    pub slug: Option<String>,
    pub description: String,
    pub integration_notes: String,
}

impl NewChannel {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Outcome of one submission, as reported by the marketplace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicationAttempt {
    pub external_id: String,
    pub status: PublicationResult,
    pub error_message: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Narrows [`Catalog::publication_logs`]. Empty matches everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublicationLogFilter {
    pub car: Option<CarId>,
    pub channel: Option<ChannelId>,
    pub status: Option<PublicationResult>,
}

impl PublicationLogFilter {
    fn matches(&self, log: &PublicationLog) -> bool {
        self.car.is_none_or(|car| log.car == car)
            && self.channel.is_none_or(|channel| log.channel == channel)
            && self.status.is_none_or(|status| log.status == status)
    }
}

impl Catalog {
    #[instrument(skip(self), fields(title = %channel.title))]
    pub fn create_channel(&self, channel: NewChannel) -> Result<PublicationChannel> {
        let title = channel.title.trim();
        let slug = resolve_slug(title, channel.slug.as_deref())?;
        let mut state = self.lock();
        if state.channels.values().any(|c| c.slug == slug) {
            return Err(CatalogError::constraint(format!(
                "channel slug '{slug}' already exists"
            )));
        }
        let created = PublicationChannel {
            id: ChannelId(bump(&mut state.sequences.channel)),
            slug,
            title: title.to_string(),
            description: channel.description,
            active: true,
            integration_notes: channel.integration_notes,
        };
        state.channels.insert(created.id, created.clone());
        info!(channel = %created.id, slug = %created.slug, "created channel");
        Ok(created)
    }

    pub fn set_channel_active(&self, id: ChannelId, active: bool) -> Result<PublicationChannel> {
        let mut state = self.lock();
        let channel = state
            .channels
            .get_mut(&id)
            .ok_or_else(|| CatalogError::not_found("publication channel", id))?;
        channel.active = active;
        Ok(channel.clone())
    }

    /// Delete a channel that has never been used.
    #[instrument(skip(self))]
    pub fn delete_channel(&self, id: ChannelId) -> Result<()> {
        let mut state = self.lock();
        state.channel(id)?;
        let logs = state
            .publication_logs
            .values()
            .filter(|log| log.channel == id)
            .count();
        if logs > 0 {
            return Err(CatalogError::constraint(format!(
                "channel {id} is referenced by {logs} publication log(s)"
            )));
        }
        state.channels.remove(&id);
        Ok(())
    }

    pub fn channels(&self) -> Vec<PublicationChannel> {
        let mut channels: Vec<PublicationChannel> =
            self.lock().channels.values().cloned().collect();
        channels.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        channels
    }

    /// Append a submission record for `car` on `channel`.
    #[instrument(skip(self, attempt), fields(status = %attempt.status))]
    pub fn record_publication(
        &self,
        car: CarId,
        channel: ChannelId,
        attempt: PublicationAttempt,
    ) -> Result<PublicationLog> {
        let mut state = self.lock();
        let now = self.clock.now();
        state.car(car)?;
        let target = state.channel(channel)?;
        if !target.active {
            return Err(CatalogError::validation(
                "channel",
                format!("channel '{}' is not active", target.slug),
            ));
        }
        let log = PublicationLog {
            id: PublicationLogId(bump(&mut state.sequences.publication_log)),
            car,
            channel,
            external_id: attempt.external_id,
            status: attempt.status,
            error_message: attempt.error_message,
            published_at: attempt.published_at,
            created_at: now,
            updated_at: now,
        };
        state.publication_logs.insert(log.id, log.clone());
        info!(log = %log.id, car = %car, channel = %channel, "recorded publication");
        Ok(log)
    }

    /// Logs matching `filter`, newest first.
    pub fn publication_logs(&self, filter: PublicationLogFilter) -> Vec<PublicationLog> {
        let mut logs: Vec<PublicationLog> = self
            .lock()
            .publication_logs
            .values()
            .filter(|log| filter.matches(log))
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        logs
    }
}
