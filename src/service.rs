use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use url::Url;

use crate::{
    allocator::CodeAllocator,
    db::LinkStore,
    error::LinkError,
    models::{CreatedLink, Link},
};

const DEFAULT_CLICK_LIMIT: u32 = 1024;

/// The only code path that mutates links.
pub struct LinkService {
    store: LinkStore,
    allocator: CodeAllocator,
    base_url: String,
    pending_clicks: Arc<Semaphore>,
    click_limit: u32,
}

impl LinkService {
    /// `base_url` must not carry a trailing slash.
    pub fn new(store: LinkStore, base_url: impl Into<String>) -> Self {
        Self {
            store,
            allocator: CodeAllocator::new(),
            base_url: base_url.into(),
            pending_clicks: Arc::new(Semaphore::new(DEFAULT_CLICK_LIMIT as usize)),
            click_limit: DEFAULT_CLICK_LIMIT,
        }
    }

    /// Cap the number of click increments running in the background.
    pub fn with_click_limit(mut self, limit: u32) -> Self {
        let limit = limit.max(1);
        self.pending_clicks = Arc::new(Semaphore::new(limit as usize));
        self.click_limit = limit;
        self
    }

    #[cfg(test)]
    pub fn with_allocator(mut self, allocator: CodeAllocator) -> Self {
        self.allocator = allocator;
        self
    }

    pub fn short_url(&self, code: &str) -> String {
        format!("{}/{}", self.base_url, code)
    }

    pub async fn create(
        &self,
        target_url: &str,
        requested_code: Option<&str>,
    ) -> Result<CreatedLink, LinkError> {
        validate_target_url(target_url)?;

        let code = self.allocator.allocate(&self.store, requested_code).await?;

        // No retry on a lost race: the caller sees the conflict.
        let link = self.store.insert(&code, target_url, Utc::now()).await?;
        tracing::info!(code = %link.code, target_url = %link.target_url, "Link created");

        Ok(CreatedLink {
            short_url: self.short_url(&link.code),
            link,
        })
    }

    pub async fn get(&self, code: &str) -> Result<Link, LinkError> {
        self.store.find(code).await?.ok_or(LinkError::NotFound)
    }

    /// Every link, newest first.
    pub async fn list(&self) -> Result<Vec<Link>, LinkError> {
        Ok(self.store.list().await?)
    }

    /// Not idempotent: deleting twice reports `NotFound` the second time.
    pub async fn delete(&self, code: &str) -> Result<(), LinkError> {
        if self.store.delete(code).await? {
            tracing::info!(code = %code, "Link deleted");
            Ok(())
        } else {
            Err(LinkError::NotFound)
        }
    }

    /// Look up `code` for a redirect and count the visit.
    ///
    /// The increment runs on a detached task so the redirect never waits on
    /// it and a dropped request cannot cancel it. `prepare` turns the target
    /// URL read during lookup into the caller's response; if it fails the
    /// visit is not counted.
    pub async fn resolve_and_count<T>(
        &self,
        code: &str,
        prepare: impl FnOnce(&str) -> Result<T, LinkError>,
    ) -> Result<T, LinkError> {
        let link = self.store.find(code).await?.ok_or(LinkError::NotFound)?;
        let prepared = prepare(&link.target_url)?;
        let clicked_at = Utc::now();

        // Never closed, so acquisition only fails if that changes.
        let permit = Arc::clone(&self.pending_clicks).acquire_owned().await.ok();
        let store = self.store.clone();
        let code = link.code;

        tokio::spawn(async move {
            let _permit = permit;
            match store.record_click(&code, clicked_at).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(code = %code, "Link disappeared between redirect and click count");
                }
                Err(e) => {
                    tracing::error!(error = ?e, code = %code, "Failed to record click");
                }
            }
        });

        Ok(prepared)
    }

    /// Wait until every click increment started so far has finished.
    pub async fn drain_clicks(&self) {
        // Holding every permit means no increment is in flight.
        if let Ok(all) = self.pending_clicks.acquire_many(self.click_limit).await {
            drop(all);
        }
    }
}

fn validate_target_url(target_url: &str) -> Result<(), LinkError> {
    match Url::parse(target_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(LinkError::InvalidTargetUrl),
    }
}
