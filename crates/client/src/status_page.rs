use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use derive_more::Debug;
use futures::future::join_all;
use primitives::{Monitor, MonitorGroup, StatusPageSection};
use reqwest::{Client as HttpClient, Url};
use serde::Deserialize;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::{error::FetchError, metrics::REQUEST_TIMEOUT};

/// Slug of the synthetic section holding monitors no group claimed.
pub const DEFAULT_SECTION_SLUG: &str = "default";
/// Title of the synthetic section.
pub const DEFAULT_SECTION_TITLE: &str = "Other";

/// One status page's groups as fetched, before resolution against the
/// current monitor list.
#[derive(Debug, Clone)]
pub struct StatusPageSummary {
    /// Slug reported by the page document.
    pub slug: String,
    /// Display title (falls back to the slug).
    pub title: String,
    /// Groups in document order.
    pub groups: Vec<GroupSummary>,
}

/// One group's identity and the monitor IDs it claims.
#[derive(Debug, Clone)]
pub struct GroupSummary {
    /// Group identifier.
    pub id: i64,
    /// Group name.
    pub name: String,
    /// Sort key.
    pub weight: i64,
    /// Claimed monitor IDs in document order.
    pub monitor_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct StatusPageResponse {
    config: StatusPageConfig,
    #[serde(rename = "publicGroupList", default)]
    public_group_list: Vec<PublicGroup>,
}

#[derive(Debug, Deserialize)]
struct StatusPageConfig {
    slug: String,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PublicGroup {
    id: i64,
    name: String,
    weight: i64,
    #[serde(rename = "monitorList", default)]
    monitor_list: Vec<GroupMonitor>,
}

#[derive(Debug, Deserialize)]
struct GroupMonitor {
    id: i64,
}

/// Client for the status-page grouping endpoints.
///
/// Grouping is a best-effort enhancement: every per-slug failure is caught
/// locally and converts to "this slug produced no groups".
#[derive(Clone, Debug)]
pub struct StatusPageClient {
    #[debug(skip)]
    http: HttpClient,
    base_url: Url,
    request_timeout: Duration,
}

impl StatusPageClient {
    /// Creates a client issuing requests under `base_url`.
    pub fn new(base_url: Url) -> Self {
        Self { http: HttpClient::new(), base_url, request_timeout: REQUEST_TIMEOUT }
    }

    /// Overrides the per-request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Fetches every configured slug concurrently, in caller order. Blank
    /// slugs are skipped; a failing slug is logged and contributes nothing,
    /// and never blocks or cancels another slug's request.
    pub async fn fetch_status_pages(&self, slugs: &[String]) -> Vec<StatusPageSummary> {
        let requests = slugs
            .iter()
            .map(|slug| slug.trim())
            .filter(|slug| !slug.is_empty())
            .map(|slug| async move {
                match self.fetch_status_page(slug).await {
                    Ok(summary) => Some(summary),
                    Err(err) => {
                        warn!(slug, error = %err, "status page fetch failed");
                        None
                    }
                }
            });
        join_all(requests).await.into_iter().flatten().collect()
    }

    async fn fetch_status_page(&self, slug: &str) -> Result<StatusPageSummary, FetchError> {
        let url = self
            .base_url
            .join(&format!("api/status-page/{slug}"))
            .map_err(|_| FetchError::InvalidUrl)?;

        let response = timeout(self.request_timeout, self.http.get(url).send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::from_transport)?;
        FetchError::check_status(response.status())?;

        let page = response
            .json::<StatusPageResponse>()
            .await
            .map_err(|_| FetchError::InvalidResponse)?;
        debug!(slug = %page.config.slug, groups = page.public_group_list.len(), "fetched status page");

        Ok(StatusPageSummary {
            title: page.config.title.unwrap_or_else(|| page.config.slug.clone()),
            slug: page.config.slug,
            groups: page
                .public_group_list
                .into_iter()
                .map(|group| GroupSummary {
                    id: group.id,
                    name: group.name,
                    weight: group.weight,
                    monitor_ids: group.monitor_list.into_iter().map(|m| m.id).collect(),
                })
                .collect(),
        })
    }
}

/// Resolves fetched status pages against the current monitor list.
///
/// Sections come back in summary order. A monitor ID referenced by a group
/// but absent from the list is dropped; an ID claimed by more than one
/// group sticks with the first claim. Monitors no group claimed are
/// collected into the synthetic default section, sorted by ID, so that the
/// result exactly partitions the monitor list.
pub fn build_sections(
    summaries: &[StatusPageSummary],
    monitors: &[Monitor],
) -> Vec<StatusPageSection> {
    let by_id: HashMap<i64, &Monitor> = monitors.iter().map(|m| (m.id, m)).collect();
    let mut claimed: HashSet<i64> = HashSet::new();
    let mut sections = Vec::with_capacity(summaries.len() + 1);

    for summary in summaries {
        let mut groups: Vec<MonitorGroup> = summary
            .groups
            .iter()
            .map(|group| {
                let members = group
                    .monitor_ids
                    .iter()
                    .filter_map(|id| {
                        let monitor = by_id.get(id)?;
                        claimed.insert(*id).then(|| (*monitor).clone())
                    })
                    .collect();
                MonitorGroup {
                    id: group.id,
                    title: group.name.clone(),
                    weight: group.weight,
                    monitors: members,
                }
            })
            .collect();
        groups.sort_by(|a, b| {
            a.weight
                .cmp(&b.weight)
                .then_with(|| a.title.cmp(&b.title))
                .then_with(|| a.id.cmp(&b.id))
        });
        sections.push(StatusPageSection {
            slug: summary.slug.clone(),
            title: summary.title.clone(),
            groups,
            monitors: Vec::new(),
            is_default: false,
        });
    }

    let mut unclaimed: Vec<Monitor> =
        monitors.iter().filter(|m| !claimed.contains(&m.id)).cloned().collect();
    unclaimed.sort_unstable_by_key(|m| m.id);
    if !unclaimed.is_empty() {
        sections.push(StatusPageSection {
            slug: DEFAULT_SECTION_SLUG.to_owned(),
            title: DEFAULT_SECTION_TITLE.to_owned(),
            groups: Vec::new(),
            monitors: unclaimed,
            is_default: true,
        });
    }

    sections
}
