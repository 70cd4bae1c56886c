use std::{collections::HashSet, time::Duration};

use async_trait::async_trait;
use futures::{stream, Stream};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use tracing::{debug, trace, warn};

use crate::*;

pub const ACCEPT_ACTIVITY_JSON: &str = "application/ld+json, application/json";

/// Transport used to fetch collection and page documents.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Issues one GET for `url` and returns the raw response body.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("activitystreams/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(options: &FetchOptions) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_ACTIVITY_JSON));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(options.user_agent.clone())
            .timeout(options.timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let transport = |source: reqwest::Error| Error::Transport {
            url: url.to_owned(),
            source: Box::new(source),
        };
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(transport)?;
        let body = resp.bytes().await.map_err(transport)?;
        Ok(body.to_vec())
    }
}

pub async fn fetch_collection<F: Fetch + ?Sized>(fetcher: &F, url: &str) -> Result<OrderedCollection> {
    debug!(url, "fetching collection");
    let body = fetcher.fetch(url).await?;
    decode_collection(&body)
}

/// Walks a collection from its `last` page backwards along `prev` links.
///
/// Every call to [`PagesReverse::next_page`] issues at most one fetch and
/// nothing is requested ahead of the caller, so dropping the walker stops
/// the traversal. After the chain ends or a step fails the walker is
/// exhausted and only returns `None`.
pub struct PagesReverse<'a, F: Fetch + ?Sized> {
    fetcher: &'a F,
    current: Option<String>,
    visited: HashSet<String>,
    yielded: usize,
    max_pages: Option<usize>,
}

impl<'a, F: Fetch + ?Sized + 'a> PagesReverse<'a, F> {
    pub fn new(fetcher: &'a F, collection: &OrderedCollection) -> Self {
        Self {
            fetcher,
            current: Some(collection.last.id.clone()),
            visited: HashSet::new(),
            yielded: 0,
            max_pages: None,
        }
    }

    /// Stops after `max_pages` pages even if older pages remain.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    /// Pages fetched and decoded successfully.
    pub fn pages_fetched(&self) -> usize {
        self.yielded
    }

    pub fn is_exhausted(&self) -> bool {
        self.current.is_none()
    }

    pub async fn next_page(&mut self) -> Option<Result<OrderedCollectionPage>> {
        let url = self.current.take()?;

        if let Some(max_pages) = self.max_pages {
            if self.visited.len() >= max_pages {
                warn!(max_pages, pending = %url, "page limit reached, older pages skipped");
                return None;
            }
        }

        if !self.visited.insert(url.clone()) {
            return Some(Err(Error::PageCycle(url)));
        }

        debug!(%url, "fetching page");
        let page = match self.fetch_page(&url).await {
            Ok(page) => page,
            Err(err) => return Some(Err(err)),
        };
        trace!(
            id = %page.id,
            start_index = page.start_index,
            items = page.ordered_items.len(),
            "decoded page"
        );

        self.current = page.prev.as_ref().map(|prev| prev.id.clone());
        self.yielded += 1;
        Some(Ok(page))
    }

    async fn fetch_page(&self, url: &str) -> Result<OrderedCollectionPage> {
        let body = self.fetcher.fetch(url).await?;
        decode_page_bytes(&body)
    }

    pub fn activities(self) -> ActivitiesReverse<'a, F> {
        ActivitiesReverse {
            pages: self,
            buffered: Vec::new().into_iter(),
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<OrderedCollectionPage>> + 'a {
        stream::unfold(self, |mut pages| async move {
            let item = pages.next_page().await?;
            Some((item, pages))
        })
    }
}

/// Activities of [`PagesReverse`], page by page, each page in stored order.
pub struct ActivitiesReverse<'a, F: Fetch + ?Sized> {
    pages: PagesReverse<'a, F>,
    buffered: std::vec::IntoIter<Activity>,
}

impl<'a, F: Fetch + ?Sized + 'a> ActivitiesReverse<'a, F> {
    pub async fn next_activity(&mut self) -> Option<Result<Activity>> {
        loop {
            if let Some(activity) = self.buffered.next() {
                return Some(Ok(activity));
            }
            match self.pages.next_page().await? {
                Ok(page) => self.buffered = page.ordered_items.into_iter(),
                Err(err) => return Some(Err(err)),
            }
        }
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages.pages_fetched()
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Activity>> + 'a {
        stream::unfold(self, |mut activities| async move {
            let item = activities.next_activity().await?;
            Some((item, activities))
        })
    }
}

pub fn pages_reverse<'a, F: Fetch + ?Sized>(
    fetcher: &'a F,
    collection: &OrderedCollection,
) -> PagesReverse<'a, F> {
    PagesReverse::new(fetcher, collection)
}

pub fn activities_reverse<'a, F: Fetch + ?Sized>(
    fetcher: &'a F,
    collection: &OrderedCollection,
) -> ActivitiesReverse<'a, F> {
    PagesReverse::new(fetcher, collection).activities()
}
