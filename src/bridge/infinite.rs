//! Paginated queries on top of a single cache entry.
//!
//! [`leptos_query`] caches one value per key, so an infinite query caches
//! every page it has loaded as one [`InfiniteData`]. The cache's own fetch
//! loads the first page; further pages are fetched here and written back
//! with [`QueryClient::set_query_data`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};
use leptos_query::{use_query_client, QueryClient};
use leptos_reactive::untrack;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::bridge::accessor::RuntimeAccessor;
use crate::bridge::hooks::QuerySettings;
use crate::bridge::query::{
    observe, CacheValue, EffectQuery, PreparedQuery, QueryFnContext, QueryOutcome, QueryStatus,
};
use crate::effect::cause::Cause;
use crate::query::QueryKey;
use crate::runtime::{QueryError, Runtime};

/// Every loaded page with the parameter it was fetched with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfiniteData<T, P> {
    /// Pages in display order.
    pub pages: Vec<T>,
    /// `page_params[i]` fetched `pages[i]`.
    pub page_params: Vec<P>,
}

/// Handed to a page function for each page fetch.
#[derive(Debug, Clone)]
pub struct PageContext<P> {
    /// Key of the whole infinite query.
    pub key: QueryKey,
    /// Which page to fetch.
    pub page_param: P,
    /// Cancelled when the observing owner is torn down.
    pub signal: CancellationToken,
}

pub(crate) type PageFetchFn<T, E, P> =
    Rc<dyn Fn(PageContext<P>, Runtime) -> LocalBoxFuture<'static, QueryOutcome<T, E>>>;

/// Computes the parameter of the page after (or before) the loaded ones
/// from `(edge page, all pages, edge param, all params)`. `None` means
/// there is no such page.
pub(crate) type PageParamFn<T, P> = Rc<dyn Fn(&T, &[T], &P, &[P]) -> Option<P>>;

pub(crate) struct PreparedInfinite<T, E, P> {
    pub(crate) key: QueryKey,
    pub(crate) fetch_page: PageFetchFn<T, E, P>,
    pub(crate) initial_page_param: P,
    pub(crate) next_page_param: PageParamFn<T, P>,
    pub(crate) previous_page_param: Option<PageParamFn<T, P>>,
    pub(crate) settings: QuerySettings<E>,
}

impl<T, E, P: Clone> Clone for PreparedInfinite<T, E, P> {
    fn clone(&self) -> Self {
        PreparedInfinite {
            key: self.key.clone(),
            fetch_page: self.fetch_page.clone(),
            initial_page_param: self.initial_page_param.clone(),
            next_page_param: self.next_page_param.clone(),
            previous_page_param: self.previous_page_param.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<T, E, P: Clone + 'static> PreparedInfinite<T, E, P>
where
    T: 'static,
    E: 'static,
{
    /// The query the cache runs: fetch the initial page only.
    fn first_page(self) -> PreparedQuery<InfiniteData<T, P>, E> {
        let PreparedInfinite {
            key,
            fetch_page,
            initial_page_param,
            settings,
            ..
        } = self;
        PreparedQuery {
            key,
            fetch: Rc::new(move |ctx: QueryFnContext, runtime: Runtime| {
                let param = initial_page_param.clone();
                let page = fetch_page(
                    PageContext {
                        key: ctx.key,
                        page_param: param.clone(),
                        signal: ctx.signal,
                    },
                    runtime,
                );
                async move {
                    Ok::<_, QueryError<E>>(InfiniteData {
                        pages: vec![page.await?],
                        page_params: vec![param],
                    })
                }
                .boxed_local()
            }),
            settings,
            accessor: None,
        }
    }
}

pub(crate) fn observe_infinite<T, E, P>(
    accessor: &RuntimeAccessor,
    options: impl Fn() -> PreparedInfinite<T, E, P> + 'static,
) -> EffectInfiniteQuery<T, E, P>
where
    T: CacheValue,
    E: CacheValue,
    P: CacheValue,
{
    let latest = Rc::new(RefCell::new(untrack(&options)));
    let query = observe(accessor, {
        let latest = latest.clone();
        move || {
            let prepared = options();
            *latest.borrow_mut() = prepared.clone();
            prepared.first_page()
        }
    });
    EffectInfiniteQuery {
        query,
        latest,
        accessor: accessor.clone(),
        client: use_query_client(),
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Next,
    Previous,
}

/// A paginated query whose pages are fetched by effects.
pub struct EffectInfiniteQuery<T: 'static, E: 'static, P: 'static> {
    query: EffectQuery<InfiniteData<T, P>, E>,
    latest: Rc<RefCell<PreparedInfinite<T, E, P>>>,
    accessor: RuntimeAccessor,
    client: QueryClient,
}

impl<T, E, P> Clone for EffectInfiniteQuery<T, E, P> {
    fn clone(&self) -> Self {
        EffectInfiniteQuery {
            query: self.query.clone(),
            latest: self.latest.clone(),
            accessor: self.accessor.clone(),
            client: self.client.clone(),
        }
    }
}

impl<T, E, P> fmt::Debug for EffectInfiniteQuery<T, E, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectInfiniteQuery")
            .field("query", &self.query)
            .field("accessor", &self.accessor)
            .finish_non_exhaustive()
    }
}

impl<T: CacheValue, E: CacheValue, P: CacheValue> EffectInfiniteQuery<T, E, P> {
    /// The underlying single-entry query.
    pub fn query(&self) -> &EffectQuery<InfiniteData<T, P>, E> {
        &self.query
    }

    /// Loaded pages, tracked.
    pub fn pages(&self) -> Vec<T> {
        self.query.data().map(|data| data.pages).unwrap_or_default()
    }

    /// Error of the first page, tracked.
    pub fn error(&self) -> Option<QueryError<E>> {
        self.query.error()
    }

    /// See [`EffectQuery::status`].
    pub fn status(&self) -> QueryStatus {
        self.query.status()
    }

    /// See [`EffectQuery::is_pending`].
    pub fn is_pending(&self) -> bool {
        self.query.is_pending()
    }

    /// See [`EffectQuery::is_success`].
    pub fn is_success(&self) -> bool {
        self.query.is_success()
    }

    /// See [`EffectQuery::is_fetching`].
    pub fn is_fetching(&self) -> bool {
        self.query.is_fetching()
    }

    /// See [`EffectQuery::settled`].
    pub async fn settled(&self) {
        self.query.settled().await
    }

    /// Drop every page but the first and fetch it again.
    pub fn refetch(&self) {
        self.query.refetch()
    }

    /// Whether the next-page function yields a parameter, tracked.
    pub fn has_next_page(&self) -> bool {
        self.query
            .data()
            .is_some_and(|data| self.page_param(&data, Direction::Next).is_some())
    }

    /// Whether the previous-page function yields a parameter, tracked.
    pub fn has_previous_page(&self) -> bool {
        self.query
            .data()
            .is_some_and(|data| self.page_param(&data, Direction::Previous).is_some())
    }

    /// Fetch and append the next page.
    ///
    /// Resolves to `false` when nothing is loaded yet or there is no next
    /// page. A failed page leaves the loaded pages untouched.
    pub async fn fetch_next_page(&self) -> Result<bool, QueryError<E>> {
        self.fetch_page(Direction::Next).await
    }

    /// Fetch and prepend the previous page.
    pub async fn fetch_previous_page(&self) -> Result<bool, QueryError<E>> {
        self.fetch_page(Direction::Previous).await
    }

    fn page_param(&self, data: &InfiniteData<T, P>, direction: Direction) -> Option<P> {
        let latest = self.latest.borrow();
        let (pages, params) = (&data.pages, &data.page_params);
        match direction {
            Direction::Next => {
                let (page, param) = (pages.last()?, params.last()?);
                (latest.next_page_param)(page, pages, param, params)
            }
            Direction::Previous => {
                let (page, param) = (pages.first()?, params.first()?);
                let previous = latest.previous_page_param.as_ref()?;
                previous(page, pages, param, params)
            }
        }
    }

    async fn fetch_page(&self, direction: Direction) -> Result<bool, QueryError<E>> {
        let Some(Ok(mut data)) = self.query.outcome_untracked() else {
            return Ok(false);
        };
        let Some(param) = self.page_param(&data, direction) else {
            return Ok(false);
        };
        let (key, fetch_page) = {
            let latest = self.latest.borrow();
            (latest.key.clone(), latest.fetch_page.clone())
        };

        let runtime = self
            .accessor
            .ready()
            .await
            .map_err(|defect| QueryError::Cause(Cause::Die(defect)))?;
        let context = PageContext {
            key: key.clone(),
            page_param: param.clone(),
            signal: self.query.signal(),
        };
        let page = self.accessor.track(fetch_page(context, runtime)).await?;

        match direction {
            Direction::Next => {
                data.pages.push(page);
                data.page_params.push(param);
            }
            Direction::Previous => {
                data.pages.insert(0, page);
                data.page_params.insert(0, param);
            }
        }
        tracing::debug!(key = %key, pages = data.pages.len(), "page loaded");
        self.client
            .set_query_data::<QueryKey, QueryOutcome<InfiniteData<T, P>, E>>(key, Ok(data));
        Ok(true)
    }
}
