//! Cursor pagination as a lazy stream
//!
//! Backends return one `Page` per request. `paginate` turns a page fetcher into a stream of
//! items that requests the next page only when the previous one is drained.

use crate::traits::{Page, StorageError, StorageResult};
use futures::stream::{self, Stream, TryStreamExt};
use std::future::Future;

pub fn paginate<T, F, Fut>(mut fetch: F) -> impl Stream<Item = StorageResult<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = StorageResult<Page<T>>>,
{
    // `Some(cursor)` means another page is due, `None` that the listing is exhausted.
    stream::try_unfold(Some(None::<String>), move |state| {
        let request = state.map(&mut fetch);
        async move {
            let Some(request) = request else {
                return Ok::<_, StorageError>(None);
            };
            let page = request.await?;
            let next = page.next_cursor.filter(|c| !c.is_empty()).map(Some);
            Ok(Some((page.items, next)))
        }
    })
    .map_ok(|items| stream::iter(items.into_iter().map(Ok::<T, StorageError>)))
    .try_flatten()
}

/// Drain a paginated listing into a `Vec`
pub async fn collect_all<T, F, Fut>(fetch: F) -> StorageResult<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = StorageResult<Page<T>>>,
{
    paginate(fetch).try_collect().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn pages() -> Vec<Page<u32>> {
        vec![
            Page {
                items: vec![1, 2],
                next_cursor: Some("c1".to_string()),
            },
            Page {
                items: vec![],
                next_cursor: Some("c2".to_string()),
            },
            Page::last(vec![3]),
        ]
    }

    #[tokio::test]
    async fn test_paginate_follows_cursors_to_the_end() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let all = pages();

        let items = collect_all(move |cursor| {
            let index = seen.fetch_add(1, Ordering::SeqCst);
            let expected = match index {
                0 => None,
                1 => Some("c1".to_string()),
                _ => Some("c2".to_string()),
            };
            assert_eq!(cursor, expected);
            let page = all[index].clone();
            async move { Ok(page) }
        })
        .await
        .unwrap();

        assert_eq!(items, vec![1, 2, 3]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_paginate_stops_on_error() {
        let result: StorageResult<Vec<u32>> = collect_all(|cursor| async move {
            match cursor {
                None => Ok(Page {
                    items: vec![1],
                    next_cursor: Some("next".to_string()),
                }),
                Some(_) => Err(StorageError::BackendError("rate limited".to_string())),
            }
        })
        .await;

        assert!(matches!(result, Err(StorageError::BackendError(_))));
    }

    #[tokio::test]
    async fn test_empty_cursor_ends_listing() {
        let items = collect_all(|_| async {
            Ok(Page {
                items: vec!["only".to_string()],
                next_cursor: Some(String::new()),
            })
        })
        .await
        .unwrap();

        assert_eq!(items, vec!["only".to_string()]);
    }
}
