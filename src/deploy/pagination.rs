//! Cursor-driven listing as a stream.

use std::future::Future;

use futures::stream::{self, Stream, TryStreamExt};

use super::provider::{Page, ProviderError};

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Every item of a paginated listing, fetched page by page.
///
/// `fetch` is called with no cursor, then with each cursor the previous page
/// returned, until a page comes back without one. A page is only requested
/// once every item of the previous page has been yielded, and nothing bounds
/// the number of pages.
///
/// ```rust,ignore
/// let stacks: Vec<StackSummary> =
///     paginate(move |token| provider.list_stacks(token)).try_collect().await?;
/// ```
pub fn paginate<'a, T, F, Fut>(fetch: F) -> impl Stream<Item = Result<T, ProviderError>> + 'a
where
    T: 'a,
    F: FnMut(Option<String>) -> Fut + 'a,
    Fut: Future<Output = Result<Page<T>, ProviderError>> + 'a,
{
    stream::try_unfold((Cursor::Start, fetch), |(cursor, mut fetch)| async move {
        let token = match cursor {
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
            Cursor::Done => return Ok(None),
        };
        let page = fetch(token).await?;
        let next = match page.next_token {
            Some(token) if !token.is_empty() => Cursor::Next(token),
            _ => Cursor::Done,
        };
        let items = stream::iter(page.items.into_iter().map(Ok::<T, ProviderError>));
        Ok::<_, ProviderError>(Some((items, (next, fetch))))
    })
    .try_flatten()
}
