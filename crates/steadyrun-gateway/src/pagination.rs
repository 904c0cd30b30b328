//! Continuation-token pagination

use std::future::Future;

use crate::error::GatewayError;

/// Upper bound on pages fetched by one drain, guards against a provider
/// that keeps returning a token
const MAX_PAGES: usize = 1000;

/// One page of a list response
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_token: Option<String>) -> Self {
        Self { items, next_token }
    }
}

/// Fetch pages until the provider stops returning a continuation token
///
/// # Errors
/// Returns the first page error, or `GatewayError::Permanent` if the page
/// limit is exceeded.
pub async fn drain<T, F, Fut>(mut fetch: F) -> Result<Vec<T>, GatewayError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, GatewayError>>,
{
    let mut items = Vec::new();
    let mut token = None;

    for _ in 0..MAX_PAGES {
        let page = fetch(token.take()).await?;
        items.extend(page.items);

        match page.next_token {
            Some(next) if !next.is_empty() => token = Some(next),
            _ => return Ok(items),
        }
    }

    Err(GatewayError::Permanent(format!(
        "pagination did not terminate after {MAX_PAGES} pages"
    )))
}
