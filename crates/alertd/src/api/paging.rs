//! Page extraction and RFC 5988 `Link` header construction.
//!
//! Navigation links rewrite only the `page` parameter of the originating
//! request URI, preserving every other parameter and their order, so link
//! output is byte-stable for a fixed input.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use models::{Direction, Order, Page, Pager};

use super::params::{self, Params};
use super::ApiError;

pub const PARAM_PAGE: &str = "page";
pub const PARAM_PER_PAGE: &str = "per_page";
pub const PARAM_SORT: &str = "sort";
pub const PARAM_ORDER: &str = "order";

/// Build the request's pager from `page`, `per_page` and repeated
/// `sort`/`order` pairs. No `per_page` means an unlimited page.
pub fn extract_paging(params: &Params) -> Result<Pager, ApiError> {
    let page = params::parse_usize(params, PARAM_PAGE)?.unwrap_or(0);
    let page_size = params::parse_usize(params, PARAM_PER_PAGE)?;

    let sorts = params.get(PARAM_SORT).cloned().unwrap_or_default();
    let directions = params.get(PARAM_ORDER).cloned().unwrap_or_default();
    let mut order = Vec::with_capacity(sorts.len());
    for (index, field) in sorts.into_iter().enumerate() {
        let direction = match directions.get(index) {
            None => Direction::Ascending,
            Some(value) => value.parse::<Direction>()?,
        };
        order.push(Order { field, direction });
    }

    Ok(Pager {
        page,
        page_size,
        order,
    })
}

/// Replace the value of `name` in the URI's query, appending the parameter
/// when absent. All other parameters keep their position and encoding.
pub fn replace_query_param(uri: &str, name: &str, value: &str) -> String {
    let (path, query) = match uri.split_once('?') {
        Some((path, query)) => (path, query),
        None => return format!("{uri}?{name}={value}"),
    };

    let mut replaced = false;
    let mut parts: Vec<String> = Vec::new();
    for pair in query.split('&') {
        let key = pair.split('=').next().unwrap_or(pair);
        if key == name {
            if !replaced {
                parts.push(format!("{name}={value}"));
                replaced = true;
            }
            // Duplicate occurrences of the parameter collapse into one.
        } else {
            parts.push(pair.to_string());
        }
    }
    if !replaced {
        parts.push(format!("{name}={value}"));
    }
    format!("{path}?{}", parts.join("&"))
}

/// Build the `Link` header value for a size-limited page:
/// `current` always, `prev`/`next` when they exist, and `last`.
pub fn paging_links<T>(page: &Page<T>, uri: &str) -> String {
    let size = page
        .page_size
        .expect("links are only built for size-limited pages");

    let mut links = vec![(
        replace_query_param(uri, PARAM_PAGE, &page.page.to_string()),
        "current",
    )];
    if page.page > 0 {
        links.push((
            replace_query_param(uri, PARAM_PAGE, &(page.page - 1).to_string()),
            "prev",
        ));
    }
    if page.total_size > (page.page + 1) * size {
        links.push((
            replace_query_param(uri, PARAM_PAGE, &(page.page + 1).to_string()),
            "next",
        ));
    }
    let mut last = page.total_size / size;
    if last > 0 && page.total_size % size == 0 {
        last -= 1;
    }
    links.push((
        replace_query_param(uri, PARAM_PAGE, &last.to_string()),
        "last",
    ));

    links
        .into_iter()
        .map(|(link, rel)| format!("<{link}>; rel=\"{rel}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render a paginated result. Empty results and unlimited pages are plain
/// 200s; size-limited pages additionally carry `Link` and `X-Total-Count`.
pub fn paginated_ok<T: Serialize>(page: Page<T>, uri: &str) -> Response {
    if page.is_empty() || page.page_size.is_none() {
        return super::ok(&page.items);
    }
    let links = paging_links(&page, uri);
    let total = page.total_size.to_string();
    let mut response = (StatusCode::OK, axum::Json(&page.items)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::LINK, links.parse().expect("links are ascii"));
    headers.insert("X-Total-Count", total.parse().expect("count is ascii"));
    response
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn replace_preserves_other_params_and_ordering() {
        assert_eq!(
            replace_query_param("/x?page=2&foo=bar", "page", "5"),
            "/x?page=5&foo=bar"
        );
        assert_eq!(replace_query_param("/x", "page", "0"), "/x?page=0");
        assert_eq!(
            replace_query_param("/x?foo=bar", "page", "3"),
            "/x?foo=bar&page=3"
        );
        assert_eq!(
            replace_query_param("/x?page=1&page=2&foo=bar", "page", "9"),
            "/x?page=9&foo=bar"
        );
    }

    #[test]
    fn links_for_a_middle_page() {
        // totalSize=25, pageSize=10, page=0: next and last, no prev.
        let page = Page::<u32> {
            items: (0..10).collect(),
            page: 0,
            page_size: Some(10),
            total_size: 25,
        };
        let links = paging_links(&page, "/alerts?severities=CRITICAL");
        insta::assert_snapshot!(links, @r#"</alerts?severities=CRITICAL&page=0>; rel="current", </alerts?severities=CRITICAL&page=1>; rel="next", </alerts?severities=CRITICAL&page=2>; rel="last""#);
    }

    #[test]
    fn links_when_total_is_an_exact_multiple() {
        let page = Page::<u32> {
            items: (0..10).collect(),
            page: 1,
            page_size: Some(10),
            total_size: 20,
        };
        let links = paging_links(&page, "/alerts?page=1");
        insta::assert_snapshot!(links, @r#"</alerts?page=1>; rel="current", </alerts?page=0>; rel="prev", </alerts?page=1>; rel="last""#);
    }

    #[test]
    fn extracts_sort_order_pairs() {
        let mut params = Params::new();
        params.insert(PARAM_PAGE.to_string(), vec!["2".to_string()]);
        params.insert(PARAM_PER_PAGE.to_string(), vec!["50".to_string()]);
        params.insert(
            PARAM_SORT.to_string(),
            vec!["ctime".to_string(), "severity".to_string()],
        );
        params.insert(PARAM_ORDER.to_string(), vec!["desc".to_string()]);

        let pager = extract_paging(&params).unwrap();
        assert_eq!(pager.page, 2);
        assert_eq!(pager.page_size, Some(50));
        assert_eq!(pager.order.len(), 2);
        assert_eq!(pager.order[0].direction, Direction::Descending);
        assert_eq!(pager.order[1].direction, Direction::Ascending);
    }

    #[test]
    fn absent_per_page_means_unlimited() {
        let pager = extract_paging(&Params::new()).unwrap();
        assert!(pager.is_unlimited());
        assert_eq!(pager.page, 0);
    }
}
