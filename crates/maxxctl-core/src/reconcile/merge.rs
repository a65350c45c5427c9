// ── Pure merge functions ──
//
// Each function folds one pushed entity into a cached view and reports
// whether the view changed. Applying the same entity twice is a no-op the
// second time.

use maxxctl_api::{CursorPage, PaginationParams, ProxyRequest, ProxyUpstreamAttempt, RequestFilter};

use crate::cache::InfinitePages;

/// Merge `req` into one cursor page.
///
/// * present and still matching: replaced in place
/// * present and no longer matching: removed
/// * absent, matching, and the page is the newest window (`before` unset):
///   prepended, then truncated to `limit`
pub fn merge_into_page(
    page: &mut CursorPage<ProxyRequest>,
    req: &ProxyRequest,
    params: &PaginationParams,
) -> bool {
    let matches = params.filter().matches(req);

    if let Some(changed) = merge_existing(page, req, matches) {
        return changed;
    }
    if !matches || params.before.is_some() {
        return false;
    }

    page.items.insert(0, req.clone());
    truncate(page, params.limit);
    recompute_cursors(page);
    true
}

/// Merge `req` into an infinite collection.
///
/// Existing copies are replaced or removed page by page. A new matching
/// request goes to the head of the first page only. The first page is
/// truncated to the collection's page size only while it is the sole
/// loaded page, so loaded pages stay contiguous.
pub fn merge_into_infinite(
    pages: &mut InfinitePages,
    req: &ProxyRequest,
    filter: &RequestFilter,
) -> bool {
    let matches = filter.matches(req);

    let mut found = false;
    let mut changed = false;
    for page in &mut pages.pages {
        if let Some(page_changed) = merge_existing(page, req, matches) {
            found = true;
            changed |= page_changed;
        }
    }
    if found || !matches {
        return changed;
    }

    let single_page = pages.pages.len() == 1;
    let Some(first) = pages.pages.first_mut() else {
        return false;
    };
    first.items.insert(0, req.clone());
    if single_page {
        truncate(first, pages.page_limit);
    }
    recompute_cursors(first);
    true
}

/// Replace an attempt by id or append it.
///
/// Returns `None` when the list already holds an identical copy.
pub fn upsert_attempt(
    attempts: Option<&[ProxyUpstreamAttempt]>,
    attempt: &ProxyUpstreamAttempt,
) -> Option<Vec<ProxyUpstreamAttempt>> {
    let mut list = attempts.map(<[_]>::to_vec).unwrap_or_default();
    match list.iter_mut().find(|a| a.id == attempt.id) {
        Some(existing) if existing == attempt => return None,
        Some(existing) => *existing = attempt.clone(),
        None => list.push(attempt.clone()),
    }
    Some(list)
}

/// Handle `req` if the page already contains it.
///
/// `None` means the id is not on this page.
fn merge_existing(page: &mut CursorPage<ProxyRequest>, req: &ProxyRequest, matches: bool) -> Option<bool> {
    let pos = page.items.iter().position(|r| r.id == req.id)?;

    if !matches {
        page.items.remove(pos);
        recompute_cursors(page);
        return Some(true);
    }

    let slot = page.items.get_mut(pos)?;
    if slot == req {
        return Some(false);
    }
    *slot = req.clone();
    Some(true)
}

fn truncate(page: &mut CursorPage<ProxyRequest>, limit: Option<u32>) {
    let Some(limit) = limit.and_then(|l| usize::try_from(l).ok()) else {
        return;
    };
    if page.items.len() > limit {
        page.items.truncate(limit);
        page.has_more = true;
    }
}

fn recompute_cursors(page: &mut CursorPage<ProxyRequest>) {
    page.first_id = page.items.first().map(|r| r.id);
    page.last_id = page.items.last().map(|r| r.id);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use maxxctl_api::RequestStatus;
    use pretty_assertions::assert_eq;

    fn req(id: u64, provider_id: u64, status: RequestStatus) -> ProxyRequest {
        ProxyRequest {
            id,
            provider_id,
            status,
            ..ProxyRequest::default()
        }
    }

    fn page(items: Vec<ProxyRequest>, has_more: bool) -> CursorPage<ProxyRequest> {
        let mut page = CursorPage {
            items,
            has_more,
            first_id: None,
            last_id: None,
        };
        recompute_cursors(&mut page);
        page
    }

    fn newest(limit: u32) -> PaginationParams {
        PaginationParams {
            limit: Some(limit),
            ..PaginationParams::default()
        }
    }

    #[test]
    fn new_request_is_prepended_to_newest_window() {
        let mut p = page(vec![req(2, 1, RequestStatus::Completed)], false);
        let incoming = req(3, 1, RequestStatus::Pending);

        assert!(merge_into_page(&mut p, &incoming, &newest(10)));
        assert_eq!(p.items.iter().map(|r| r.id).collect::<Vec<_>>(), vec![3, 2]);
        assert_eq!(p.first_id, Some(3));
        assert_eq!(p.last_id, Some(2));
        assert!(!p.has_more);
    }

    #[test]
    fn older_windows_never_gain_new_requests() {
        let mut p = page(vec![req(2, 1, RequestStatus::Completed)], true);
        let params = PaginationParams {
            limit: Some(10),
            before: Some(3),
            ..PaginationParams::default()
        };
        let before = p.clone();

        assert!(!merge_into_page(&mut p, &req(9, 1, RequestStatus::Pending), &params));
        assert_eq!(p, before);
    }

    #[test]
    fn merge_is_idempotent() {
        let mut p = page(vec![req(2, 1, RequestStatus::Completed)], false);
        let incoming = req(3, 1, RequestStatus::Pending);

        merge_into_page(&mut p, &incoming, &newest(10));
        let once = p.clone();
        assert!(!merge_into_page(&mut p, &incoming, &newest(10)));
        assert_eq!(p, once);
    }

    #[test]
    fn update_replaces_in_place() {
        let mut p = page(
            vec![
                req(3, 1, RequestStatus::InProgress),
                req(2, 1, RequestStatus::Completed),
            ],
            false,
        );
        let done = req(3, 1, RequestStatus::Completed);

        assert!(merge_into_page(&mut p, &done, &newest(10)));
        assert_eq!(p.items[0], done);
        assert_eq!(p.items.len(), 2);
    }

    #[test]
    fn status_change_moves_between_filtered_pages() {
        let failed_params = PaginationParams {
            status: Some(RequestStatus::Failed),
            ..newest(10)
        };
        let completed_params = PaginationParams {
            status: Some(RequestStatus::Completed),
            ..newest(10)
        };
        let mut failed = page(
            vec![
                req(5, 1, RequestStatus::Failed),
                req(4, 1, RequestStatus::Failed),
            ],
            false,
        );
        let mut completed = page(vec![req(3, 1, RequestStatus::Completed)], false);

        let update = req(5, 1, RequestStatus::Completed);
        assert!(merge_into_page(&mut failed, &update, &failed_params));
        assert!(merge_into_page(&mut completed, &update, &completed_params));

        assert_eq!(failed.items.iter().map(|r| r.id).collect::<Vec<_>>(), vec![4]);
        assert_eq!(failed.first_id, Some(4));
        assert_eq!(
            completed.items.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![5, 3]
        );
    }

    #[test]
    fn truncation_bounds_page_and_sets_has_more() {
        let mut p = page(
            vec![
                req(3, 1, RequestStatus::Completed),
                req(2, 1, RequestStatus::Completed),
            ],
            false,
        );

        for id in 4..10 {
            merge_into_page(&mut p, &req(id, 1, RequestStatus::Pending), &newest(2));
            assert!(p.items.len() <= 2);
        }
        assert!(p.has_more);
        assert_eq!(p.items.iter().map(|r| r.id).collect::<Vec<_>>(), vec![9, 8]);
        assert_eq!(p.last_id, Some(8));
    }

    #[test]
    fn non_matching_provider_is_ignored() {
        let params = PaginationParams {
            provider_id: Some(1),
            ..newest(10)
        };
        let mut p = page(vec![], false);
        assert!(!merge_into_page(&mut p, &req(1, 2, RequestStatus::Pending), &params));
        assert!(p.items.is_empty());
    }

    #[test]
    fn infinite_new_request_goes_to_first_page_only() {
        let mut pages = InfinitePages {
            pages: vec![
                page(vec![req(5, 1, RequestStatus::Completed)], true),
                page(vec![req(4, 1, RequestStatus::Completed)], false),
            ],
            page_limit: Some(1),
        };

        assert!(merge_into_infinite(
            &mut pages,
            &req(6, 1, RequestStatus::Pending),
            &RequestFilter::default()
        ));
        assert_eq!(pages.pages.len(), 2);
        assert_eq!(
            pages.items().map(|r| r.id).collect::<Vec<_>>(),
            vec![6, 5, 4]
        );
        assert_eq!(pages.pages[0].first_id, Some(6));
    }

    #[test]
    fn infinite_single_page_is_truncated() {
        let mut pages = InfinitePages {
            pages: vec![page(
                vec![
                    req(5, 1, RequestStatus::Completed),
                    req(4, 1, RequestStatus::Completed),
                ],
                false,
            )],
            page_limit: Some(2),
        };

        merge_into_infinite(
            &mut pages,
            &req(6, 1, RequestStatus::Pending),
            &RequestFilter::default(),
        );
        assert_eq!(pages.items().map(|r| r.id).collect::<Vec<_>>(), vec![6, 5]);
        assert!(pages.has_more());
        assert_eq!(pages.next_cursor(), Some(5));
    }

    #[test]
    fn infinite_replaces_and_removes_across_pages() {
        let filter = RequestFilter {
            provider_id: None,
            status: Some(RequestStatus::InProgress),
        };
        let mut pages = InfinitePages {
            pages: vec![
                page(vec![req(5, 1, RequestStatus::InProgress)], true),
                page(vec![req(4, 1, RequestStatus::InProgress)], false),
            ],
            page_limit: Some(1),
        };

        assert!(merge_into_infinite(
            &mut pages,
            &req(4, 1, RequestStatus::Failed),
            &filter
        ));
        assert!(pages.pages[1].items.is_empty());
        assert_eq!(pages.pages[1].last_id, None);

        let before = pages.clone();
        assert!(!merge_into_infinite(
            &mut pages,
            &req(4, 1, RequestStatus::Failed),
            &filter
        ));
        assert_eq!(pages, before);
    }

    #[test]
    fn infinite_without_pages_is_untouched() {
        let mut pages = InfinitePages::default();
        assert!(!merge_into_infinite(
            &mut pages,
            &req(1, 1, RequestStatus::Pending),
            &RequestFilter::default()
        ));
    }

    #[test]
    fn attempts_replace_or_append() {
        let a1 = ProxyUpstreamAttempt {
            id: 1,
            proxy_request_id: 9,
            status: RequestStatus::InProgress,
            ..ProxyUpstreamAttempt::default()
        };
        let a1_done = ProxyUpstreamAttempt {
            status: RequestStatus::Failed,
            ..a1.clone()
        };
        let a2 = ProxyUpstreamAttempt {
            id: 2,
            ..a1.clone()
        };

        let list = upsert_attempt(None, &a1).unwrap();
        assert_eq!(list, vec![a1.clone()]);
        assert!(upsert_attempt(Some(&list), &a1).is_none());

        let list = upsert_attempt(Some(&list), &a1_done).unwrap();
        let list = upsert_attempt(Some(&list), &a2).unwrap();
        assert_eq!(list, vec![a1_done, a2]);
    }
}
