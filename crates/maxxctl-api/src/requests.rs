// Proxy request endpoints
//
// Cursor-paginated listing, filtered counts, and per-request detail and
// upstream attempts.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::AdminClient;
use crate::error::Error;
use crate::models::{
    CursorPage, PaginationParams, ProxyRequest, ProxyUpstreamAttempt, RequestStatus,
};

/// Query string for `GET /requests/count`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CountQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    provider_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<RequestStatus>,
}

/// The count endpoint answers either a bare number or `{"count": n}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum CountBody {
    Bare(u64),
    Wrapped { count: u64 },
}

impl AdminClient {
    /// One page of proxy requests, newest first.
    ///
    /// `GET /api/admin/requests?limit=&before=&providerId=&status=`
    pub async fn get_proxy_requests(
        &self,
        params: &PaginationParams,
    ) -> Result<CursorPage<ProxyRequest>, Error> {
        let url = self.admin_url("requests")?;
        let page: CursorPage<ProxyRequest> = self.get_with_query(url, params).await?;
        debug!(
            count = page.items.len(),
            has_more = page.has_more,
            "fetched request page"
        );
        Ok(page)
    }

    /// Number of requests matching the optional filters.
    ///
    /// `GET /api/admin/requests/count`
    pub async fn get_proxy_requests_count(
        &self,
        provider_id: Option<u64>,
        status: Option<RequestStatus>,
    ) -> Result<u64, Error> {
        let url = self.admin_url("requests/count")?;
        let body: CountBody = self
            .get_with_query(
                url,
                &CountQuery {
                    provider_id,
                    status,
                },
            )
            .await?;
        Ok(match body {
            CountBody::Bare(n) | CountBody::Wrapped { count: n } => n,
        })
    }

    /// A single request with full detail.
    ///
    /// `GET /api/admin/requests/{id}`
    pub async fn get_proxy_request(&self, id: u64) -> Result<ProxyRequest, Error> {
        let url = self.admin_url(&format!("requests/{id}"))?;
        self.get(url).await
    }

    /// Upstream attempts made while serving request `id`, in attempt order.
    ///
    /// `GET /api/admin/requests/{id}/attempts`
    pub async fn get_proxy_upstream_attempts(
        &self,
        id: u64,
    ) -> Result<Vec<ProxyUpstreamAttempt>, Error> {
        let url = self.admin_url(&format!("requests/{id}/attempts"))?;
        let attempts: Option<Vec<ProxyUpstreamAttempt>> = self.get(url).await?;
        Ok(attempts.unwrap_or_default())
    }
}
