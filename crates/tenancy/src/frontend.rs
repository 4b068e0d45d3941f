//! Request-to-tenant resolution.
//!
//! Strategies run in a fixed order and the first one that finds a storefront
//! wins:
//!
//! 1. `X-Storefront-ID` header
//! 2. `X-Storefront-Slug` header
//! 3. Subdomain of the platform domain (`acme.shop.io`)
//! 4. Custom domain (`shop.acme.com`)
//! 5. Path segment after `storefront` or `s` (`/s/acme/...`)
//! 6. `storefront_slug` query parameter
//!
//! A strategy that errors stops resolution; there is no fall-through past an
//! error.

use std::fmt;
use std::sync::Arc;

use axum::http::{HeaderMap, Uri, header};
use shopgrid_core::{Slug, Storefront, StorefrontId, TenantContext};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::pool::Connector;
use crate::resolver::{ResolverError, TenantResolver};

/// Header carrying an explicit storefront ID.
pub const STOREFRONT_ID_HEADER: &str = "x-storefront-id";
/// Header carrying an explicit storefront slug.
pub const STOREFRONT_SLUG_HEADER: &str = "x-storefront-slug";
/// Query parameter carrying a storefront slug.
pub const STOREFRONT_SLUG_PARAM: &str = "storefront_slug";

const PATH_MARKERS: [&str; 2] = ["storefront", "s"];

/// The parts of an HTTP request that carry tenant hints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHints {
    pub storefront_id: Option<String>,
    pub storefront_slug: Option<String>,
    /// Raw `Host`, port included.
    pub host: Option<String>,
    pub path: String,
    pub query: Option<String>,
}

impl RequestHints {
    /// Collect hints from request headers and URI.
    ///
    /// The host comes from the `Host` header, falling back to the URI
    /// authority. Non-UTF-8 header values are ignored.
    #[must_use]
    pub fn from_parts(headers: &HeaderMap, uri: &Uri) -> Self {
        let value = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            storefront_id: value(STOREFRONT_ID_HEADER),
            storefront_slug: value(STOREFRONT_SLUG_HEADER),
            host: value(header::HOST.as_str())
                .or_else(|| uri.authority().map(|a| a.as_str().to_string())),
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
        }
    }
}

/// Which strategy matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    IdHeader,
    SlugHeader,
    Subdomain,
    CustomDomain,
    Path,
    Query,
}

impl Strategy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::IdHeader => "id_header",
            Self::SlugHeader => "slug_header",
            Self::Subdomain => "subdomain",
            Self::CustomDomain => "custom_domain",
            Self::Path => "path",
            Self::Query => "query",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved request.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub storefront: Arc<Storefront>,
    pub context: TenantContext,
    pub strategy: Strategy,
}

/// Runs the strategy chain against a [`TenantResolver`].
pub struct TenantFrontend<C: Connector> {
    resolver: Arc<TenantResolver<C>>,
    default_domain: Option<String>,
}

impl<C: Connector> TenantFrontend<C> {
    /// `default_domain` is the platform domain whose single-label subdomains
    /// are storefront slugs.
    #[must_use]
    pub fn new(resolver: Arc<TenantResolver<C>>, default_domain: Option<String>) -> Self {
        let default_domain = default_domain
            .map(|d| d.trim().trim_end_matches('.').to_ascii_lowercase())
            .filter(|d| !d.is_empty());
        Self {
            resolver,
            default_domain,
        }
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<TenantResolver<C>> {
        &self.resolver
    }

    /// Resolve a request to its tenant, or `None` if no strategy matches.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an unparseable ID or slug hint, and any resolver
    /// error from the matching strategy.
    pub async fn resolve(
        &self,
        hints: &RequestHints,
        cancel: &CancellationToken,
    ) -> Result<Option<Resolution>, ResolverError> {
        let Some((storefront, strategy)) = self.find_storefront(hints, cancel).await? else {
            debug!("No storefront matched request");
            return Ok(None);
        };
        let context = self.resolver.build_context(&storefront, cancel).await;
        debug!(
            storefront_id = %context.storefront_id,
            strategy = %strategy,
            tier = %context.isolation_tier,
            "Resolved tenant"
        );
        Ok(Some(Resolution {
            storefront,
            context,
            strategy,
        }))
    }

    async fn find_storefront(
        &self,
        hints: &RequestHints,
        cancel: &CancellationToken,
    ) -> Result<Option<(Arc<Storefront>, Strategy)>, ResolverError> {
        if let Some(raw) = &hints.storefront_id {
            let id: StorefrontId = raw.parse().map_err(|e| {
                ResolverError::InvalidInput(format!("{STOREFRONT_ID_HEADER}: {e}"))
            })?;
            if let Some(found) = self.resolver.get_by_id(id, cancel).await? {
                return Ok(Some((found, Strategy::IdHeader)));
            }
        }

        if let Some(raw) = &hints.storefront_slug {
            let slug = parse_slug(STOREFRONT_SLUG_HEADER, raw)?;
            if let Some(found) = self.resolver.get_by_slug(&slug, cancel).await? {
                return Ok(Some((found, Strategy::SlugHeader)));
            }
        }

        let host = hints.host.as_deref().map(strip_port).filter(|h| !h.is_empty());
        if let Some(host) = host.as_deref().filter(|h| !is_local(h)) {
            if let Some(label) = self.subdomain_label(host) {
                let slug = parse_slug("subdomain", label)?;
                if let Some(found) = self.resolver.get_by_slug(&slug, cancel).await? {
                    return Ok(Some((found, Strategy::Subdomain)));
                }
            }

            if self.default_domain.as_deref() != Some(host)
                && let Some(found) = self.resolver.get_by_domain(host, cancel).await?
            {
                return Ok(Some((found, Strategy::CustomDomain)));
            }
        }

        if let Some(raw) = path_slug(&hints.path) {
            let slug = parse_slug("path", raw)?;
            if let Some(found) = self.resolver.get_by_slug(&slug, cancel).await? {
                return Ok(Some((found, Strategy::Path)));
            }
        }

        if let Some(raw) = hints.query.as_deref().and_then(query_slug) {
            let slug = parse_slug(STOREFRONT_SLUG_PARAM, &raw)?;
            if let Some(found) = self.resolver.get_by_slug(&slug, cancel).await? {
                return Ok(Some((found, Strategy::Query)));
            }
        }

        Ok(None)
    }

    /// `acme` for `acme.shop.io` when the platform domain is `shop.io`.
    fn subdomain_label<'h>(&self, host: &'h str) -> Option<&'h str> {
        let domain = self.default_domain.as_deref()?;
        let prefix = host.strip_suffix(domain)?.strip_suffix('.')?;
        (!prefix.is_empty() && !prefix.contains('.')).then_some(prefix)
    }
}

fn parse_slug(source: &str, raw: &str) -> Result<Slug, ResolverError> {
    Slug::parse(raw).map_err(|e| ResolverError::InvalidInput(format!("{source}: {e}")))
}

/// Lowercased host without any `:port` suffix. Bracketed IPv6 keeps its
/// brackets.
fn strip_port(host: &str) -> String {
    let host = host.trim();
    let bare = if host.starts_with('[') {
        host.find(']').and_then(|end| host.get(..=end)).unwrap_or(host)
    } else {
        host.rsplit_once(':').map_or(host, |(name, _)| name)
    };
    bare.trim_end_matches('.').to_ascii_lowercase()
}

fn is_local(host: &str) -> bool {
    host == "localhost" || host.ends_with(".localhost")
}

fn path_slug(path: &str) -> Option<&str> {
    let segments: Vec<&str> = path.split('/').collect();
    segments.windows(2).find_map(|pair| match pair {
        [marker, slug] if PATH_MARKERS.contains(marker) && !slug.is_empty() => Some(*slug),
        _ => None,
    })
}

fn query_slug(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == STOREFRONT_SLUG_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}
