use std::net::IpAddr;

use tracing::debug;

use folio_types::models::Geo;

const LOOKUP_FIELDS: &str = "country,regionName,city,isp,org,as";

/// Best-effort IP geolocation against an ip-api.com compatible endpoint.
///
/// Lookups never fail the caller: any error, non-2xx status or empty payload
/// yields `None`. Private and loopback addresses are never looked up.
#[derive(Clone)]
pub struct GeoLocator {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl GeoLocator {
    pub fn new(client: reqwest::Client, base_url: Option<String>) -> Self {
        Self { client, base_url }
    }

    pub fn disabled() -> Self {
        Self::new(reqwest::Client::new(), None)
    }

    pub async fn lookup(&self, ip: &str) -> Option<Geo> {
        let base = self.base_url.as_deref()?;
        let addr: IpAddr = ip.parse().ok()?;
        if !is_public(addr) {
            return None;
        }

        let url = format!("{}/{}?fields={}", base.trim_end_matches('/'), addr, LOOKUP_FIELDS);
        let resp = match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                debug!(status = %resp.status(), "Geo lookup rejected for {}", addr);
                return None;
            }
            Err(e) => {
                debug!("Geo lookup failed for {}: {}", addr, e);
                return None;
            }
        };

        match resp.json::<Geo>().await {
            Ok(geo) if !geo.is_empty() => Some(geo),
            Ok(_) => None,
            Err(e) => {
                debug!("Unreadable geo payload for {}: {}", addr, e);
                None
            }
        }
    }
}

fn is_public(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation())
        }
        IpAddr::V6(v6) => !(v6.is_loopback() || v6.is_unspecified()),
    }
}
