use serde::{Deserialize, Serialize};

/// Best-effort IP geolocation record, as returned by ip-api.com.
///
/// Stored as JSON text next to messages and visits. Every field is optional;
/// a lookup that produced nothing useful is stored as NULL instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    #[serde(default, rename = "as", skip_serializing_if = "Option::is_none")]
    pub asn: Option<String>,
}

impl Geo {
    pub fn is_empty(&self) -> bool {
        self.country.is_none()
            && self.region_name.is_none()
            && self.city.is_none()
            && self.isp.is_none()
            && self.org.is_none()
            && self.asn.is_none()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".into())
    }
}
