//! Query parameters for the document export endpoint and their wire form.

use tracing::debug;
use url::Url;

use crate::error::{GdocError, Result};

pub const DATE_FROM: &str = "dateFrom";
pub const DATE_TO: &str = "dateTo";
pub const DUTY_STATION: &str = "dutyStation";
pub const SYMBOL: &str = "symbol";
pub const INCLUDE_FILES: &str = "includeFiles";

/// Filter values sent with the data request.
///
/// Known filters are typed fields. Any other name the remote API accepts is
/// kept verbatim in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub duty_station: Option<String>,
    pub symbol: Option<String>,
    pub include_files: Option<bool>,
    extra: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores or overwrites one filter value.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match name {
            DATE_FROM => self.date_from = Some(value),
            DATE_TO => self.date_to = Some(value),
            DUTY_STATION => self.duty_station = Some(value),
            SYMBOL => self.symbol = Some(value),
            INCLUDE_FILES => self.include_files = Some(parse_flag(&value)),
            other => match self.extra.iter_mut().find(|(key, _)| key == other) {
                Some((_, existing)) => *existing = value,
                None => self.extra.push((other.to_string(), value)),
            },
        }
    }

    /// Set parameters in canonical order: typed filters first, extras after.
    pub fn pairs(&self) -> Vec<(&str, String)> {
        let typed = [
            (DATE_FROM, self.date_from.clone()),
            (DATE_TO, self.date_to.clone()),
            (DUTY_STATION, self.duty_station.clone()),
            (SYMBOL, self.symbol.clone()),
            (INCLUDE_FILES, self.include_files.map(|flag| flag.to_string())),
        ];
        typed
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .chain(self.extra.iter().map(|(k, v)| (k.as_str(), v.clone())))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs().is_empty()
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "y" | "yes" | "1"
    )
}

/// Appends the percent-encoded query string for `params` to `base`.
pub fn build_url(base: &str, params: &QueryParams) -> Result<String> {
    let mut url = Url::parse(base).map_err(|source| GdocError::InvalidUrl {
        url: base.to_string(),
        source,
    })?;
    let pairs = params.pairs();
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
    debug!(url = %url, "Built export query URL");
    Ok(url.into())
}
