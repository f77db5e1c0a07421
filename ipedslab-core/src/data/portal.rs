//! Education Data Portal client.
//!
//! Queries `{base}/{endpoint}?unitid=..&year=..` and follows the `next` links
//! of the paginated response. Errors are returned to the caller, which logs
//! and skips; there are no retries.

use super::provider::{DataError, Endpoint, RawRecord, SurveyApi};
use crate::domain::{AcademicYear, UnitId};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://educationdata.urban.org/api/v1/college-university/ipeds";

/// One page of results.
#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    results: Vec<RawRecord>,
    #[serde(default)]
    next: Option<String>,
}

/// Blocking client for the Education Data Portal.
pub struct EducationDataPortal {
    client: reqwest::blocking::Client,
    base_url: String,
    max_pages: usize,
}

impl EducationDataPortal {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        max_pages: usize,
    ) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ipedslab/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_pages: max_pages.max(1),
        })
    }

    /// Default portal: public base URL, 30 second timeout, 20 pages max.
    pub fn default_portal() -> Result<Self, DataError> {
        Self::new(DEFAULT_BASE_URL, Duration::from_secs(30), 20)
    }

    pub fn endpoint_url(&self, endpoint: Endpoint) -> String {
        format!("{}/{}", self.base_url, endpoint.path())
    }

    fn get_page(
        &self,
        request: reqwest::blocking::RequestBuilder,
        context: &str,
    ) -> Result<Page, DataError> {
        let resp = request.send().map_err(|e| classify(e, context))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::HttpStatus {
                status: status.as_u16(),
                context: context.to_string(),
            });
        }

        resp.json::<Page>().map_err(|e| {
            DataError::ResponseFormat(format!("failed to parse response for {context}: {e}"))
        })
    }
}

fn classify(e: reqwest::Error, context: &str) -> DataError {
    if e.is_timeout() {
        DataError::Timeout(context.to_string())
    } else {
        DataError::Network(format!("{context}: {e}"))
    }
}

impl SurveyApi for EducationDataPortal {
    fn name(&self) -> &str {
        "education_data_portal"
    }

    fn fetch(
        &self,
        endpoint: Endpoint,
        unit_id: UnitId,
        year: AcademicYear,
    ) -> Result<Vec<RawRecord>, DataError> {
        let context = format!("{} for {unit_id} in {year}", endpoint.path());
        let first = self.client.get(self.endpoint_url(endpoint)).query(&[
            ("unitid", unit_id.get().to_string()),
            ("year", year.get().to_string()),
        ]);

        let mut page = self.get_page(first, &context)?;
        let mut results = std::mem::take(&mut page.results);
        let mut pages = 1;

        while let Some(next) = page.next.take() {
            if pages >= self.max_pages {
                tracing::warn!(%unit_id, %year, pages, "page cap reached; truncating results");
                break;
            }
            page = self.get_page(self.client.get(&next), &context)?;
            results.append(&mut page.results);
            pages += 1;
        }

        tracing::debug!(
            %unit_id,
            %year,
            endpoint = endpoint.path(),
            rows = results.len(),
            "fetched"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_urls_strip_trailing_slash() {
        let portal =
            EducationDataPortal::new("http://localhost:9/api/", Duration::from_secs(1), 0).unwrap();
        assert_eq!(
            portal.endpoint_url(Endpoint::AcademicLibraries),
            "http://localhost:9/api/academic-libraries"
        );
        assert_eq!(portal.max_pages, 1);
    }

    #[test]
    fn page_tolerates_missing_fields() {
        let page: Page = serde_json::from_str(r#"{"count": 0}"#).unwrap();
        assert!(page.results.is_empty());
        assert!(page.next.is_none());

        let page: Page = serde_json::from_str(
            r#"{"results": [{"unitid": 156189, "fte": 1200}], "next": null}"#,
        )
        .unwrap();
        assert_eq!(page.results.len(), 1);
    }
}
