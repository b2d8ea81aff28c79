use crate::RuntimeError;
use serde::Deserialize;
use std::io::Read;
use tracing::debug;

const DOCKER_HUB_API: &str = "https://hub.docker.com/v2/repositories";
const PAGE_SIZE: u32 = 100;
const MAX_PAGES: usize = 50;

/// Lists the tags published for an image repository.
pub trait TagLister {
    fn list_tags(&self, repository: &str) -> Result<Vec<String>, RuntimeError>;
}

/// Docker Hub tag listing.
///
/// Makes no retries: a transport failure aborts with [`RuntimeError::Unreachable`]
/// naming the endpoint.
pub struct DockerHubTags {
    api: String,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct TagPage {
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    results: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

impl Default for DockerHubTags {
    fn default() -> Self {
        Self::new(DOCKER_HUB_API)
    }
}

impl DockerHubTags {
    pub fn new(api: &str) -> Self {
        Self {
            api: api.trim_end_matches('/').to_owned(),
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    /// Official images live under `library/`.
    fn repository_path(repository: &str) -> String {
        if repository.contains('/') {
            repository.to_owned()
        } else {
            format!("library/{repository}")
        }
    }

    fn fetch_page(&self, url: &str) -> Result<TagPage, RuntimeError> {
        debug!("GET {url}");
        let resp = match self.agent.get(url).call() {
            Ok(r) => r,
            Err(ureq::Error::StatusCode(404)) => {
                return Err(RuntimeError::NotFound(url.to_owned()));
            }
            Err(ureq::Error::StatusCode(code)) => {
                return Err(RuntimeError::Http(format!("HTTP {code} for {url}")));
            }
            Err(e) => {
                return Err(RuntimeError::Unreachable {
                    endpoint: url.to_owned(),
                    reason: e.to_string(),
                });
            }
        };
        let mut body = Vec::new();
        resp.into_body()
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| RuntimeError::Unreachable {
                endpoint: url.to_owned(),
                reason: e.to_string(),
            })?;
        serde_json::from_slice(&body)
            .map_err(|e| RuntimeError::Serialization(format!("invalid tag listing: {e}")))
    }
}

impl TagLister for DockerHubTags {
    fn list_tags(&self, repository: &str) -> Result<Vec<String>, RuntimeError> {
        let mut url = Some(format!(
            "{}/{}/tags?page_size={PAGE_SIZE}",
            self.api,
            Self::repository_path(repository)
        ));
        let mut tags = Vec::new();
        let mut pages = 0;
        while let Some(current) = url.take() {
            let page = self.fetch_page(&current)?;
            tags.extend(page.results.into_iter().map(|t| t.name));
            pages += 1;
            if pages >= MAX_PAGES {
                debug!("stopping tag listing for {repository} after {pages} pages");
                break;
            }
            url = page.next.filter(|n| !n.is_empty());
        }
        tags.sort();
        tags.dedup();
        Ok(tags)
    }
}
