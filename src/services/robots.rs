use reqwest::Client;
use robots_txt::{matcher::SimpleMatcher, Robots};
use tracing::{debug, info, warn};
use url::Url;

/// robots.txt rules for one origin. The raw text is kept and parsed on each check.
#[derive(Debug, Clone, Default)]
pub struct RobotsTxt {
    robots_text: Option<String>,
}

impl RobotsTxt {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            robots_text: Some(text.into()),
        }
    }

    /// Fetches `/robots.txt` for the origin of `target_url`.
    ///
    /// A missing or unreachable file allows everything.
    pub async fn fetch(client: &Client, target_url: &Url) -> Self {
        let robots_url = match target_url.join("/robots.txt") {
            Ok(url) => url,
            Err(e) => {
                warn!("Cannot build robots.txt URL for {}: {}", target_url, e);
                return Self::default();
            }
        };

        info!("Fetching robots.txt from: {}", robots_url);

        match client.get(robots_url.clone()).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(text) => {
                    debug!("robots.txt content for {}:\n{}", robots_url, text);
                    Self::from_text(text)
                }
                Err(e) => {
                    warn!("Failed to read robots.txt body from {}: {}", robots_url, e);
                    Self::default()
                }
            },
            Ok(response) => {
                warn!(
                    "No robots.txt at {}: HTTP {}",
                    robots_url,
                    response.status()
                );
                Self::default()
            }
            Err(e) => {
                warn!("Error fetching robots.txt from {}: {}", robots_url, e);
                Self::default()
            }
        }
    }

    pub fn is_allowed(&self, url: &Url, user_agent: &str) -> bool {
        let Some(text) = &self.robots_text else {
            return true;
        };

        let robots = Robots::from_str_lossy(text);
        let section = robots.choose_section(user_agent);
        let matcher = SimpleMatcher::new(&section.rules);

        matcher.check_path(url.path())
    }
}
