//! Robots.txt parser implementation
//!
//! Allow/deny evaluation is delegated to the robotstxt crate. The report
//! also needs the raw directives of the group that applies to us, which
//! the crate does not expose, so those are read with a small line scanner.

use robotstxt::DefaultMatcher;

/// Parsed robots.txt data
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    content: String,
}

/// Directives of the robots.txt group that applies to one user agent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupDirectives {
    /// Non-empty `Disallow` paths in file order
    pub disallow: Vec<String>,

    /// `Crawl-delay` in seconds, if declared
    pub crawl_delay: Option<f64>,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - The absolute URL to check
    /// * `user_agent` - The user agent string; only its product token is matched
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Returns the directives that apply to `user_agent`
    ///
    /// A group naming the agent's product token takes precedence over the
    /// `*` group. Consecutive `User-agent` lines share one group.
    pub fn directives_for(&self, user_agent: &str) -> GroupDirectives {
        let token = product_token(user_agent).to_lowercase();

        let mut specific: Option<GroupDirectives> = None;
        let mut wildcard: Option<GroupDirectives> = None;

        let mut agents: Vec<String> = Vec::new();
        let mut in_rules = false;
        let mut current = GroupDirectives::default();

        let mut close_group = |agents: &mut Vec<String>, current: &mut GroupDirectives| {
            let group = std::mem::take(current);
            if !token.is_empty() && agents.iter().any(|a| *a == token) {
                specific.get_or_insert(group);
            } else if agents.iter().any(|a| a == "*") {
                wildcard.get_or_insert(group);
            }
            agents.clear();
        };

        for line in self.content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    if in_rules {
                        close_group(&mut agents, &mut current);
                        in_rules = false;
                    }
                    agents.push(value.to_lowercase());
                }
                "disallow" => {
                    in_rules = true;
                    if !value.is_empty() {
                        current.disallow.push(value.to_string());
                    }
                }
                "crawl-delay" => {
                    in_rules = true;
                    if let Ok(delay) = value.parse::<f64>() {
                        current.crawl_delay = Some(delay);
                    }
                }
                _ => in_rules = true,
            }
        }
        close_group(&mut agents, &mut current);

        specific.or(wildcard).unwrap_or_default()
    }
}

/// The product token of a user agent string: `Mozilla/5.0 (...)` → `Mozilla`
fn product_token(user_agent: &str) -> &str {
    let end = user_agent
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(user_agent.len());
    &user_agent[..end]
}
