//! Robots.txt parser implementation
//!
//! The body is tokenized once per origin by the robotstxt crate's parser and
//! the rules of the groups that apply to our agent are kept. URL checks then
//! use the crate's longest-match strategy against those rules without
//! re-reading the body. Crawl-delay, which the crate reports as an unknown
//! directive, is captured in the same pass.

use robotstxt::matcher::{LongestMatchRobotsMatchStrategy, RobotsMatchStrategy};
use robotstxt::{get_path_params_query, parse_robotstxt, RobotsParseHandler};
use std::time::Duration;
use url::Url;

/// Longest crawl delay accepted from a robots.txt, in seconds
const MAX_CRAWL_DELAY_SECS: f64 = 86_400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    Allow,
    Disallow,
}

#[derive(Debug, Clone)]
struct Rule {
    directive: Directive,
    pattern: String,
}

/// Rules collected from every group of one kind (our agent, or `*`)
#[derive(Debug, Clone, Default)]
struct RuleSet {
    rules: Vec<Rule>,
    crawl_delay: Option<f64>,
}

impl RuleSet {
    /// Highest allow and disallow match priorities for a path; -1 when nothing matches
    fn priorities(&self, path: &str) -> (i32, i32) {
        let mut allow = -1;
        let mut disallow = -1;
        for rule in &self.rules {
            match rule.directive {
                Directive::Allow => allow = allow.max(allow_priority(path, &rule.pattern)),
                Directive::Disallow => disallow = disallow.max(match_priority(path, &rule.pattern)),
            }
        }
        (allow, disallow)
    }

    /// Returns the verdict when a rule in this set matched the path
    fn verdict(&self, path: &str) -> Option<bool> {
        let (allow, disallow) = self.priorities(path);
        if allow > 0 || disallow > 0 {
            Some(disallow <= allow)
        } else {
            None
        }
    }
}

/// Parsed robots.txt data for one origin and one user agent
#[derive(Debug, Clone, Default)]
pub struct ParsedRobots {
    /// Rules from groups naming the agent
    specific: RuleSet,

    /// Rules from `*` groups
    global: RuleSet,

    /// True if any group named the agent, even one without rules
    names_agent: bool,
}

impl ParsedRobots {
    /// Parses raw robots.txt content for the given user agent token
    ///
    /// # Arguments
    ///
    /// * `content` - The robots.txt body
    /// * `agent` - The product token of the crawler (e.g. "SiteIndexer")
    pub fn parse(content: &str, agent: &str) -> Self {
        let mut collector = RuleCollector {
            agent,
            robots: Self::default(),
            in_global: false,
            in_specific: false,
            seen_separator: false,
        };
        parse_robotstxt(content, &mut collector);
        collector.robots
    }

    /// Creates a permissive ParsedRobots that allows everything
    ///
    /// This is used when robots.txt cannot be fetched or returns a non-success status.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Checks if a URL is allowed
    ///
    /// Rules of a group naming the agent take precedence; `*` groups only
    /// apply when no group names it.
    pub fn is_allowed(&self, url: &Url) -> bool {
        let path = get_path_params_query(url.as_str());
        if let Some(allowed) = self.specific.verdict(&path) {
            return allowed;
        }
        if self.names_agent {
            return true;
        }
        self.global.verdict(&path).unwrap_or(true)
    }

    /// Gets the crawl delay that applies to the agent
    ///
    /// A group naming the agent wins over the `*` group.
    pub fn crawl_delay(&self) -> Option<Duration> {
        self.specific
            .crawl_delay
            .or(self.global.crawl_delay)
            .map(Duration::from_secs_f64)
    }
}

/// Collects the rules that apply to one agent while the body is parsed
struct RuleCollector<'a> {
    agent: &'a str,
    robots: ParsedRobots,
    in_global: bool,
    in_specific: bool,
    seen_separator: bool,
}

impl RuleCollector<'_> {
    fn current_group(&mut self) -> Option<&mut RuleSet> {
        if self.in_specific {
            Some(&mut self.robots.specific)
        } else if self.in_global {
            Some(&mut self.robots.global)
        } else {
            None
        }
    }

    fn push(&mut self, directive: Directive, pattern: &str) {
        if !self.in_specific && !self.in_global {
            return;
        }
        self.seen_separator = true;
        if let Some(group) = self.current_group() {
            group.rules.push(Rule {
                directive,
                pattern: pattern.to_string(),
            });
        }
    }
}

impl RobotsParseHandler for RuleCollector<'_> {
    fn handle_robots_start(&mut self) {}

    fn handle_robots_end(&mut self) {}

    fn handle_user_agent(&mut self, _line_num: u32, user_agent: &str) {
        // A rule line ends the previous group's run of user-agent lines
        if self.seen_separator {
            self.in_global = false;
            self.in_specific = false;
            self.seen_separator = false;
        }

        let wildcard = user_agent.starts_with('*')
            && (user_agent.len() == 1 || user_agent[1..].starts_with(char::is_whitespace));
        if wildcard {
            self.in_global = true;
        } else if product_token(user_agent).eq_ignore_ascii_case(self.agent) {
            self.in_specific = true;
            self.robots.names_agent = true;
        }
    }

    fn handle_allow(&mut self, _line_num: u32, value: &str) {
        self.push(Directive::Allow, value);
    }

    fn handle_disallow(&mut self, _line_num: u32, value: &str) {
        self.push(Directive::Disallow, value);
    }

    fn handle_sitemap(&mut self, _line_num: u32, _value: &str) {
        self.seen_separator = true;
    }

    fn handle_unknown_action(&mut self, _line_num: u32, action: &str, value: &str) {
        self.seen_separator = true;
        if !action.eq_ignore_ascii_case("crawl-delay") {
            return;
        }
        let Ok(delay) = value.parse::<f64>() else {
            return;
        };
        if !delay.is_finite() || !(0.0..=MAX_CRAWL_DELAY_SECS).contains(&delay) {
            return;
        }
        if let Some(group) = self.current_group() {
            group.crawl_delay.get_or_insert(delay);
        }
    }
}

/// Matchable part of a user-agent line: "Googlebot/2.1" becomes "Googlebot"
fn product_token(user_agent: &str) -> &str {
    match user_agent.find(|c: char| !(c.is_ascii_alphabetic() || c == '-' || c == '_')) {
        Some(end) => &user_agent[..end],
        None => user_agent,
    }
}

fn match_priority(path: &str, pattern: &str) -> i32 {
    if LongestMatchRobotsMatchStrategy::matches(path, pattern) {
        pattern.len() as i32
    } else {
        -1
    }
}

fn allow_priority(path: &str, pattern: &str) -> i32 {
    let priority = match_priority(path, pattern);
    if priority >= 0 {
        return priority;
    }
    // Allowing /dir/index.html also allows /dir/
    match pattern.rfind('/') {
        Some(slash) if pattern[slash..].starts_with("/index.htm") => {
            match_priority(path, &format!("{}$", &pattern[..=slash]))
        }
        _ => -1,
    }
}
