//! robots.txt rules as the HTTP adapter applies them.
//!
//! Only `User-agent`, `Allow` and `Disallow` lines matter here. The group
//! naming our agent wins over the `*` group; within a group the longest
//! matching pattern decides and `Allow` wins a tie. Patterns support `*` and a
//! trailing `$`.

/// Path rules of the group that applies to one user agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsRules {
    rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Rule {
    allow: bool,
    pattern: String,
}

#[derive(Default)]
struct Group {
    agents: Vec<String>,
    rules: Vec<Rule>,
}

impl RobotsRules {
    /// No rules: every path is allowed.
    #[must_use]
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parses a robots.txt body for `agent` (the product token of our
    /// user agent, matched case-insensitively).
    #[must_use]
    pub fn parse(body: &str, agent: &str) -> Self {
        let agent = agent.to_ascii_lowercase();
        let mut groups: Vec<Group> = Vec::new();
        let mut current = Group::default();
        let mut in_rules = false;

        for line in body.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim().to_ascii_lowercase().as_str() {
                "user-agent" => {
                    if in_rules {
                        groups.push(std::mem::take(&mut current));
                        in_rules = false;
                    }
                    current.agents.push(value.to_ascii_lowercase());
                }
                "allow" | "disallow" => {
                    in_rules = true;
                    // An empty Disallow allows everything; no rule needed.
                    if !value.is_empty() {
                        current.rules.push(Rule {
                            allow: key.trim().eq_ignore_ascii_case("allow"),
                            pattern: value.to_string(),
                        });
                    }
                }
                _ => {}
            }
        }
        groups.push(current);

        let named: Vec<Rule> = groups
            .iter()
            .filter(|g| {
                g.agents
                    .iter()
                    .any(|a| a != "*" && !a.is_empty() && agent.contains(a.as_str()))
            })
            .flat_map(|g| g.rules.iter().cloned())
            .collect();
        let rules = if named.is_empty() {
            groups
                .iter()
                .filter(|g| g.agents.iter().any(|a| a == "*"))
                .flat_map(|g| g.rules.iter().cloned())
                .collect()
        } else {
            named
        };
        Self { rules }
    }

    /// Whether `path` (path plus optional `?query`) may be fetched.
    #[must_use]
    pub fn allows(&self, path: &str) -> bool {
        self.rules
            .iter()
            .filter(|rule| pattern_matches(&rule.pattern, path))
            .max_by_key(|rule| (rule.pattern.len(), rule.allow))
            .map_or(true, |rule| rule.allow)
    }
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(stripped) => (stripped, true),
        None => (pattern, false),
    };
    let mut pieces = pattern.split('*');
    let first = pieces.next().unwrap_or_default();
    let Some(mut rest) = path.strip_prefix(first) else {
        return false;
    };
    let pieces: Vec<&str> = pieces.collect();
    for (i, piece) in pieces.iter().enumerate() {
        if anchored && i + 1 == pieces.len() {
            return rest.ends_with(piece);
        }
        match rest.find(piece) {
            Some(pos) => rest = &rest[pos + piece.len()..],
            None => return false,
        }
    }
    !anchored || rest.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROBOTS: &str = "\
# storefront rules
User-agent: *
Disallow: /zoeken
Disallow: /producten/product-detail
Allow: /producten/

User-agent: shelfprobe
User-agent: otherbot
Disallow: /producten/olie
Allow: /producten/olie/azijn
";

    #[test]
    fn named_group_replaces_wildcard_group() {
        let rules = RobotsRules::parse(ROBOTS, "shelfprobe");
        assert!(!rules.allows("/producten/olie"));
        assert!(rules.allows("/producten/olie/azijn"));
        // Wildcard rules do not apply once a named group matched.
        assert!(rules.allows("/zoeken?q=olie"));
    }

    #[test]
    fn wildcard_group_applies_to_unnamed_agents() {
        let rules = RobotsRules::parse(ROBOTS, "somebot");
        assert!(!rules.allows("/zoeken?q=olie"));
        assert!(!rules.allows("/producten/product-detail/123"));
        assert!(rules.allows("/producten/olie"));
        assert!(rules.allows("/"));
    }

    #[test]
    fn longest_match_wins_and_allow_wins_ties() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow: /a\nAllow: /a/b\n", "x");
        assert!(!rules.allows("/a/c"));
        assert!(rules.allows("/a/b/c"));
        let tie = RobotsRules::parse("User-agent: *\nDisallow: /p\nAllow: /p\n", "x");
        assert!(tie.allows("/p"));
    }

    #[test]
    fn wildcards_and_end_anchor() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow: /*?sort=\nDisallow: /*.pdf$\n", "x");
        assert!(!rules.allows("/olie?sort=price"));
        assert!(!rules.allows("/folder/flyer.pdf"));
        assert!(rules.allows("/folder/flyer.pdf?download=1"));
        assert!(rules.allows("/olie"));
    }

    #[test]
    fn empty_disallow_and_empty_body_allow_everything() {
        assert!(RobotsRules::parse("User-agent: *\nDisallow:\n", "x").allows("/any"));
        assert!(RobotsRules::parse("", "x").allows("/any"));
        assert!(RobotsRules::allow_all().allows("/any"));
    }
}
