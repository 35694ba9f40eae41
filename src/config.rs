/* src/config.rs */

use crate::gate::Gate;
use crate::types::{Duration, RateLimitConfig};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Endpoint categories, each with its own limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Lead,
    Rankings,
    Events,
    Auth,
    Admin,
    Invites,
    InvitesJoin,
    InvitesAction,
    InvitesPreview,
    Default,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Lead,
        Category::Rankings,
        Category::Events,
        Category::Auth,
        Category::Admin,
        Category::Invites,
        Category::InvitesJoin,
        Category::InvitesAction,
        Category::InvitesPreview,
        Category::Default,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Lead => "lead",
            Category::Rankings => "rankings",
            Category::Events => "events",
            Category::Auth => "auth",
            Category::Admin => "admin",
            Category::Invites => "invites",
            Category::InvitesJoin => "invites_join",
            Category::InvitesAction => "invites_action",
            Category::InvitesPreview => "invites_preview",
            Category::Default => "default",
        }
    }

    /// Built-in limits: `(max_requests, burst_allowance)` over one minute.
    pub fn default_rule(&self) -> RateLimitConfig {
        let (max_requests, burst) = match self {
            Category::Lead => (3, 1),
            Category::Rankings => (30, 10),
            Category::Events => (20, 5),
            Category::Auth => (10, 5),
            Category::Admin => (60, 15),
            Category::Invites => (5, 2),
            Category::InvitesJoin => (15, 5),
            Category::InvitesAction => (10, 3),
            Category::InvitesPreview => (8, 2),
            Category::Default => (100, 20),
        };
        RateLimitConfig::new(Duration::millis(60_000), max_requests).with_burst(burst)
    }

    fn env_prefix(&self) -> String {
        format!("RATE_LIMIT_{}", self.as_str().to_ascii_uppercase())
    }

    /// Resolves an inbound path to its category. Paths outside `/api` are never limited.
    pub fn for_path(path: &str) -> Option<Category> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let rest = path.strip_prefix("/api")?;
        if !(rest.is_empty() || rest.starts_with('/')) {
            return None;
        }
        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();

        let category = match segments.as_slice() {
            ["lead", ..] => Category::Lead,
            ["rankings", ..] => Category::Rankings,
            ["events", _, "invite", ..] => Category::Invites,
            ["events", ..] => Category::Events,
            ["auth", ..] => Category::Auth,
            ["admin", ..] => Category::Admin,
            ["invites", "join", ..] => Category::InvitesJoin,
            ["invites", _, "accept" | "decline"] => Category::InvitesAction,
            ["invites", _] => Category::InvitesPreview,
            _ => Category::Default,
        };
        Some(category)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or(())
    }
}

/// Immutable policy handed to the limiter at construction.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    pub rules: HashMap<Category, RateLimitConfig>,
    pub gate: Gate,
    pub sweep_interval: Duration,
    pub retention: Duration,
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::new(Gate::default())
    }
}

impl PolicyTable {
    pub fn new(gate: Gate) -> Self {
        Self {
            rules: Category::ALL
                .into_iter()
                .map(|category| (category, category.default_rule()))
                .collect(),
            gate,
            sweep_interval: Duration::minutes(5),
            retention: Duration::hours(1),
        }
    }

    /// Reads the process environment once.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the table from any key lookup, falling back to defaults field by field.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut table = Self::new(Gate::from_lookup(&lookup));

        for category in Category::ALL {
            let fallback = category.default_rule();
            let prefix = category.env_prefix();
            let window_ms = parse_or(&lookup, &format!("{prefix}_WINDOW_MS"), fallback.window_ms());
            let max_requests =
                parse_or(&lookup, &format!("{prefix}_MAX_REQUESTS"), fallback.max_requests);
            let burst = parse_or(&lookup, &format!("{prefix}_BURST"), fallback.burst_allowance);

            table.rules.insert(
                category,
                RateLimitConfig::new(Duration::millis(window_ms), max_requests).with_burst(burst),
            );
        }

        table
    }

    pub fn with_rule(mut self, category: Category, rule: RateLimitConfig) -> Self {
        self.rules.insert(category, rule);
        self
    }

    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn rule(&self, category: Category) -> RateLimitConfig {
        self.rules
            .get(&category)
            .copied()
            .unwrap_or_else(|| category.default_rule())
    }

    pub fn max_window(&self) -> Duration {
        self.rules
            .values()
            .map(|rule| rule.window)
            .max_by_key(Duration::as_millis)
            .unwrap_or(Duration::minutes(1))
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, fallback: T) -> T
where
    T: FromStr + Copy,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => fallback,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "unparsable rate limit setting, using default");
            fallback
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_default_table_matches_reference_policy() {
        let table = PolicyTable::default();
        let expected = [
            (Category::Lead, 3, 1),
            (Category::Rankings, 30, 10),
            (Category::Events, 20, 5),
            (Category::Auth, 10, 5),
            (Category::Admin, 60, 15),
            (Category::Invites, 5, 2),
            (Category::InvitesJoin, 15, 5),
            (Category::InvitesAction, 10, 3),
            (Category::InvitesPreview, 8, 2),
            (Category::Default, 100, 20),
        ];
        for (category, max_requests, burst) in expected {
            let rule = table.rule(category);
            assert_eq!(rule.window_ms(), 60_000, "{category}");
            assert_eq!(rule.max_requests, max_requests, "{category}");
            assert_eq!(rule.burst_allowance, burst, "{category}");
        }
        assert_eq!(table.sweep_interval.as_millis(), 300_000);
        assert_eq!(table.retention.as_millis(), 3_600_000);
    }

    #[test]
    fn test_env_overrides_and_fallbacks() {
        let table = PolicyTable::from_lookup(lookup_from(&[
            ("RATE_LIMIT_LEAD_WINDOW_MS", "1000"),
            ("RATE_LIMIT_LEAD_MAX_REQUESTS", " 7 "),
            ("RATE_LIMIT_LEAD_BURST", "not-a-number"),
            ("RATE_LIMIT_INVITES_JOIN_MAX_REQUESTS", "42"),
            ("RATE_LIMIT_AUTH_WINDOW_MS", "-5"),
        ]));

        let lead = table.rule(Category::Lead);
        assert_eq!(lead.window_ms(), 1_000);
        assert_eq!(lead.max_requests, 7);
        assert_eq!(lead.burst_allowance, 1);

        assert_eq!(table.rule(Category::InvitesJoin).max_requests, 42);
        assert_eq!(table.rule(Category::Auth).window_ms(), 60_000);
        assert_eq!(table.rule(Category::Default), Category::Default.default_rule());
    }

    #[test]
    fn test_path_dispatch() {
        let cases = [
            ("/api/lead", Some(Category::Lead)),
            ("/api/lead?source=home", Some(Category::Lead)),
            ("/api/rankings/2026", Some(Category::Rankings)),
            ("/api/events", Some(Category::Events)),
            ("/api/events/abc/invite", Some(Category::Invites)),
            ("/api/events/abc/register", Some(Category::Events)),
            ("/api/auth/callback", Some(Category::Auth)),
            ("/api/admin/users", Some(Category::Admin)),
            ("/api/invites/join", Some(Category::InvitesJoin)),
            ("/api/invites/tok123/accept", Some(Category::InvitesAction)),
            ("/api/invites/tok123/decline", Some(Category::InvitesAction)),
            ("/api/invites/tok123", Some(Category::InvitesPreview)),
            ("/api/profile", Some(Category::Default)),
            ("/api", Some(Category::Default)),
            ("/apiary", None),
            ("/events", None),
            ("/", None),
        ];
        for (path, expected) in cases {
            assert_eq!(Category::for_path(path), expected, "{path}");
        }
    }

    #[test]
    fn test_category_names_round_trip() {
        assert_eq!("invites_action".parse::<Category>(), Ok(Category::InvitesAction));
        assert!("unknown".parse::<Category>().is_err());
        assert_eq!(Category::InvitesPreview.env_prefix(), "RATE_LIMIT_INVITES_PREVIEW");
    }

    #[test]
    fn test_builder_overrides() {
        let rule = RateLimitConfig::new(Duration::hours(2), 1);
        let table = PolicyTable::default()
            .with_rule(Category::Admin, rule)
            .with_sweep_interval(Duration::seconds(10))
            .with_retention(Duration::minutes(30));
        assert_eq!(table.rule(Category::Admin), rule);
        assert_eq!(table.max_window(), Duration::hours(2));
        assert_eq!(table.sweep_interval, Duration::seconds(10));
        assert_eq!(table.retention, Duration::minutes(30));
    }
}
