/* src/gate.rs */

/// Deployment environment, read from `APP_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeployEnvironment {
    Development,
    Preview,
    #[default]
    Production,
}

impl DeployEnvironment {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => DeployEnvironment::Development,
            "preview" => DeployEnvironment::Preview,
            _ => DeployEnvironment::Production,
        }
    }
}

/// Decides whether a request reaches the limiter at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gate {
    pub environment: DeployEnvironment,
    pub force_enable: bool,
    pub force_disable: bool,
    pub safe_list: Vec<String>,
}

impl Gate {
    pub fn new(environment: DeployEnvironment) -> Self {
        Self {
            environment,
            ..Self::default()
        }
    }

    pub fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            environment: lookup("APP_ENV")
                .map(|value| DeployEnvironment::parse(&value))
                .unwrap_or_default(),
            force_enable: lookup("RATE_LIMIT_ENABLED").is_some_and(|v| is_truthy(&v)),
            force_disable: lookup("RATE_LIMIT_DISABLED").is_some_and(|v| is_truthy(&v)),
            safe_list: lookup("RATE_LIMIT_SAFE_LIST")
                .map(|list| parse_safe_list(&list))
                .unwrap_or_default(),
        }
    }

    pub fn with_safe_list(mut self, list: &str) -> Self {
        self.safe_list = parse_safe_list(list);
        self
    }

    pub fn force_enable(mut self, force_enable: bool) -> Self {
        self.force_enable = force_enable;
        self
    }

    pub fn force_disable(mut self, force_disable: bool) -> Self {
        self.force_disable = force_disable;
        self
    }

    /// Opt-in during development, opt-out everywhere else.
    pub fn is_rate_limiting_enabled(&self) -> bool {
        match self.environment {
            DeployEnvironment::Development => self.force_enable,
            DeployEnvironment::Preview | DeployEnvironment::Production => !self.force_disable,
        }
    }

    /// Preview deployments also let loopback callers through, without touching `safe_list`.
    pub fn is_ip_safe_listed(&self, ip: &str) -> bool {
        if self.safe_list.iter().any(|entry| entry == "*" || entry == ip) {
            return true;
        }
        self.environment == DeployEnvironment::Preview && matches!(ip, "127.0.0.1" | "localhost")
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

fn parse_safe_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
