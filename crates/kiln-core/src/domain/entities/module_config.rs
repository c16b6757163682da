//! Typed, per-category module configuration.
//!
//! Each category with well-known knobs gets its own variant; everything else
//! falls back to [`ModuleConfig::Generic`], a flat string map. Configuration
//! never fails on construction. Instead [`ModuleConfig::validate`] returns the
//! full list of problems so a registry can report all of them at once.
//!
//! Configuration values reach generated files as template variables (see
//! [`ModuleConfig::variables`]), layered above descriptor defaults and below
//! request bindings.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::render::is_variable_name;
use crate::domain::value_objects::Category;

/// One problem found while validating a [`ModuleConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigIssue {
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config.{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStrategy {
    #[default]
    Jwt,
    OAuth,
    Session,
}

impl AuthStrategy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Jwt => "jwt",
            Self::OAuth => "oauth",
            Self::Session => "session",
        }
    }
}

/// Tagged configuration, one variant per well-known category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ModuleConfig {
    Auth {
        #[serde(default)]
        strategy: AuthStrategy,
        #[serde(default = "default_token_ttl")]
        token_ttl_secs: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        issuer: Option<String>,
    },
    Payments {
        provider: String,
        #[serde(default = "default_currency")]
        currency: String,
        #[serde(default)]
        webhooks: bool,
    },
    Storage {
        provider: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bucket: Option<String>,
        #[serde(default = "default_max_upload")]
        max_upload_mb: u32,
    },
    Database {
        engine: String,
        #[serde(default = "default_pool_size")]
        pool_size: u32,
        #[serde(default = "default_true")]
        migrations: bool,
    },
    Messaging {
        broker: String,
        #[serde(default)]
        topics: Vec<String>,
    },
    Generic {
        #[serde(default)]
        settings: BTreeMap<String, String>,
    },
}

fn default_token_ttl() -> u32 {
    3600
}

fn default_currency() -> String {
    "USD".into()
}

fn default_max_upload() -> u32 {
    10
}

fn default_pool_size() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self::Generic {
            settings: BTreeMap::new(),
        }
    }
}

impl ModuleConfig {
    /// The default configuration for a category.
    ///
    /// Unknown categories (and uncategorized modules) get an empty
    /// [`ModuleConfig::Generic`].
    pub fn default_for(category: Option<&Category>) -> Self {
        match category.map(Category::as_str) {
            Some("auth") => Self::Auth {
                strategy: AuthStrategy::default(),
                token_ttl_secs: default_token_ttl(),
                issuer: None,
            },
            Some("payments") => Self::Payments {
                provider: "stripe".into(),
                currency: default_currency(),
                webhooks: false,
            },
            Some("storage") => Self::Storage {
                provider: "local".into(),
                bucket: None,
                max_upload_mb: default_max_upload(),
            },
            Some("database") => Self::Database {
                engine: "postgres".into(),
                pool_size: default_pool_size(),
                migrations: true,
            },
            Some("messaging") => Self::Messaging {
                broker: "redis".into(),
                topics: Vec::new(),
            },
            _ => Self::default(),
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth",
            Self::Payments { .. } => "payments",
            Self::Storage { .. } => "storage",
            Self::Database { .. } => "database",
            Self::Messaging { .. } => "messaging",
            Self::Generic { .. } => "generic",
        }
    }

    /// Check every field and return all problems found (empty when valid).
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        match self {
            Self::Auth {
                token_ttl_secs,
                issuer,
                ..
            } => {
                if *token_ttl_secs == 0 {
                    issues.push(ConfigIssue::new("token_ttl_secs", "must be greater than 0"));
                }
                if issuer.as_deref().is_some_and(|i| i.trim().is_empty()) {
                    issues.push(ConfigIssue::new("issuer", "cannot be blank when set"));
                }
            }
            Self::Payments {
                provider, currency, ..
            } => {
                require_non_blank(&mut issues, "provider", provider);
                if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
                    issues.push(ConfigIssue::new(
                        "currency",
                        format!("'{currency}' is not a three-letter ISO code"),
                    ));
                }
            }
            Self::Storage {
                provider,
                bucket,
                max_upload_mb,
            } => {
                require_non_blank(&mut issues, "provider", provider);
                if provider != "local" && bucket.is_none() {
                    issues.push(ConfigIssue::new(
                        "bucket",
                        format!("required for provider '{provider}'"),
                    ));
                }
                if *max_upload_mb == 0 {
                    issues.push(ConfigIssue::new("max_upload_mb", "must be greater than 0"));
                }
            }
            Self::Database {
                engine, pool_size, ..
            } => {
                require_non_blank(&mut issues, "engine", engine);
                if !(1..=1000).contains(pool_size) {
                    issues.push(ConfigIssue::new("pool_size", "must be between 1 and 1000"));
                }
            }
            Self::Messaging { broker, topics } => {
                require_non_blank(&mut issues, "broker", broker);
                for (i, topic) in topics.iter().enumerate() {
                    if topic.trim().is_empty() {
                        issues.push(ConfigIssue::new(format!("topics[{i}]"), "cannot be blank"));
                    }
                }
            }
            Self::Generic { settings } => {
                for key in settings.keys() {
                    if !is_variable_name(key) {
                        issues.push(ConfigIssue::new(
                            format!("settings.{key}"),
                            "is not a valid variable name",
                        ));
                    }
                }
            }
        }
        issues
    }

    /// Template variables contributed by this configuration.
    pub fn variables(&self) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        let mut put = |k: &str, v: String| {
            vars.insert(k.to_string(), v);
        };
        match self {
            Self::Auth {
                strategy,
                token_ttl_secs,
                issuer,
            } => {
                put("AUTH_STRATEGY", strategy.as_str().into());
                put("AUTH_TOKEN_TTL_SECS", token_ttl_secs.to_string());
                if let Some(issuer) = issuer {
                    put("AUTH_ISSUER", issuer.clone());
                }
            }
            Self::Payments {
                provider,
                currency,
                webhooks,
            } => {
                put("PAYMENT_PROVIDER", provider.clone());
                put("PAYMENT_CURRENCY", currency.clone());
                put("PAYMENT_WEBHOOKS", webhooks.to_string());
            }
            Self::Storage {
                provider,
                bucket,
                max_upload_mb,
            } => {
                put("STORAGE_PROVIDER", provider.clone());
                put("STORAGE_MAX_UPLOAD_MB", max_upload_mb.to_string());
                if let Some(bucket) = bucket {
                    put("STORAGE_BUCKET", bucket.clone());
                }
            }
            Self::Database {
                engine,
                pool_size,
                migrations,
            } => {
                put("DATABASE_ENGINE", engine.clone());
                put("DATABASE_POOL_SIZE", pool_size.to_string());
                put("DATABASE_MIGRATIONS", migrations.to_string());
            }
            Self::Messaging { broker, topics } => {
                put("MESSAGING_BROKER", broker.clone());
                put("MESSAGING_TOPICS", topics.join(","));
            }
            Self::Generic { settings } => {
                for (k, v) in settings {
                    put(k, v.clone());
                }
            }
        }
        vars
    }
}

fn require_non_blank(issues: &mut Vec<ConfigIssue>, field: &str, value: &str) {
    if value.trim().is_empty() {
        issues.push(ConfigIssue::new(field, "cannot be blank"));
    }
}
