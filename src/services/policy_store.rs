//! Policy store: loads and hot-reloads the Markdown rule document.
//!
//! The current [`PolicyBundle`] lives behind an `Arc` that is swapped as a
//! whole on reload. Readers clone the `Arc` once per request and never see a
//! partially updated rule set; the write lock is held only for the swap
//! itself, after the new bundle has been parsed.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{PolicyBundle, Rule, RuleAction, RuleKind};

static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(#{1,6})\s+(.+?)\s*#*\s*$").expect("heading regex is valid")
});

static LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[-*+]|\d+[.)])\s+(.*)$").expect("list item regex is valid")
});

static ACTION_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[\s*([A-Za-z_]+)\s*(?::\s*([^\]]*?))?\s*\]\]").expect("action tag regex is valid")
});

const HARD_HEADINGS: &[&str] = &["hard constraint", "constraint", "红线", "硬约束", "禁止"];
const SOFT_HEADINGS: &[&str] = &["guideline", "soft", "建议", "准则"];
const IDENTITY_HEADINGS: &[&str] = &["identity", "persona", "身份", "角色"];

/// Notification published whenever a reload is attempted and something
/// happened (a new bundle was swapped in, or the document failed to parse).
#[derive(Debug, Clone, Serialize)]
pub struct PolicyReloadEvent {
    pub content_hash: String,
    pub rule_count: usize,
    pub changed: bool,
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

/// Process-wide holder of the active policy.
pub struct PolicyStore {
    path: PathBuf,
    current: RwLock<Arc<PolicyBundle>>,
    /// Hash and reason of the last document that failed to parse.
    rejected: Mutex<Option<(String, String)>>,
    events: broadcast::Sender<PolicyReloadEvent>,
}

impl PolicyStore {
    /// Load the document at `path` and build a store around it.
    pub async fn open(path: impl Into<PathBuf>) -> DomainResult<Self> {
        let path = path.into();
        let bundle = Self::load(&path).await?;
        info!(
            path = %path.display(),
            rules = bundle.len(),
            hash = %bundle.content_hash(),
            "policy loaded"
        );
        Ok(Self::from_bundle(path, bundle))
    }

    /// Build a store around an already parsed bundle.
    pub fn from_bundle(path: impl Into<PathBuf>, bundle: PolicyBundle) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            path: path.into(),
            current: RwLock::new(Arc::new(bundle)),
            rejected: Mutex::new(None),
            events,
        }
    }

    /// Read and parse a policy document.
    pub async fn load(path: &Path) -> DomainResult<PolicyBundle> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| DomainError::PolicyIo {
                path: path.display().to_string(),
                source,
            })?;
        parse_policy(&content, &path.display().to_string())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the active bundle.
    pub fn current(&self) -> Arc<PolicyBundle> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PolicyReloadEvent> {
        self.events.subscribe()
    }

    /// Re-read the document and swap in a new bundle if its hash changed.
    ///
    /// On any error the previous bundle stays active and the error is
    /// returned. An error event is published once per rejected document;
    /// re-reading the same broken content returns the error silently.
    pub async fn reload_if_changed(&self) -> DomainResult<(Arc<PolicyBundle>, bool)> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(source) => {
                let err = DomainError::PolicyIo {
                    path: self.path.display().to_string(),
                    source,
                };
                self.publish_error(&err);
                return Err(err);
            }
        };

        let hash = content_hash(&content);
        let active = self.current();
        if active.content_hash() == hash {
            debug!(hash = %hash, "policy unchanged");
            return Ok((active, false));
        }

        let path = self.path.display().to_string();
        if let Some((_, reason)) = self.rejected().as_ref().filter(|(rejected, _)| *rejected == hash) {
            debug!(hash = %hash, "policy still malformed");
            return Err(DomainError::PolicyParse {
                path,
                reason: reason.clone(),
            });
        }

        let bundle = match parse_policy(&content, &path) {
            Ok(bundle) => Arc::new(bundle),
            Err(err) => {
                warn!(error = %err, "policy reload skipped, keeping previous bundle");
                if let DomainError::PolicyParse { reason, .. } = &err {
                    *self.rejected() = Some((hash, reason.clone()));
                }
                self.publish_error(&err);
                return Err(err);
            }
        };

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&bundle);
        *self.rejected() = None;

        info!(
            previous_hash = %active.content_hash(),
            hash = %bundle.content_hash(),
            rules = bundle.len(),
            "policy reloaded"
        );
        let _ = self.events.send(PolicyReloadEvent {
            content_hash: bundle.content_hash().to_string(),
            rule_count: bundle.len(),
            changed: true,
            error: None,
            at: Utc::now(),
        });

        Ok((bundle, true))
    }

    fn rejected(&self) -> MutexGuard<'_, Option<(String, String)>> {
        self.rejected.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_error(&self, err: &DomainError) {
        let active = self.current();
        let _ = self.events.send(PolicyReloadEvent {
            content_hash: active.content_hash().to_string(),
            rule_count: active.len(),
            changed: false,
            error: Some(err.to_string()),
            at: Utc::now(),
        });
    }

    /// Poll the document on a background task until `cancel` fires.
    pub fn spawn_watcher(self: Arc<Self>, every: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; the bundle is already fresh.
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!(path = %self.path.display(), "policy watcher stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(err) = self.reload_if_changed().await {
                            debug!(error = %err, "policy watcher tick failed");
                        }
                    }
                }
            }
        })
    }
}

/// SHA-256 of the raw document, hex encoded.
pub fn content_hash(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

fn classify_heading(title: &str) -> Option<RuleKind> {
    let lower = title.to_lowercase();
    let matches = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));
    // "Soft constraints" is advisory; only an explicit "hard" outranks "soft".
    if lower.contains("hard constraint") {
        Some(RuleKind::HardConstraint)
    } else if matches(SOFT_HEADINGS) {
        Some(RuleKind::SoftGuideline)
    } else if matches(HARD_HEADINGS) {
        Some(RuleKind::HardConstraint)
    } else if matches(IDENTITY_HEADINGS) {
        Some(RuleKind::Identity)
    } else {
        None
    }
}

struct Section {
    kind: RuleKind,
    title: String,
    items: Vec<String>,
}

/// Parse a Markdown policy document into a bundle.
///
/// `source` names the document in error messages.
pub fn parse_policy(content: &str, source: &str) -> DomainResult<PolicyBundle> {
    let malformed = |reason: String| DomainError::PolicyParse {
        path: source.to_string(),
        reason,
    };

    let mut sections: Vec<Section> = Vec::new();
    let mut active: Option<Section> = None;
    let mut in_fence = false;
    let mut continuing = false;

    for raw in content.lines() {
        let line = raw.trim();
        if line.starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }

        if let Some(caps) = HEADING.captures(line) {
            if let Some(done) = active.take() {
                sections.push(done);
            }
            let title = caps[2].to_string();
            active = classify_heading(&title).map(|kind| Section {
                kind,
                title,
                items: Vec::new(),
            });
            continuing = false;
            continue;
        }

        let Some(section) = active.as_mut() else {
            continue;
        };

        if line.is_empty() {
            continuing = false;
        } else if let Some(caps) = LIST_ITEM.captures(line) {
            section.items.push(caps[1].trim().to_string());
            continuing = true;
        } else if continuing {
            if let Some(last) = section.items.last_mut() {
                last.push(' ');
                last.push_str(line);
            }
        }
    }
    if let Some(done) = active.take() {
        sections.push(done);
    }

    if !sections.iter().any(|s| s.kind == RuleKind::HardConstraint) {
        return Err(malformed("missing hard constraints section".to_string()));
    }

    let mut rules = Vec::new();
    let mut counters = [0usize; 3];
    for section in sections {
        if section.items.is_empty() && section.kind != RuleKind::SoftGuideline {
            return Err(malformed(format!(
                "section '{}' ({}) contains no rules",
                section.title, section.kind
            )));
        }

        for item in section.items {
            let (text, action) = extract_action(&item).map_err(|reason| {
                malformed(format!("section '{}': {reason}", section.title))
            })?;
            if action.is_some() && section.kind != RuleKind::HardConstraint {
                return Err(malformed(format!(
                    "section '{}': action tags are only allowed on hard constraints",
                    section.title
                )));
            }
            // A bare action tag is a rule of its own; the tag names it.
            let text = match (text.is_empty(), &action) {
                (false, _) => text,
                (true, Some(_)) => item.split_whitespace().collect::<Vec<_>>().join(" "),
                (true, None) => {
                    return Err(malformed(format!("section '{}' has an empty rule", section.title)));
                }
            };

            let counter = &mut counters[section.kind as usize];
            *counter += 1;
            rules.push(Rule {
                id: format!("{}-{}", section.kind.id_prefix(), counter),
                kind: section.kind,
                source_section: section.title.clone(),
                text,
                action,
            });
        }
    }

    Ok(PolicyBundle::new(rules, content_hash(content)))
}

fn extract_action(item: &str) -> Result<(String, Option<RuleAction>), String> {
    let mut tags = ACTION_TAG.captures_iter(item);
    let action = match tags.next() {
        None => None,
        Some(caps) => Some(RuleAction::parse(&caps[1], caps.get(2).map(|m| m.as_str()))?),
    };
    if tags.next().is_some() {
        return Err("a rule may carry at most one action tag".to_string());
    }

    let text = ACTION_TAG.replace_all(item, "");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    Ok((text, action))
}
