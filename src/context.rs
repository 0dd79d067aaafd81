use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use tracing::info;

use crate::board::conflicts_from;
use crate::limits::*;
use crate::model::*;
use crate::source::{ConflictSource, SourceError};
use crate::store::InMemoryStore;

/// One store per organizational context (a team, a brand, a client account).
/// The same person may hold a staff record in several contexts, linked by
/// `Staff::identity_key`.
pub struct ContextRegistry {
    contexts: DashMap<String, Arc<InMemoryStore>>,
}

impl Default for ContextRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self {
            contexts: DashMap::new(),
        }
    }

    /// Get or lazily create the store for `name`.
    pub fn get_or_create(&self, name: &str) -> Result<Arc<InMemoryStore>, SourceError> {
        if name.len() > MAX_CONTEXT_NAME_LEN {
            return Err(SourceError::LimitExceeded("context name too long"));
        }
        let key = sanitize(name);
        if key.is_empty() {
            return Err(SourceError::Rejected("empty context name".into()));
        }
        if let Some(store) = self.contexts.get(&key) {
            return Ok(store.value().clone());
        }
        if self.contexts.len() >= MAX_CONTEXTS {
            return Err(SourceError::LimitExceeded("too many contexts"));
        }

        let store = self
            .contexts
            .entry(key.clone())
            .or_insert_with(|| Arc::new(InMemoryStore::new()))
            .value()
            .clone();
        metrics::gauge!(crate::observability::CONTEXTS_ACTIVE).set(self.contexts.len() as f64);
        info!("opened context {key}");
        Ok(store)
    }

    pub fn get(&self, name: &str) -> Option<Arc<InMemoryStore>> {
        self.contexts.get(&sanitize(name)).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Conflict source for a board running in context `name`.
    pub fn conflicts_for(self: &Arc<Self>, name: &str) -> CrossContextConflicts {
        CrossContextConflicts {
            registry: self.clone(),
            context: sanitize(name),
        }
    }
}

/// Reports, for staff of one context, the times their identity is booked in
/// any other context.
pub struct CrossContextConflicts {
    registry: Arc<ContextRegistry>,
    context: String,
}

#[async_trait]
impl ConflictSource for CrossContextConflicts {
    async fn cross_context_conflicts(
        &self,
        staff_ids: &[StaffId],
        date: NaiveDate,
    ) -> Result<Vec<ConflictRecord>, SourceError> {
        let Some(home) = self.registry.get(&self.context) else {
            return Ok(Vec::new());
        };
        let others: Vec<Arc<InMemoryStore>> = self
            .registry
            .contexts
            .iter()
            .filter(|e| *e.key() != self.context)
            .map(|e| e.value().clone())
            .collect();

        let mut records = Vec::new();
        for &staff_id in staff_ids {
            let Some(key) = home.staff_member(&staff_id).and_then(|s| s.identity_key) else {
                continue;
            };
            for other in &others {
                for twin in other.staff_by_identity(&key) {
                    let meetings = other.meetings_on(date, twin.id);
                    records.extend(conflicts_from(staff_id, &meetings, date));
                }
            }
        }
        records.sort();
        records.dedup();
        Ok(records)
    }
}
