//! In-memory lead list

use crate::lead::Lead;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Shared lead list, newest first
#[derive(Debug, Clone, Default)]
pub struct LeadStore {
    leads: Arc<RwLock<Vec<Lead>>>,
}

impl LeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert at the top of the list
    pub async fn insert(&self, lead: Lead) {
        self.leads.write().await.insert(0, lead);
    }

    pub async fn get(&self, id: Uuid) -> Option<Lead> {
        self.leads.read().await.iter().find(|l| l.id == id).cloned()
    }

    /// Apply `f` to the lead under the write lock and return the updated copy
    pub async fn update<F>(&self, id: Uuid, f: F) -> Option<Lead>
    where
        F: FnOnce(&mut Lead),
    {
        let mut leads = self.leads.write().await;
        let lead = leads.iter_mut().find(|l| l.id == id)?;
        f(lead);
        Some(lead.clone())
    }

    pub async fn list(&self) -> Vec<Lead> {
        self.leads.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.leads.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.leads.read().await.is_empty()
    }
}
