//! Entrepreneur models.

use serde::{Deserialize, Serialize};

use crate::municipality::MunicipalitySummary;

/// A registered business. Belongs to exactly one municipality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entrepreneur {
    pub id: i64,
    pub business_name: String,
    /// Line of business ("rubro").
    pub category: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
    pub products: Option<String>,
    pub services: Option<String>,
    pub user_id: i64,
    pub municipality_id: i64,
    /// Embedded parent summary when the payload (or a cache join) carries
    /// one; `None` is the "no parent details" sentinel, not an error.
    pub municipality: Option<MunicipalitySummary>,
}

/// The reduced form used in a municipality's entrepreneur list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrepreneurSummary {
    pub id: i64,
    pub business_name: String,
    pub category: String,
}

/// Payload for create/update calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntrepreneur {
    pub business_name: String,
    pub category: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
    pub products: Option<String>,
    pub services: Option<String>,
    pub municipality_id: i64,
}

impl Entrepreneur {
    pub fn summary(&self) -> EntrepreneurSummary {
        EntrepreneurSummary {
            id: self.id,
            business_name: self.business_name.clone(),
            category: self.category.clone(),
        }
    }
}
