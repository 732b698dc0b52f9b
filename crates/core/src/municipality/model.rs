//! Municipality models.

use serde::{Deserialize, Serialize};

use crate::entrepreneur::EntrepreneurSummary;

/// A municipality as seen by screens: the cached or remote record plus the
/// entrepreneur summaries derived from the association table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Municipality {
    pub id: i64,
    pub name: String,
    pub department: String,
    pub province: String,
    pub district: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
    pub user_id: i64,
    /// Derived at read time via the association table; never persisted as a
    /// column. Remote payloads may carry the server's own list.
    #[serde(default)]
    pub entrepreneurs: Vec<EntrepreneurSummary>,
}

/// The reduced form embedded in entrepreneur payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MunicipalitySummary {
    pub id: i64,
    pub name: String,
    pub district: String,
}

/// Payload for create/update calls. Ids are assigned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMunicipality {
    pub name: String,
    pub department: String,
    pub province: String,
    pub district: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
}

impl Municipality {
    pub fn summary(&self) -> MunicipalitySummary {
        MunicipalitySummary {
            id: self.id,
            name: self.name.clone(),
            district: self.district.clone(),
        }
    }

    /// Placeholder built from an embedded summary: known name and district,
    /// blank administrative fields. Superseded by the next full sync.
    pub fn placeholder_from_summary(summary: &MunicipalitySummary) -> Self {
        Self {
            id: summary.id,
            name: summary.name.clone(),
            department: String::new(),
            province: String::new(),
            district: summary.district.clone(),
            address: None,
            phone: None,
            website: None,
            description: None,
            user_id: 0,
            entrepreneurs: Vec::new(),
        }
    }

    /// Placeholder built from a bare id, when not even a summary is known.
    pub fn placeholder(id: i64) -> Self {
        Self {
            id,
            name: format!("Municipalidad ID {}", id),
            department: String::new(),
            province: String::new(),
            district: String::new(),
            address: None,
            phone: None,
            website: None,
            description: None,
            user_id: 0,
            entrepreneurs: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_name_embeds_the_id() {
        let placeholder = Municipality::placeholder(5);
        assert_eq!(placeholder.name, "Municipalidad ID 5");
        assert_eq!(placeholder.department, "");
        assert_eq!(placeholder.district, "");
        assert_eq!(placeholder.user_id, 0);
    }

    #[test]
    fn summary_placeholder_keeps_name_and_district() {
        let summary = MunicipalitySummary {
            id: 3,
            name: "Capachica".to_string(),
            district: "Capachica".to_string(),
        };
        let placeholder = Municipality::placeholder_from_summary(&summary);
        assert_eq!(placeholder.id, 3);
        assert_eq!(placeholder.name, "Capachica");
        assert_eq!(placeholder.district, "Capachica");
        assert_eq!(placeholder.province, "");
    }
}
