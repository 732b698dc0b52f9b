//! Database model for municipalities.

use diesel::prelude::*;

use turismo_core::municipality::Municipality;

/// Row shape. `updated_at_ms` is cache bookkeeping only; it never reaches
/// the domain model and is not compared for conflict resolution.
#[derive(Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::municipalities)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MunicipalityDB {
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
    pub updated_at_ms: i64,
}

impl From<MunicipalityDB> for Municipality {
    fn from(row: MunicipalityDB) -> Self {
        Municipality {
            id: row.id,
            name: row.name,
            department: row.department,
            province: row.province,
            district: row.district,
            address: row.address,
            phone: row.phone,
            website: row.website,
            description: row.description,
            user_id: row.user_id,
            entrepreneurs: Vec::new(),
        }
    }
}

impl MunicipalityDB {
    /// The derived entrepreneur list is not a column; it is dropped here and
    /// rebuilt from the association table at read time.
    pub fn from_model(model: &Municipality, updated_at_ms: i64) -> Self {
        Self {
            id: model.id,
            name: model.name.clone(),
            department: model.department.clone(),
            province: model.province.clone(),
            district: model.district.clone(),
            address: model.address.clone(),
            phone: model.phone.clone(),
            website: model.website.clone(),
            description: model.description.clone(),
            user_id: model.user_id,
            updated_at_ms,
        }
    }
}
