//! Database model for association rows.

use diesel::prelude::*;

/// Composite-key join row. Exists so a municipality's entrepreneur list can
/// be derived without denormalizing into the entrepreneur row.
#[derive(Queryable, Identifiable, Insertable, Selectable, Debug, Clone, Copy, PartialEq, Eq)]
#[diesel(primary_key(entrepreneur_id, municipality_id))]
#[diesel(table_name = crate::schema::entrepreneur_municipality_refs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AssociationDB {
    pub entrepreneur_id: i64,
    pub municipality_id: i64,
}
