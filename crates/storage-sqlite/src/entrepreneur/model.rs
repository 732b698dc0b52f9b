//! Database model for entrepreneurs.

use diesel::prelude::*;

use turismo_core::entrepreneur::Entrepreneur;

#[derive(Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::entrepreneurs)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct EntrepreneurDB {
    pub id: i64,
    pub business_name: String,
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
    pub updated_at_ms: i64,
}

impl From<EntrepreneurDB> for Entrepreneur {
    fn from(row: EntrepreneurDB) -> Self {
        Entrepreneur {
            id: row.id,
            business_name: row.business_name,
            category: row.category,
            address: row.address,
            phone: row.phone,
            email: row.email,
            website: row.website,
            description: row.description,
            products: row.products,
            services: row.services,
            user_id: row.user_id,
            municipality_id: row.municipality_id,
            // The parent summary is a join concern, attached by callers.
            municipality: None,
        }
    }
}

impl EntrepreneurDB {
    pub fn from_model(model: &Entrepreneur, updated_at_ms: i64) -> Self {
        Self {
            id: model.id,
            business_name: model.business_name.clone(),
            category: model.category.clone(),
            address: model.address.clone(),
            phone: model.phone.clone(),
            email: model.email.clone(),
            website: model.website.clone(),
            description: model.description.clone(),
            products: model.products.clone(),
            services: model.services.clone(),
            user_id: model.user_id,
            municipality_id: model.municipality_id,
            updated_at_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_row_round_trip_preserves_every_field() {
        let model = Entrepreneur {
            id: 7,
            business_name: "Hostal Titicaca".to_string(),
            category: "hospedaje".to_string(),
            address: Some("Jr. Lima 123".to_string()),
            phone: None,
            email: Some("reservas@titicaca.pe".to_string()),
            website: None,
            description: None,
            products: None,
            services: Some("alojamiento, desayuno".to_string()),
            user_id: 9,
            municipality_id: 3,
            municipality: None,
        };

        let row = EntrepreneurDB::from_model(&model, 1_726_000_000_000);
        assert_eq!(row.municipality_id, 3);
        assert_eq!(Entrepreneur::from(row), model);
    }
}
