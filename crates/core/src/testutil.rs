//! In-memory stores and scripted gateways shared by the repository tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::entrepreneur::{
    AssociationStoreTrait, Entrepreneur, EntrepreneurGateway, EntrepreneurStoreTrait,
    EntrepreneurSummary, NewEntrepreneur,
};
use crate::errors::{ApiError, ApiResult, StoreError};
use crate::municipality::{
    Municipality, MunicipalityGateway, MunicipalityStoreTrait, MunicipalitySummary,
    NewMunicipality,
};

pub fn municipality(id: i64, name: &str) -> Municipality {
    Municipality {
        id,
        name: name.to_string(),
        department: "Puno".to_string(),
        province: "Puno".to_string(),
        district: name.to_string(),
        address: None,
        phone: None,
        website: None,
        description: None,
        user_id: 1,
        entrepreneurs: Vec::new(),
    }
}

pub fn entrepreneur(id: i64, business_name: &str, municipality_id: i64) -> Entrepreneur {
    Entrepreneur {
        id,
        business_name: business_name.to_string(),
        category: "turismo".to_string(),
        address: None,
        phone: None,
        email: None,
        website: None,
        description: None,
        products: None,
        services: None,
        user_id: 1,
        municipality_id,
        municipality: None,
    }
}

pub fn entrepreneur_with_summary(
    id: i64,
    business_name: &str,
    summary: MunicipalitySummary,
) -> Entrepreneur {
    let mut record = entrepreneur(id, business_name, summary.id);
    record.municipality = Some(summary);
    record
}

pub fn summaries_of(municipality: &Municipality) -> Vec<(i64, String)> {
    municipality
        .entrepreneurs
        .iter()
        .map(|summary| (summary.id, summary.business_name.clone()))
        .collect()
}

#[derive(Default)]
pub struct MemoryMunicipalityStore {
    rows: Mutex<BTreeMap<i64, Municipality>>,
}

impl MemoryMunicipalityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, municipalities: Vec<Municipality>) {
        let mut rows = self.rows.lock().unwrap();
        for row in municipalities {
            rows.insert(row.id, row);
        }
    }
}

#[async_trait]
impl MunicipalityStoreTrait for MemoryMunicipalityStore {
    fn get_all(&self) -> Result<Vec<Municipality>, StoreError> {
        Ok(self.rows.lock().unwrap().values().cloned().collect())
    }

    fn get_by_id(&self, id: i64) -> Result<Option<Municipality>, StoreError> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    fn get_by_department(&self, department: &str) -> Result<Vec<Municipality>, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|row| row.department == department)
            .cloned()
            .collect())
    }

    async fn upsert(&self, municipality: Municipality) -> Result<(), StoreError> {
        self.rows
            .lock()
            .unwrap()
            .insert(municipality.id, municipality);
        Ok(())
    }

    async fn upsert_many(&self, municipalities: Vec<Municipality>) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        for row in municipalities {
            rows.insert(row.id, row);
        }
        Ok(())
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), StoreError> {
        self.rows.lock().unwrap().remove(&id);
        Ok(())
    }
}

/// Enforces the foreign-key invariant the SQLite store enforces, so ordering
/// bugs in parent repair fail tests instead of passing silently.
pub struct MemoryEntrepreneurStore {
    rows: Mutex<BTreeMap<i64, Entrepreneur>>,
    municipalities: Arc<MemoryMunicipalityStore>,
}

impl MemoryEntrepreneurStore {
    pub fn new(municipalities: Arc<MemoryMunicipalityStore>) -> Self {
        Self {
            rows: Mutex::new(BTreeMap::new()),
            municipalities,
        }
    }

    pub fn seed(&self, entrepreneurs: Vec<Entrepreneur>) {
        let mut rows = self.rows.lock().unwrap();
        for row in entrepreneurs {
            rows.insert(row.id, row);
        }
    }

    fn check_parent(&self, row: &Entrepreneur) -> Result<(), StoreError> {
        if self.municipalities.get_by_id(row.municipality_id)?.is_none() {
            return Err(StoreError::ReferentialIntegrity(format!(
                "entrepreneur {} references missing municipality {}",
                row.id, row.municipality_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl EntrepreneurStoreTrait for MemoryEntrepreneurStore {
    fn get_all(&self) -> Result<Vec<Entrepreneur>, StoreError> {
        Ok(self.rows.lock().unwrap().values().cloned().collect())
    }

    fn get_by_id(&self, id: i64) -> Result<Option<Entrepreneur>, StoreError> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    fn get_by_municipality(&self, municipality_id: i64) -> Result<Vec<Entrepreneur>, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|row| row.municipality_id == municipality_id)
            .cloned()
            .collect())
    }

    fn get_by_category(&self, category: &str) -> Result<Vec<Entrepreneur>, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|row| row.category == category)
            .cloned()
            .collect())
    }

    async fn upsert(&self, entrepreneur: Entrepreneur) -> Result<(), StoreError> {
        self.check_parent(&entrepreneur)?;
        self.rows
            .lock()
            .unwrap()
            .insert(entrepreneur.id, entrepreneur);
        Ok(())
    }

    async fn upsert_many(&self, entrepreneurs: Vec<Entrepreneur>) -> Result<(), StoreError> {
        for row in &entrepreneurs {
            self.check_parent(row)?;
        }
        let mut rows = self.rows.lock().unwrap();
        for row in entrepreneurs {
            rows.insert(row.id, row);
        }
        Ok(())
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), StoreError> {
        self.rows.lock().unwrap().remove(&id);
        Ok(())
    }
}

pub struct MemoryAssociationStore {
    pairs: Mutex<BTreeSet<(i64, i64)>>,
    entrepreneurs: Arc<MemoryEntrepreneurStore>,
}

impl MemoryAssociationStore {
    pub fn new(entrepreneurs: Arc<MemoryEntrepreneurStore>) -> Self {
        Self {
            pairs: Mutex::new(BTreeSet::new()),
            entrepreneurs,
        }
    }

    pub fn seed(&self, pairs: Vec<(i64, i64)>) {
        self.pairs.lock().unwrap().extend(pairs);
    }
}

#[async_trait]
impl AssociationStoreTrait for MemoryAssociationStore {
    async fn insert(&self, entrepreneur_id: i64, municipality_id: i64) -> Result<(), StoreError> {
        self.pairs
            .lock()
            .unwrap()
            .insert((entrepreneur_id, municipality_id));
        Ok(())
    }

    async fn insert_many(&self, pairs: Vec<(i64, i64)>) -> Result<(), StoreError> {
        self.pairs.lock().unwrap().extend(pairs);
        Ok(())
    }

    async fn replace_for_municipality(
        &self,
        municipality_id: i64,
        entrepreneur_ids: Vec<i64>,
    ) -> Result<(), StoreError> {
        let mut pairs = self.pairs.lock().unwrap();
        pairs.retain(|(_, m)| *m != municipality_id);
        for entrepreneur_id in entrepreneur_ids {
            pairs.insert((entrepreneur_id, municipality_id));
        }
        Ok(())
    }

    async fn delete_by_entrepreneur(&self, entrepreneur_id: i64) -> Result<(), StoreError> {
        self.pairs
            .lock()
            .unwrap()
            .retain(|(e, _)| *e != entrepreneur_id);
        Ok(())
    }

    async fn delete_by_municipality(&self, municipality_id: i64) -> Result<(), StoreError> {
        self.pairs
            .lock()
            .unwrap()
            .retain(|(_, m)| *m != municipality_id);
        Ok(())
    }

    fn exists(&self, entrepreneur_id: i64, municipality_id: i64) -> Result<bool, StoreError> {
        Ok(self
            .pairs
            .lock()
            .unwrap()
            .contains(&(entrepreneur_id, municipality_id)))
    }

    fn summaries_for_municipality(
        &self,
        municipality_id: i64,
    ) -> Result<Vec<EntrepreneurSummary>, StoreError> {
        let ids: Vec<i64> = self
            .pairs
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, m)| *m == municipality_id)
            .map(|(e, _)| *e)
            .collect();
        let mut summaries = Vec::new();
        for id in ids {
            if let Some(row) = self.entrepreneurs.get_by_id(id)? {
                summaries.push(row.summary());
            }
        }
        Ok(summaries)
    }
}

fn unscripted<T>(endpoint: &str) -> ApiResult<T> {
    Err(ApiError::Unknown(format!("unscripted call: {}", endpoint)))
}

type Script<T> = Mutex<Option<ApiResult<T>>>;

fn take<T>(script: &Script<T>, endpoint: &str) -> ApiResult<T> {
    script
        .lock()
        .unwrap()
        .take()
        .unwrap_or_else(|| unscripted(endpoint))
}

#[derive(Default)]
pub struct StubMunicipalityGateway {
    list: Script<Vec<Municipality>>,
    get: Script<Municipality>,
    by_department: Script<Vec<Municipality>>,
    mine: Script<Municipality>,
    create: Script<Municipality>,
    update: Script<Municipality>,
    delete: Script<()>,
}

impl StubMunicipalityGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_list(&self, result: ApiResult<Vec<Municipality>>) {
        *self.list.lock().unwrap() = Some(result);
    }

    pub fn on_get(&self, result: ApiResult<Municipality>) {
        *self.get.lock().unwrap() = Some(result);
    }

    pub fn on_by_department(&self, result: ApiResult<Vec<Municipality>>) {
        *self.by_department.lock().unwrap() = Some(result);
    }

    pub fn on_mine(&self, result: ApiResult<Municipality>) {
        *self.mine.lock().unwrap() = Some(result);
    }

    pub fn on_create(&self, result: ApiResult<Municipality>) {
        *self.create.lock().unwrap() = Some(result);
    }

    pub fn on_update(&self, result: ApiResult<Municipality>) {
        *self.update.lock().unwrap() = Some(result);
    }

    pub fn on_delete(&self, result: ApiResult<()>) {
        *self.delete.lock().unwrap() = Some(result);
    }
}

#[async_trait]
impl MunicipalityGateway for StubMunicipalityGateway {
    async fn list(&self) -> ApiResult<Vec<Municipality>> {
        take(&self.list, "municipalidades")
    }

    async fn get(&self, _id: i64) -> ApiResult<Municipality> {
        take(&self.get, "municipalidades/{id}")
    }

    async fn by_department(&self, _department: &str) -> ApiResult<Vec<Municipality>> {
        take(&self.by_department, "municipalidades/departamento/{dep}")
    }

    async fn mine(&self) -> ApiResult<Municipality> {
        take(&self.mine, "municipalidades/mi-municipalidad")
    }

    async fn create(&self, _request: &NewMunicipality) -> ApiResult<Municipality> {
        take(&self.create, "POST municipalidades")
    }

    async fn update(&self, _id: i64, _request: &NewMunicipality) -> ApiResult<Municipality> {
        take(&self.update, "PUT municipalidades/{id}")
    }

    async fn delete(&self, _id: i64) -> ApiResult<()> {
        take(&self.delete, "DELETE municipalidades/{id}")
    }
}

#[derive(Default)]
pub struct StubEntrepreneurGateway {
    list: Script<Vec<Entrepreneur>>,
    get: Script<Entrepreneur>,
    by_municipality: Script<Vec<Entrepreneur>>,
    by_category: Script<Vec<Entrepreneur>>,
    mine: Script<Entrepreneur>,
    create: Script<Entrepreneur>,
    update: Script<Entrepreneur>,
    delete: Script<()>,
}

impl StubEntrepreneurGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_list(&self, result: ApiResult<Vec<Entrepreneur>>) {
        *self.list.lock().unwrap() = Some(result);
    }

    pub fn on_get(&self, result: ApiResult<Entrepreneur>) {
        *self.get.lock().unwrap() = Some(result);
    }

    pub fn on_by_municipality(&self, result: ApiResult<Vec<Entrepreneur>>) {
        *self.by_municipality.lock().unwrap() = Some(result);
    }

    pub fn on_by_category(&self, result: ApiResult<Vec<Entrepreneur>>) {
        *self.by_category.lock().unwrap() = Some(result);
    }

    pub fn on_mine(&self, result: ApiResult<Entrepreneur>) {
        *self.mine.lock().unwrap() = Some(result);
    }

    pub fn on_create(&self, result: ApiResult<Entrepreneur>) {
        *self.create.lock().unwrap() = Some(result);
    }

    pub fn on_update(&self, result: ApiResult<Entrepreneur>) {
        *self.update.lock().unwrap() = Some(result);
    }

    pub fn on_delete(&self, result: ApiResult<()>) {
        *self.delete.lock().unwrap() = Some(result);
    }
}

#[async_trait]
impl EntrepreneurGateway for StubEntrepreneurGateway {
    async fn list(&self) -> ApiResult<Vec<Entrepreneur>> {
        take(&self.list, "emprendedores")
    }

    async fn get(&self, _id: i64) -> ApiResult<Entrepreneur> {
        take(&self.get, "emprendedores/{id}")
    }

    async fn by_municipality(&self, _municipality_id: i64) -> ApiResult<Vec<Entrepreneur>> {
        take(
            &self.by_municipality,
            "emprendedores/municipalidad/{municipalidadId}",
        )
    }

    async fn by_category(&self, _category: &str) -> ApiResult<Vec<Entrepreneur>> {
        take(&self.by_category, "emprendedores/rubro/{rubro}")
    }

    async fn mine(&self) -> ApiResult<Entrepreneur> {
        take(&self.mine, "emprendedores/mi-emprendedor")
    }

    async fn create(&self, _request: &NewEntrepreneur) -> ApiResult<Entrepreneur> {
        take(&self.create, "POST emprendedores")
    }

    async fn update(&self, _id: i64, _request: &NewEntrepreneur) -> ApiResult<Entrepreneur> {
        take(&self.update, "PUT emprendedores/{id}")
    }

    async fn delete(&self, _id: i64) -> ApiResult<()> {
        take(&self.delete, "DELETE emprendedores/{id}")
    }
}
