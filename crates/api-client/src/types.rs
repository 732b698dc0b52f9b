//! Wire DTOs for the backend's JSON contract.
//!
//! Field names follow the backend exactly (`nombreEmpresa`, `sitioWeb`,
//! `municipalidadId`, ...); conversions to and from the core models happen
//! here so nothing else in the workspace sees the wire shape.

use serde::{Deserialize, Serialize};

use turismo_core::auth::{AuthSession, Credentials, Registration};
use turismo_core::entrepreneur::{Entrepreneur, EntrepreneurSummary, NewEntrepreneur};
use turismo_core::municipality::{Municipality, MunicipalitySummary, NewMunicipality};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponseDto {
    pub token: String,
    pub token_type: String,
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl From<AuthResponseDto> for AuthSession {
    fn from(dto: AuthResponseDto) -> Self {
        AuthSession {
            token: dto.token,
            token_type: dto.token_type,
            id: dto.id,
            username: dto.username,
            email: dto.email,
            roles: dto.roles,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequestDto {
    pub username: String,
    pub password: String,
}

impl From<&Credentials> for LoginRequestDto {
    fn from(model: &Credentials) -> Self {
        Self {
            username: model.username.clone(),
            password: model.password.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequestDto {
    pub nombre: String,
    pub apellido: String,
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
}

impl From<&Registration> for RegisterRequestDto {
    fn from(model: &Registration) -> Self {
        Self {
            nombre: model.first_name.clone(),
            apellido: model.last_name.clone(),
            username: model.username.clone(),
            email: model.email.clone(),
            password: model.password.clone(),
            roles: model.roles.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MunicipalidadBasicDto {
    pub id: i64,
    pub nombre: String,
    pub distrito: String,
}

impl From<MunicipalidadBasicDto> for MunicipalitySummary {
    fn from(dto: MunicipalidadBasicDto) -> Self {
        MunicipalitySummary {
            id: dto.id,
            name: dto.nombre,
            district: dto.distrito,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmprendedorBasicDto {
    pub id: i64,
    pub nombre_empresa: String,
    pub rubro: String,
}

impl From<EmprendedorBasicDto> for EntrepreneurSummary {
    fn from(dto: EmprendedorBasicDto) -> Self {
        EntrepreneurSummary {
            id: dto.id,
            business_name: dto.nombre_empresa,
            category: dto.rubro,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MunicipalidadDto {
    pub id: i64,
    pub nombre: String,
    pub departamento: String,
    pub provincia: String,
    pub distrito: String,
    pub direccion: Option<String>,
    pub telefono: Option<String>,
    pub sitio_web: Option<String>,
    pub descripcion: Option<String>,
    pub usuario_id: i64,
    #[serde(default)]
    pub emprendedores: Vec<EmprendedorBasicDto>,
}

impl From<MunicipalidadDto> for Municipality {
    fn from(dto: MunicipalidadDto) -> Self {
        Municipality {
            id: dto.id,
            name: dto.nombre,
            department: dto.departamento,
            province: dto.provincia,
            district: dto.distrito,
            address: dto.direccion,
            phone: dto.telefono,
            website: dto.sitio_web,
            description: dto.descripcion,
            user_id: dto.usuario_id,
            entrepreneurs: dto
                .emprendedores
                .into_iter()
                .map(EntrepreneurSummary::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MunicipalidadRequestDto {
    pub nombre: String,
    pub departamento: String,
    pub provincia: String,
    pub distrito: String,
    pub direccion: Option<String>,
    pub telefono: Option<String>,
    pub sitio_web: Option<String>,
    pub descripcion: Option<String>,
}

impl From<&NewMunicipality> for MunicipalidadRequestDto {
    fn from(model: &NewMunicipality) -> Self {
        Self {
            nombre: model.name.clone(),
            departamento: model.department.clone(),
            provincia: model.province.clone(),
            distrito: model.district.clone(),
            direccion: model.address.clone(),
            telefono: model.phone.clone(),
            sitio_web: model.website.clone(),
            descripcion: model.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmprendedorDto {
    pub id: i64,
    pub nombre_empresa: String,
    pub rubro: String,
    pub direccion: Option<String>,
    pub telefono: Option<String>,
    pub email: Option<String>,
    pub sitio_web: Option<String>,
    pub descripcion: Option<String>,
    pub productos: Option<String>,
    pub servicios: Option<String>,
    pub usuario_id: i64,
    pub municipalidad: Option<MunicipalidadBasicDto>,
}

impl From<EmprendedorDto> for Entrepreneur {
    fn from(dto: EmprendedorDto) -> Self {
        let municipality = dto.municipalidad.map(MunicipalitySummary::from);
        Entrepreneur {
            id: dto.id,
            business_name: dto.nombre_empresa,
            category: dto.rubro,
            address: dto.direccion,
            phone: dto.telefono,
            email: dto.email,
            website: dto.sitio_web,
            description: dto.descripcion,
            products: dto.productos,
            services: dto.servicios,
            user_id: dto.usuario_id,
            municipality_id: municipality.as_ref().map(|m| m.id).unwrap_or_default(),
            municipality,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmprendedorRequestDto {
    pub nombre_empresa: String,
    pub rubro: String,
    pub direccion: Option<String>,
    pub telefono: Option<String>,
    pub email: Option<String>,
    pub sitio_web: Option<String>,
    pub descripcion: Option<String>,
    pub productos: Option<String>,
    pub servicios: Option<String>,
    pub municipalidad_id: i64,
}

impl From<&NewEntrepreneur> for EmprendedorRequestDto {
    fn from(model: &NewEntrepreneur) -> Self {
        Self {
            nombre_empresa: model.business_name.clone(),
            rubro: model.category.clone(),
            direccion: model.address.clone(),
            telefono: model.phone.clone(),
            email: model.email.clone(),
            sitio_web: model.website.clone(),
            descripcion: model.description.clone(),
            productos: model.products.clone(),
            servicios: model.services.clone(),
            municipalidad_id: model.municipality_id,
        }
    }
}

/// Error body most backend failures carry.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emprendedor_decodes_the_backend_field_names() {
        let json = r#"{
            "id": 7,
            "nombreEmpresa": "Hostal Titicaca",
            "rubro": "hospedaje",
            "direccion": "Jr. Lima 123",
            "telefono": null,
            "email": null,
            "sitioWeb": "https://titicaca.pe",
            "descripcion": null,
            "productos": null,
            "servicios": null,
            "usuarioId": 9,
            "municipalidad": {"id": 3, "nombre": "Capachica", "distrito": "Capachica"}
        }"#;

        let model = Entrepreneur::from(serde_json::from_str::<EmprendedorDto>(json).unwrap());
        assert_eq!(model.business_name, "Hostal Titicaca");
        assert_eq!(model.website.as_deref(), Some("https://titicaca.pe"));
        assert_eq!(model.municipality_id, 3);
        assert_eq!(model.municipality.as_ref().unwrap().name, "Capachica");
    }

    #[test]
    fn emprendedor_without_parent_summary_keeps_the_none_sentinel() {
        let json = r#"{
            "id": 7,
            "nombreEmpresa": "X",
            "rubro": "turismo",
            "direccion": null,
            "telefono": null,
            "email": null,
            "sitioWeb": null,
            "descripcion": null,
            "productos": null,
            "servicios": null,
            "usuarioId": 1,
            "municipalidad": null
        }"#;

        let model = Entrepreneur::from(serde_json::from_str::<EmprendedorDto>(json).unwrap());
        assert!(model.municipality.is_none());
        assert_eq!(model.municipality_id, 0);
    }

    #[test]
    fn municipalidad_request_serializes_spanish_names() {
        let request = NewMunicipality {
            name: "Capachica".to_string(),
            department: "Puno".to_string(),
            province: "Puno".to_string(),
            district: "Capachica".to_string(),
            address: None,
            phone: None,
            website: Some("https://capachica.gob.pe".to_string()),
            description: None,
        };

        let value = serde_json::to_value(MunicipalidadRequestDto::from(&request)).unwrap();
        assert_eq!(value["nombre"], "Capachica");
        assert_eq!(value["departamento"], "Puno");
        assert_eq!(value["sitioWeb"], "https://capachica.gob.pe");
        assert!(value["direccion"].is_null());
    }

    #[test]
    fn auth_response_defaults_missing_roles_to_empty() {
        let json = r#"{
            "token": "jwt",
            "tokenType": "Bearer",
            "id": 1,
            "username": "maria",
            "email": "maria@example.com"
        }"#;

        let session = AuthSession::from(serde_json::from_str::<AuthResponseDto>(json).unwrap());
        assert!(session.roles.is_empty());
        assert_eq!(session.token_type, "Bearer");
    }
}
