use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "KarenFlix API",
        version = "1.0.0",
        description = "REST backend for the KarenFlix movie and series catalog.\n\n**Authentication:** sessions ride in a signed, httpOnly `login` cookie issued by `/users/login`.\n\n**Features:**\n- User registration and cookie-based JWT sessions\n- Role-gated access (user / admin)\n- Filterable title catalog with genre joins\n- Genre listing\n- Per-title review export",
        contact(
            name = "KarenFlix Team"
        )
    ),
    paths(
        // Users
        crate::api::users::register,
        crate::api::users::login,
        crate::api::users::me,
        crate::api::users::logout,

        // Catalog
        crate::api::catalog::filter,
        crate::api::catalog::find_by_code,

        // Genres
        crate::api::genres::list,

        // Reviews
        crate::api::reviews::generate_file,

        // Health
        crate::api::health::health_check,
    ),
    components(
        schemas(
            // Users
            crate::services::user_service::RegisterRequest,
            crate::services::user_service::LoginRequest,
            crate::models::RegisteredUser,
            crate::models::PublicUser,

            // Catalog
            crate::models::CatalogListItem,
            crate::models::CatalogDetail,
            crate::models::Genre,
            crate::models::ReviewLine,

            // Health
            crate::api::health::HealthResponse,
        )
    ),
    tags(
        (name = "Users", description = "Registration, login and session management. Login sets the signed `login` cookie; `/users/me` requires it."),
        (name = "Catalog", description = "Filterable movie/series catalog. Listings only include approved titles."),
        (name = "Genres", description = "Genre catalog referenced by titles."),
        (name = "Reviews", description = "Per-title review export. Admin only."),
        (name = "Health", description = "Liveness endpoint."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "cookie_auth",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "login",
                    "Signed session cookie issued by /users/login",
                ))),
            );
        }
    }
}
