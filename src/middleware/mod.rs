pub mod admin;
pub mod auth;
pub mod request_id;

pub use admin::{check_admin_password, has_admin_access, AdminAccess, ADMIN_PASSWORD_HEADER};
pub use auth::AuthUser;
pub use request_id::{make_span_with_request_id, request_id_middleware, RequestId, REQUEST_ID_HEADER};
