use crate::auth::UserRecord;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: String,
    pub email: Option<String>,
    pub role: String,
    pub is_admin: bool,
}

impl MeResponse {
    pub fn new(user: UserRecord, admin_role: &str) -> Self {
        let is_admin = user.role == admin_role;
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            is_admin,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserRecord>,
    pub limit: u32,
    pub offset: u32,
}
