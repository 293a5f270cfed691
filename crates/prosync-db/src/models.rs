/// Database row types for the non-JSON tables.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

pub struct ObjectRow {
    pub content_type: String,
    pub data: Vec<u8>,
}
