use rocket_db_pools::{Database, sqlx};

#[derive(Database)]
#[database("forgepulse_db")]
pub struct PulseDb(sqlx::PgPool);
