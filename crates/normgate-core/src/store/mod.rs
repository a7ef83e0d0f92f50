//! MySQL persistence.
//!
//! One repository per entity over a shared pool. All status mutations go
//! through [`TaskStore::advance_status`], which enforces the state machine
//! inside a row-locking transaction.

mod conversations;
mod files;
mod results;
mod tasks;
mod users;

pub use conversations::ConversationStore;
pub use files::FileStore;
pub use results::ResultStore;
pub use tasks::{parse_status_filter, TaskStore};
pub use users::UserStore;

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};

use normgate_error::GatewayError;

/// Create a connection pool and verify the connection.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<MySqlPool, GatewayError> {
    let pool = MySqlPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    sqlx::query("SELECT 1").fetch_one(&pool).await?;
    Ok(pool)
}

/// Create a pool without touching the network. Used by tests and by
/// handlers that must not require a live database at construction time.
pub fn connect_lazy(database_url: &str) -> Result<MySqlPool, GatewayError> {
    Ok(MySqlPoolOptions::new().connect_lazy(database_url)?)
}

/// Create the schema when absent (utf8mb4 throughout).
pub async fn ensure_schema(pool: &MySqlPool) -> Result<(), GatewayError> {
    let statements = [
        r"CREATE TABLE IF NOT EXISTS users (
            id VARCHAR(36) PRIMARY KEY,
            username VARCHAR(80) UNIQUE,
            email VARCHAR(120) NOT NULL UNIQUE,
            password_hash VARCHAR(255) NOT NULL,
            reset_token VARCHAR(255),
            reset_token_expires DATETIME,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            last_login DATETIME,
            INDEX idx_users_email (email),
            INDEX idx_users_username (username)
        ) CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci",
        r"CREATE TABLE IF NOT EXISTS tasks (
            id VARCHAR(36) PRIMARY KEY,
            user_id VARCHAR(36) NOT NULL,
            task_type VARCHAR(40) NOT NULL,
            title VARCHAR(200) NOT NULL,
            description TEXT,
            status VARCHAR(20) NOT NULL DEFAULT 'pending',
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            INDEX idx_tasks_user (user_id),
            INDEX idx_tasks_status (status),
            INDEX idx_tasks_type (task_type)
        ) CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci",
        r"CREATE TABLE IF NOT EXISTS task_files (
            id VARCHAR(36) PRIMARY KEY,
            task_id VARCHAR(36) NOT NULL,
            user_id VARCHAR(36) NOT NULL,
            original_filename VARCHAR(255) NOT NULL,
            stored_filename VARCHAR(255) NOT NULL,
            file_path VARCHAR(500) NOT NULL,
            file_size BIGINT NOT NULL,
            file_type VARCHAR(100) NOT NULL,
            file_extension VARCHAR(20),
            dify_file_id VARCHAR(100),
            dify_response_data TEXT,
            upload_status VARCHAR(20) NOT NULL DEFAULT 'pending',
            upload_error TEXT,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            INDEX idx_task_files_task (task_id),
            INDEX idx_task_files_user (user_id)
        ) CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci",
        r"CREATE TABLE IF NOT EXISTS conversations (
            id VARCHAR(36) PRIMARY KEY,
            task_id VARCHAR(36) NOT NULL,
            file_id VARCHAR(36),
            user_id VARCHAR(36) NOT NULL,
            user_message TEXT NOT NULL,
            dify_response LONGTEXT,
            conversation_id VARCHAR(100),
            message_id VARCHAR(100),
            status VARCHAR(20) NOT NULL DEFAULT 'pending',
            response_time DOUBLE,
            error_message TEXT,
            request_data TEXT,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            INDEX idx_conversations_task (task_id),
            INDEX idx_conversations_user (user_id),
            INDEX idx_conversations_dify (conversation_id)
        ) CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci",
        r"CREATE TABLE IF NOT EXISTS task_results (
            id VARCHAR(36) PRIMARY KEY,
            task_id VARCHAR(36) NOT NULL,
            user_id VARCHAR(36) NOT NULL,
            message_id VARCHAR(100),
            conversation_id VARCHAR(100),
            mode VARCHAR(50),
            answer LONGTEXT,
            result_metadata TEXT,
            full_response LONGTEXT,
            created_at DATETIME NOT NULL,
            INDEX idx_task_results_task (task_id),
            INDEX idx_task_results_user (user_id)
        ) CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci",
    ];
    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
