//! Database schema definitions

use rusqlite::Connection;

/// Create the hub tables if they do not exist, as one committed unit
pub fn create_tables(conn: &mut Connection) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        r#"
        -- Lounges table
        CREATE TABLE IF NOT EXISTS lounges (
            id INTEGER PRIMARY KEY,
            name TEXT,
            bot_token TEXT UNIQUE NOT NULL,
            status INTEGER NOT NULL CHECK (status IN (0, 1)),
            active_user_count INTEGER DEFAULT 0,
            last_updated TIMESTAMP
        );

        -- Users table
        -- current_active_lounge also holds the '*' whitelist sentinel, which has no
        -- lounges row, so the reference is enforced by the store rather than by SQLite
        CREATE TABLE IF NOT EXISTS users (
            user_id INTEGER PRIMARY KEY,
            full_name TEXT,
            username TEXT,
            current_active_lounge TEXT,
            last_seen TIMESTAMP,
            universal_ban BOOLEAN NOT NULL DEFAULT FALSE,
            FOREIGN KEY (current_active_lounge) REFERENCES lounges(bot_token)
        );

        -- Settings table
        CREATE TABLE IF NOT EXISTS settings (
            setting TEXT PRIMARY KEY,
            value VARCHAR(255)
        );

        -- Indexes
        CREATE INDEX IF NOT EXISTS idx_lounges_status ON lounges(status);
        CREATE INDEX IF NOT EXISTS idx_users_lounge ON users(current_active_lounge);
        "#,
    )?;
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_count(conn: &Connection) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
             AND name IN ('lounges', 'users', 'settings')",
            [],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_create_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        create_tables(&mut conn).unwrap();
        assert_eq!(table_count(&conn), 3);
    }

    #[test]
    fn test_create_tables_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        create_tables(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO settings (setting, value) VALUES ('motd', 'hi')",
            [],
        )
        .unwrap();

        create_tables(&mut conn).unwrap();
        assert_eq!(table_count(&conn), 3);

        let value: String = conn
            .query_row("SELECT value FROM settings WHERE setting = 'motd'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(value, "hi");
    }

    #[test]
    fn test_status_check_constraint() {
        let mut conn = Connection::open_in_memory().unwrap();
        create_tables(&mut conn).unwrap();
        let result = conn.execute(
            "INSERT INTO lounges (name, bot_token, status) VALUES ('x', 'T', 7)",
            [],
        );
        assert!(result.is_err());
    }
}
