//! Table layout for the SQL catalog backends.
//!
//! `sort_order` carries the catalog's insertion order. Tables created by
//! earlier deployments only have the first three columns and pick it up
//! through the migrations. `photo_meta` holds a single row with the highest
//! id ever assigned, so removed ids stay retired across restarts.

pub const SQLITE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS photo (
    id INTEGER PRIMARY KEY,
    image_path VARCHAR(200) NOT NULL,
    caption VARCHAR(200) NOT NULL,
    sort_order INTEGER
);

CREATE TABLE IF NOT EXISTS photo_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    last_id INTEGER NOT NULL
);
"#;

/// Applied after the schema; failures (column already present) are ignored.
pub const SQLITE_MIGRATIONS: &[&str] = &["ALTER TABLE photo ADD COLUMN sort_order INTEGER"];

#[cfg(feature = "postgres")]
pub const POSTGRES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS photo (
    id INTEGER PRIMARY KEY,
    image_path VARCHAR(200) NOT NULL,
    caption VARCHAR(200) NOT NULL,
    sort_order INTEGER
);

ALTER TABLE photo ADD COLUMN IF NOT EXISTS sort_order INTEGER;

CREATE TABLE IF NOT EXISTS photo_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    last_id INTEGER NOT NULL
);
"#;

/// Shared by both backends; rows without a `sort_order` come last, by id.
pub const SELECT_PHOTOS: &str =
    "SELECT id, image_path, caption FROM photo ORDER BY sort_order IS NULL, sort_order, id";

pub const SELECT_LAST_ID: &str = "SELECT last_id FROM photo_meta WHERE id = 1";

pub const SQLITE_UPSERT_LAST_ID: &str = "INSERT INTO photo_meta (id, last_id) VALUES (1, ?1)
     ON CONFLICT (id) DO UPDATE SET last_id = excluded.last_id";

#[cfg(feature = "postgres")]
pub const POSTGRES_UPSERT_LAST_ID: &str = "INSERT INTO photo_meta (id, last_id) VALUES (1, $1)
     ON CONFLICT (id) DO UPDATE SET last_id = EXCLUDED.last_id";
