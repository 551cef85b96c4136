//! SQL schema for the Folio SQLite partitions, for use with
//! [`crate::Partition::open`].
//!
//! Executed once when a partition is opened. Future migrations will be gated
//! on `PRAGMA user_version`.

/// DDL for a post partition: posts, their tag links, and their comments.
/// Idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const POSTS_SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS posts (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    uuid             TEXT NOT NULL UNIQUE,
    author_id        TEXT NOT NULL,
    text             TEXT NOT NULL,
    preview_text     TEXT NOT NULL,
    topic            TEXT NOT NULL,
    state            TEXT NOT NULL DEFAULT 'NEW'
                     CHECK (state IN ('NEW', 'ON_MODERATION', 'PUBLISHED', 'BLOCKED', 'DELETED')),
    create_date      TEXT NOT NULL,   -- RFC 3339 UTC; never updated
    last_update_date TEXT NOT NULL    -- RFC 3339 UTC; stamped by every write
);

-- tag_id points into the tag partition, a different database, so it cannot
-- carry a foreign key.
CREATE TABLE IF NOT EXISTS posts_and_tags (
    post_id INTEGER NOT NULL REFERENCES posts(id),
    tag_id  INTEGER NOT NULL,
    PRIMARY KEY (post_id, tag_id)
);

CREATE TABLE IF NOT EXISTS comments (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    uuid              TEXT NOT NULL UNIQUE,
    author_id         TEXT NOT NULL,
    post_id           INTEGER NOT NULL REFERENCES posts(id),
    linked_comment_id INTEGER,        -- reply target; not validated
    text              TEXT NOT NULL,
    state             TEXT NOT NULL DEFAULT 'NEW'
                      CHECK (state IN ('NEW', 'ON_MODERATION', 'PUBLISHED', 'BLOCKED', 'DELETED')),
    create_date       TEXT NOT NULL,
    last_update_date  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS comments_post_idx ON comments(post_id);

PRAGMA user_version = 1;
";

/// DDL for the dedicated tag partition.
pub const TAGS_SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS tags (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    CONSTRAINT tags_name_unique UNIQUE (name)
);

PRAGMA user_version = 1;
";
