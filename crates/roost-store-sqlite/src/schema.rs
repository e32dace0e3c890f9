//! SQL schema for the Roost SQLite store.
//!
//! Executed once at connection startup. Decimal amounts and weights are
//! stored as canonical decimal strings so no binary floating-point ever
//! touches currency values. Timestamps are RFC 3339 UTC strings, which
//! sort lexicographically in chronological order.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS deliveries (
    id                     INTEGER PRIMARY KEY AUTOINCREMENT,
    customer_name          TEXT NOT NULL,
    customer_phone         TEXT,
    chick_type             TEXT NOT NULL,
    loaded_box_weight      TEXT NOT NULL,
    empty_box_weight       TEXT NOT NULL,
    net_weight             TEXT NOT NULL,
    number_of_boxes        INTEGER,
    notes                  TEXT NOT NULL DEFAULT '',
    loaded_weights_list    TEXT NOT NULL DEFAULT '[]',  -- JSON array of decimals
    empty_weights_list     TEXT NOT NULL DEFAULT '[]',
    order_id               INTEGER,
    price_per_kg           TEXT,
    total_amount           TEXT,
    account_transaction_id INTEGER,
    created_at             TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS orders (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    chick_type     TEXT NOT NULL,
    quantity       INTEGER NOT NULL,
    customer_name  TEXT NOT NULL,
    customer_phone TEXT NOT NULL,
    notes          TEXT NOT NULL DEFAULT '',
    status         TEXT NOT NULL DEFAULT 'pending',
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

-- Exactly one account per customer phone.
CREATE TABLE IF NOT EXISTS accounts (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    customer_phone TEXT NOT NULL UNIQUE,
    customer_name  TEXT NOT NULL,
    total_amount   TEXT NOT NULL DEFAULT '0',
    total_paid     TEXT NOT NULL DEFAULT '0',
    outstanding    TEXT NOT NULL DEFAULT '0',
    hidden         INTEGER NOT NULL DEFAULT 0,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

-- One id sequence across both ledger entry kinds.
CREATE TABLE IF NOT EXISTS transactions (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    customer_phone TEXT NOT NULL,
    customer_name  TEXT NOT NULL,
    kind           TEXT NOT NULL,   -- 'delivery' | 'payment'
    date           TEXT NOT NULL,   -- effective date; governs ordering
    amount         TEXT NOT NULL,
    kgs            TEXT,
    price_per_kg   TEXT,
    delivery_id    INTEGER,         -- originating delivery record, if any
    notes          TEXT NOT NULL DEFAULT '',
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS backups (
    filename         TEXT PRIMARY KEY,
    kind             TEXT NOT NULL,  -- 'manual' | 'automatic'
    payload          TEXT NOT NULL,  -- serialised SnapshotPayload
    deliveries_count INTEGER NOT NULL,
    orders_count     INTEGER NOT NULL,
    size             INTEGER NOT NULL,
    created_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS transactions_phone_idx    ON transactions(customer_phone);
CREATE INDEX IF NOT EXISTS transactions_delivery_idx ON transactions(delivery_id);
CREATE INDEX IF NOT EXISTS deliveries_created_idx    ON deliveries(created_at);
CREATE INDEX IF NOT EXISTS backups_created_idx       ON backups(created_at);

PRAGMA user_version = 1;
";
