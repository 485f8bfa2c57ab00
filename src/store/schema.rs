//! PostgreSQL schema for owners, holdings and movements

use sqlx::PgPool;

pub const CREATE_OWNERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS owners (
    id UUID PRIMARY KEY,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_HOLDINGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS holdings (
    id UUID PRIMARY KEY,
    owner_id UUID NOT NULL REFERENCES owners(id),
    asset VARCHAR(8) NOT NULL,
    balance NUMERIC NOT NULL DEFAULT 0 CHECK (balance >= 0),
    version BIGINT NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_HOLDINGS_OWNER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_holdings_owner ON holdings(owner_id)";

/// Kind: 1=TRANSFER 2=DEPOSIT 3=WITHDRAW 4=EXCHANGE
/// Status: 0=PENDING 10=COMPLETED -10=FAILED
pub const CREATE_MOVEMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS movements (
    id VARCHAR(26) PRIMARY KEY,
    kind SMALLINT NOT NULL,
    status SMALLINT NOT NULL DEFAULT 0,
    owner_id UUID NOT NULL,
    source_holding UUID REFERENCES holdings(id),
    dest_holding UUID REFERENCES holdings(id),
    source_asset VARCHAR(8) NOT NULL,
    dest_asset VARCHAR(8) NOT NULL,
    source_amount NUMERIC NOT NULL CHECK (source_amount > 0),
    dest_amount NUMERIC NOT NULL,
    rate NUMERIC NOT NULL CHECK (rate >= 0),
    failure_reason TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    completed_at TIMESTAMPTZ
)
"#;

pub const CREATE_MOVEMENTS_SOURCE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_movements_source ON movements(source_holding)";

pub const CREATE_MOVEMENTS_DEST_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_movements_dest ON movements(dest_holding)";

const STATEMENTS: [&str; 6] = [
    CREATE_OWNERS_TABLE,
    CREATE_HOLDINGS_TABLE,
    CREATE_HOLDINGS_OWNER_INDEX,
    CREATE_MOVEMENTS_TABLE,
    CREATE_MOVEMENTS_SOURCE_INDEX,
    CREATE_MOVEMENTS_DEST_INDEX,
];

/// Create tables and indexes if missing
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!("Ledger schema ready");
    Ok(())
}
