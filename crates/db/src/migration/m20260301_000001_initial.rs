//! Initial database migration.
//!
//! Creates the enums, tables, uniqueness and check constraints, the
//! triggers that keep ledger rows append-only, and the per-month advisory
//! lock that serializes posting against period locking.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: HOUSES & RESIDENTS
        // ============================================================
        db.execute_unprepared(HOUSES_SQL).await?;
        db.execute_unprepared(RESIDENT_MEMBERSHIPS_SQL).await?;

        // ============================================================
        // PART 3: RECONCILIATION
        // ============================================================
        db.execute_unprepared(BANK_TRANSACTIONS_SQL).await?;
        db.execute_unprepared(PAY_INS_SQL).await?;
        db.execute_unprepared(MATCH_LINKS_SQL).await?;

        // ============================================================
        // PART 4: LEDGER
        // ============================================================
        db.execute_unprepared(INCOME_TRANSACTIONS_SQL).await?;
        db.execute_unprepared(INVOICES_SQL).await?;
        db.execute_unprepared(CREDIT_NOTES_SQL).await?;

        // ============================================================
        // PART 5: ACCOUNTING PERIODS
        // ============================================================
        db.execute_unprepared(PERIOD_SNAPSHOTS_SQL).await?;
        db.execute_unprepared(PERIOD_UNLOCK_LOGS_SQL).await?;

        // ============================================================
        // PART 6: TRIGGERS & FUNCTIONS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================================
// SQL DEFINITIONS
// ============================================================================

const ENUMS_SQL: &str = r"
CREATE TYPE house_status AS ENUM ('ACTIVE', 'INACTIVE');

CREATE TYPE membership_role AS ENUM ('OWNER', 'FAMILY');

CREATE TYPE membership_status AS ENUM ('ACTIVE', 'INACTIVE');

-- PENDING is kept so legacy rows load; new rows are written as SUBMITTED
CREATE TYPE pay_in_status AS ENUM (
    'DRAFT',
    'PENDING',
    'SUBMITTED',
    'REJECTED_NEEDS_FIX',
    'MATCHED',
    'ACCEPTED'
);

CREATE TYPE pay_in_source AS ENUM ('RESIDENT', 'ADMIN_CREATED', 'LINE_RECEIVED');

CREATE TYPE period_status AS ENUM ('DRAFT', 'LOCKED');
";

const HOUSES_SQL: &str = r"
CREATE TABLE houses (
    id UUID PRIMARY KEY,
    code VARCHAR(50) NOT NULL,
    status house_status NOT NULL DEFAULT 'ACTIVE',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_houses_code UNIQUE (code),
    CONSTRAINT chk_houses_code_not_blank CHECK (btrim(code) <> '')
);
";

const RESIDENT_MEMBERSHIPS_SQL: &str = r"
CREATE TABLE resident_memberships (
    id UUID PRIMARY KEY,
    house_id UUID NOT NULL REFERENCES houses(id) ON DELETE RESTRICT,
    user_id UUID NOT NULL,
    role membership_role NOT NULL,
    status membership_status NOT NULL DEFAULT 'ACTIVE',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_resident_memberships_house_user UNIQUE (house_id, user_id)
);

CREATE INDEX idx_resident_memberships_user ON resident_memberships(user_id);
";

const BANK_TRANSACTIONS_SQL: &str = r"
CREATE TABLE bank_transactions (
    id UUID PRIMARY KEY,
    effective_at TIMESTAMPTZ NOT NULL,
    credit NUMERIC(15, 2),
    debit NUMERIC(15, 2),
    description TEXT NOT NULL DEFAULT '',
    bank_reference VARCHAR(100),
    matched_pay_in_id UUID,
    imported_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_bank_transactions_matched_pay_in UNIQUE (matched_pay_in_id),
    CONSTRAINT chk_bank_transactions_one_side CHECK ((credit IS NULL) <> (debit IS NULL)),
    CONSTRAINT chk_bank_transactions_credit_positive CHECK (credit IS NULL OR credit > 0),
    CONSTRAINT chk_bank_transactions_debit_positive CHECK (debit IS NULL OR debit > 0)
);

CREATE INDEX idx_bank_transactions_unmatched_credits
    ON bank_transactions(id)
    WHERE credit IS NOT NULL AND matched_pay_in_id IS NULL;
";

const PAY_INS_SQL: &str = r"
CREATE TABLE pay_ins (
    id UUID PRIMARY KEY,
    house_id UUID NOT NULL REFERENCES houses(id) ON DELETE RESTRICT,
    amount NUMERIC(15, 2) NOT NULL,
    claimed_date DATE NOT NULL,
    claimed_hour SMALLINT NOT NULL,
    claimed_minute SMALLINT NOT NULL,
    transfer_at TIMESTAMPTZ NOT NULL,
    source pay_in_source NOT NULL,
    status pay_in_status NOT NULL,
    matched_bank_transaction_id UUID REFERENCES bank_transactions(id) ON DELETE RESTRICT,
    matched_by UUID,
    matched_at TIMESTAMPTZ,
    rejection_reason TEXT,
    created_by UUID NOT NULL,
    accepted_by UUID,
    accepted_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    version INTEGER NOT NULL DEFAULT 1,

    CONSTRAINT uq_pay_ins_matched_bank_transaction UNIQUE (matched_bank_transaction_id),
    CONSTRAINT chk_pay_ins_amount_positive CHECK (amount > 0),
    CONSTRAINT chk_pay_ins_claimed_hour CHECK (claimed_hour BETWEEN 0 AND 23),
    CONSTRAINT chk_pay_ins_claimed_minute CHECK (claimed_minute BETWEEN 0 AND 59),
    CONSTRAINT chk_pay_ins_link_requires_status CHECK (
        status IN ('MATCHED', 'ACCEPTED') OR matched_bank_transaction_id IS NULL
    ),
    CONSTRAINT chk_pay_ins_matched_has_link CHECK (
        status <> 'MATCHED' OR matched_bank_transaction_id IS NOT NULL
    ),
    CONSTRAINT chk_pay_ins_rejection_reason CHECK (
        status <> 'REJECTED_NEEDS_FIX' OR rejection_reason IS NOT NULL
    ),
    CONSTRAINT chk_pay_ins_accepted_audit CHECK (
        status <> 'ACCEPTED' OR (accepted_by IS NOT NULL AND accepted_at IS NOT NULL)
    ),
    CONSTRAINT chk_pay_ins_match_audit CHECK (
        matched_bank_transaction_id IS NOT NULL OR (matched_by IS NULL AND matched_at IS NULL)
    ),
    CONSTRAINT chk_pay_ins_version_positive CHECK (version > 0)
);

CREATE INDEX idx_pay_ins_house ON pay_ins(house_id);
CREATE INDEX idx_pay_ins_open ON pay_ins(id)
    WHERE status IN ('PENDING', 'SUBMITTED', 'REJECTED_NEEDS_FIX')
      AND matched_bank_transaction_id IS NULL;
";

const MATCH_LINKS_SQL: &str = r"
ALTER TABLE bank_transactions
    ADD CONSTRAINT fk_bank_transactions_matched_pay_in
    FOREIGN KEY (matched_pay_in_id) REFERENCES pay_ins(id) ON DELETE RESTRICT;
";

const INCOME_TRANSACTIONS_SQL: &str = r"
CREATE TABLE income_transactions (
    id UUID PRIMARY KEY,
    house_id UUID NOT NULL REFERENCES houses(id) ON DELETE RESTRICT,
    pay_in_id UUID NOT NULL REFERENCES pay_ins(id) ON DELETE RESTRICT,
    amount NUMERIC(15, 2) NOT NULL,
    received_on DATE NOT NULL,
    posted_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_income_transactions_pay_in UNIQUE (pay_in_id),
    CONSTRAINT chk_income_transactions_amount_positive CHECK (amount > 0)
);

CREATE INDEX idx_income_transactions_received_on ON income_transactions(received_on);
";

const INVOICES_SQL: &str = r"
CREATE TABLE invoices (
    id UUID PRIMARY KEY,
    house_id UUID NOT NULL REFERENCES houses(id) ON DELETE RESTRICT,
    total_amount NUMERIC(15, 2) NOT NULL,
    issued_on DATE NOT NULL,
    due_on DATE NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT chk_invoices_total_positive CHECK (total_amount > 0),
    CONSTRAINT chk_invoices_due_after_issue CHECK (due_on >= issued_on)
);

CREATE INDEX idx_invoices_house ON invoices(house_id);
";

const CREDIT_NOTES_SQL: &str = r"
CREATE TABLE credit_notes (
    id UUID PRIMARY KEY,
    invoice_id UUID NOT NULL REFERENCES invoices(id) ON DELETE RESTRICT,
    amount NUMERIC(15, 2) NOT NULL,
    reason TEXT NOT NULL,
    is_full_credit BOOLEAN NOT NULL DEFAULT FALSE,
    issued_by UUID NOT NULL,
    issued_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT chk_credit_notes_amount_positive CHECK (amount > 0),
    CONSTRAINT chk_credit_notes_reason_not_blank CHECK (btrim(reason) <> '')
);

CREATE INDEX idx_credit_notes_invoice ON credit_notes(invoice_id);
CREATE INDEX idx_credit_notes_issued_at ON credit_notes(issued_at);
";

const PERIOD_SNAPSHOTS_SQL: &str = r"
CREATE TABLE period_snapshots (
    id UUID PRIMARY KEY,
    year INTEGER NOT NULL,
    month INTEGER NOT NULL,
    status period_status NOT NULL DEFAULT 'DRAFT',
    income_total NUMERIC(15, 2) NOT NULL DEFAULT 0,
    credit_note_total NUMERIC(15, 2) NOT NULL DEFAULT 0,
    locked_at TIMESTAMPTZ,
    locked_by UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_period_snapshots_year_month UNIQUE (year, month),
    CONSTRAINT chk_period_snapshots_month CHECK (month BETWEEN 1 AND 12),
    CONSTRAINT chk_period_snapshots_locked_audit CHECK (
        status <> 'LOCKED' OR (locked_at IS NOT NULL AND locked_by IS NOT NULL)
    )
);
";

const PERIOD_UNLOCK_LOGS_SQL: &str = r"
CREATE TABLE period_unlock_logs (
    id UUID PRIMARY KEY,
    snapshot_id UUID NOT NULL REFERENCES period_snapshots(id) ON DELETE RESTRICT,
    previous_status period_status NOT NULL,
    reason TEXT NOT NULL,
    unlocked_by UUID NOT NULL,
    unlocked_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT chk_period_unlock_logs_reason_not_blank CHECK (btrim(reason) <> '')
);

CREATE INDEX idx_period_unlock_logs_snapshot ON period_unlock_logs(snapshot_id, unlocked_at);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: hold_period
-- Transaction-scoped advisory lock on one month. Posting takes it shared,
-- locking takes it exclusive.
-- ============================================================
CREATE OR REPLACE FUNCTION hold_period(p_year INTEGER, p_month INTEGER, p_exclusive BOOLEAN)
RETURNS VOID AS $$
BEGIN
    IF p_exclusive THEN
        PERFORM pg_advisory_xact_lock(hashtext('moobaan.period'), p_year * 100 + p_month);
    ELSE
        PERFORM pg_advisory_xact_lock_shared(hashtext('moobaan.period'), p_year * 100 + p_month);
    END IF;
END;
$$ LANGUAGE plpgsql;

-- ============================================================
-- FUNCTION: prevent_append_only_modification
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_append_only_modification()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'IMMUTABLE_RECORD: % rows cannot be changed or deleted', TG_TABLE_NAME;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_income_transactions_append_only
BEFORE UPDATE OR DELETE ON income_transactions
FOR EACH ROW
EXECUTE FUNCTION prevent_append_only_modification();

CREATE TRIGGER trg_credit_notes_append_only
BEFORE UPDATE OR DELETE ON credit_notes
FOR EACH ROW
EXECUTE FUNCTION prevent_append_only_modification();

CREATE TRIGGER trg_period_unlock_logs_append_only
BEFORE UPDATE OR DELETE ON period_unlock_logs
FOR EACH ROW
EXECUTE FUNCTION prevent_append_only_modification();

-- ============================================================
-- FUNCTION: prevent_accepted_pay_in_modification
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_accepted_pay_in_modification()
RETURNS TRIGGER AS $$
BEGIN
    IF OLD.status = 'ACCEPTED' THEN
        RAISE EXCEPTION 'IMMUTABLE_RECORD: accepted pay-in % cannot be changed', OLD.id;
    END IF;
    IF TG_OP = 'DELETE' THEN
        RETURN OLD;
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_pay_ins_accepted_immutable
BEFORE UPDATE OR DELETE ON pay_ins
FOR EACH ROW
EXECUTE FUNCTION prevent_accepted_pay_in_modification();

-- ============================================================
-- FUNCTION: check_income_period_open
-- ============================================================
CREATE OR REPLACE FUNCTION check_income_period_open()
RETURNS TRIGGER AS $$
BEGIN
    PERFORM hold_period(
        EXTRACT(YEAR FROM NEW.received_on)::INTEGER,
        EXTRACT(MONTH FROM NEW.received_on)::INTEGER,
        FALSE
    );
    IF EXISTS (
        SELECT 1 FROM period_snapshots
        WHERE year = EXTRACT(YEAR FROM NEW.received_on)::INTEGER
          AND month = EXTRACT(MONTH FROM NEW.received_on)::INTEGER
          AND status = 'LOCKED'
    ) THEN
        RAISE EXCEPTION 'PERIOD_LOCKED: %', to_char(NEW.received_on, 'YYYY-MM');
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_income_transactions_period_open
BEFORE INSERT ON income_transactions
FOR EACH ROW
EXECUTE FUNCTION check_income_period_open();
";

const DROP_ALL_SQL: &str = r"
DROP TRIGGER IF EXISTS trg_income_transactions_period_open ON income_transactions;
DROP TRIGGER IF EXISTS trg_pay_ins_accepted_immutable ON pay_ins;
DROP TRIGGER IF EXISTS trg_period_unlock_logs_append_only ON period_unlock_logs;
DROP TRIGGER IF EXISTS trg_credit_notes_append_only ON credit_notes;
DROP TRIGGER IF EXISTS trg_income_transactions_append_only ON income_transactions;

DROP FUNCTION IF EXISTS check_income_period_open();
DROP FUNCTION IF EXISTS prevent_accepted_pay_in_modification();
DROP FUNCTION IF EXISTS prevent_append_only_modification();
DROP FUNCTION IF EXISTS hold_period(INTEGER, INTEGER, BOOLEAN);

DROP TABLE IF EXISTS period_unlock_logs;
DROP TABLE IF EXISTS period_snapshots;
DROP TABLE IF EXISTS credit_notes;
DROP TABLE IF EXISTS invoices;
DROP TABLE IF EXISTS income_transactions;
ALTER TABLE IF EXISTS bank_transactions DROP CONSTRAINT IF EXISTS fk_bank_transactions_matched_pay_in;
DROP TABLE IF EXISTS pay_ins;
DROP TABLE IF EXISTS bank_transactions;
DROP TABLE IF EXISTS resident_memberships;
DROP TABLE IF EXISTS houses;

DROP TYPE IF EXISTS period_status;
DROP TYPE IF EXISTS pay_in_source;
DROP TYPE IF EXISTS pay_in_status;
DROP TYPE IF EXISTS membership_status;
DROP TYPE IF EXISTS membership_role;
DROP TYPE IF EXISTS house_status;
";
