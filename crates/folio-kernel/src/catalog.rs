//! Declared schema for the admin backend.
//!
//! Tables are listed in their current full shape, so a fresh database needs no
//! column steps. The steps bring databases created by earlier releases up to
//! the same shape. Append new steps at the end; never edit or remove one.

use crate::schema::{ColumnStep, SchemaCatalog, TableSpec};

pub const SETTINGS_TABLE: &str = "settings";
pub const ACTIVITY_TABLE: &str = "activity_log";

pub const TABLES: &[TableSpec] = &[
    TableSpec {
        name: "users",
        columns: "id INTEGER PRIMARY KEY AUTOINCREMENT,
                  username TEXT UNIQUE NOT NULL,
                  password_hash TEXT NOT NULL DEFAULT '',
                  email TEXT,
                  role TEXT DEFAULT 'Editor',
                  joined_date TEXT",
    },
    TableSpec {
        name: "visits",
        columns: "id INTEGER PRIMARY KEY AUTOINCREMENT,
                  page TEXT,
                  device_type TEXT,
                  timestamp TEXT",
    },
    TableSpec {
        name: "messages",
        columns: "id INTEGER PRIMARY KEY AUTOINCREMENT,
                  name TEXT,
                  email TEXT,
                  message TEXT,
                  timestamp TEXT,
                  read_status INTEGER DEFAULT 0",
    },
    TableSpec {
        name: "testimonials",
        columns: "id INTEGER PRIMARY KEY AUTOINCREMENT,
                  name TEXT,
                  role TEXT,
                  review_text TEXT,
                  rating INTEGER,
                  image_url TEXT",
    },
    TableSpec {
        name: "projects",
        columns: "id INTEGER PRIMARY KEY AUTOINCREMENT,
                  title TEXT,
                  image_url TEXT,
                  link_url TEXT,
                  tags TEXT,
                  description TEXT,
                  status TEXT DEFAULT 'Live',
                  last_checked TEXT,
                  priority INTEGER DEFAULT 0",
    },
    TableSpec {
        name: "posts",
        columns: "id INTEGER PRIMARY KEY AUTOINCREMENT,
                  title TEXT,
                  content TEXT,
                  image_url TEXT,
                  date_posted TEXT,
                  status TEXT DEFAULT 'Published'",
    },
    TableSpec {
        name: SETTINGS_TABLE,
        columns: "key TEXT PRIMARY KEY,
                  value TEXT",
    },
    TableSpec {
        name: "ads",
        columns: "id INTEGER PRIMARY KEY AUTOINCREMENT,
                  title TEXT,
                  image_url TEXT,
                  link_url TEXT,
                  is_active INTEGER DEFAULT 1",
    },
    TableSpec {
        name: "coupons",
        columns: "id INTEGER PRIMARY KEY AUTOINCREMENT,
                  code TEXT,
                  discount TEXT,
                  is_active INTEGER DEFAULT 1",
    },
    TableSpec {
        name: "leads",
        columns: "id INTEGER PRIMARY KEY AUTOINCREMENT,
                  plan_name TEXT,
                  timestamp TEXT",
    },
    TableSpec {
        name: ACTIVITY_TABLE,
        columns: "id INTEGER PRIMARY KEY AUTOINCREMENT,
                  actor_id INTEGER,
                  actor_name TEXT,
                  action TEXT NOT NULL,
                  detail TEXT,
                  timestamp TEXT NOT NULL",
    },
    TableSpec {
        name: "marketing_ads",
        columns: "id INTEGER PRIMARY KEY AUTOINCREMENT,
                  title TEXT,
                  image_url TEXT,
                  link_url TEXT,
                  is_active INTEGER DEFAULT 0",
    },
    TableSpec {
        name: "pricing_plans",
        columns: "id INTEGER PRIMARY KEY AUTOINCREMENT,
                  name TEXT NOT NULL,
                  price TEXT NOT NULL,
                  billing_cycle TEXT,
                  features TEXT,
                  is_featured INTEGER DEFAULT 0,
                  border_color TEXT,
                  has_timer INTEGER DEFAULT 0",
    },
    TableSpec {
        name: "tools",
        columns: "id INTEGER PRIMARY KEY AUTOINCREMENT,
                  name TEXT NOT NULL,
                  description TEXT,
                  icon_url TEXT,
                  tool_url TEXT,
                  category TEXT,
                  is_locked INTEGER DEFAULT 0",
    },
];

const fn step(
    table: &'static str,
    column: &'static str,
    definition: &'static str,
) -> ColumnStep {
    ColumnStep {
        table,
        column,
        definition,
    }
}

pub const COLUMN_STEPS: &[ColumnStep] = &[
    step("users", "role", "TEXT DEFAULT 'Editor'"),
    step("users", "email", "TEXT"),
    step("users", "joined_date", "TEXT"),
    step("messages", "read_status", "INTEGER DEFAULT 0"),
    step("projects", "status", "TEXT DEFAULT 'Live'"),
    step("projects", "last_checked", "TEXT"),
    step("projects", "priority", "INTEGER DEFAULT 0"),
    step("posts", "status", "TEXT DEFAULT 'Published'"),
    step("pricing_plans", "is_featured", "INTEGER DEFAULT 0"),
    step("pricing_plans", "border_color", "TEXT"),
    step("pricing_plans", "has_timer", "INTEGER DEFAULT 0"),
    step("tools", "is_locked", "INTEGER DEFAULT 0"),
    // activity_log used user_id/username/details before the audit rewrite
    step(ACTIVITY_TABLE, "actor_id", "INTEGER"),
    step(ACTIVITY_TABLE, "actor_name", "TEXT"),
    step(ACTIVITY_TABLE, "detail", "TEXT"),
];

pub static CATALOG: SchemaCatalog = SchemaCatalog {
    tables: TABLES,
    columns: COLUMN_STEPS,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_step_targets_a_declared_table() {
        let tables: HashSet<_> = TABLES.iter().map(|t| t.name).collect();
        for s in COLUMN_STEPS {
            assert!(tables.contains(s.table), "{}.{}", s.table, s.column);
        }
    }

    #[test]
    fn steps_are_unique() {
        let mut seen = HashSet::new();
        for s in COLUMN_STEPS {
            assert!(seen.insert((s.table, s.column)), "{}.{}", s.table, s.column);
        }
    }

    #[test]
    fn step_defaults_are_constant() {
        // ALTER TABLE ADD COLUMN rejects non-constant defaults and NOT NULL without one
        for s in COLUMN_STEPS {
            let def = s.definition.to_ascii_uppercase();
            assert!(!def.contains("CURRENT_"), "{}.{}", s.table, s.column);
            assert!(!def.contains("NOT NULL"), "{}.{}", s.table, s.column);
        }
    }
}
