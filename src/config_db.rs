use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::{criteria::IndexCriteria, error::Result};

const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");
const PROTECTED: TableDefinition<i64, ()> = TableDefinition::new("protected");

const CRITERIA_KEY: &str = "criteria";

/// Persistent configuration stored next to the index: the current
/// criteria (as JSON) and operator-managed protected-node overrides.
pub struct ConfigDb {
    db: Database,
}

impl ConfigDb {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        // Ensure all tables exist by opening them in a write transaction.
        let txn = db.begin_write()?;
        txn.open_table(SETTINGS)?;
        txn.open_table(PROTECTED)?;
        txn.commit()?;

        Ok(Self { db })
    }

    // -- Criteria --

    pub fn set_criteria(&self, criteria: &IndexCriteria) -> Result<()> {
        let json = serde_json::to_string(criteria)?;
        self.set_setting(CRITERIA_KEY, &json)
    }

    pub fn criteria(&self) -> Result<Option<IndexCriteria>> {
        match self.get_setting(CRITERIA_KEY)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    // -- Protected nodes --

    pub fn add_protected(&self, node_id: i64) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(PROTECTED)?;
            table.insert(node_id, ())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn remove_protected(&self, node_id: i64) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(PROTECTED)?;
            table.remove(node_id)?.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }

    pub fn protected_ids(&self) -> Result<Vec<i64>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(PROTECTED)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, _v) = entry?;
            result.push(k.value());
        }
        Ok(result)
    }

    // -- Settings --

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }
}

impl std::fmt::Debug for ConfigDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigDb").finish_non_exhaustive()
    }
}
