//! SQLite persistence for the preset bank
//!
//! One row per occupied slot in `presets`, chain entries in
//! `preset_effects`. Optional sections are stored as NULL columns.

use pedal_audio::{AmpModel, EffectType, MAX_PARAMS};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tracing::{debug, info};

use crate::presets::{
    AmpSettings, CabinetSettings, GateSettings, LevelSettings, PresetBank, PresetData,
    PresetEffect, PresetError, MAX_PRESETS,
};

/// Preset bank backed by SQLite
pub struct PresetStore {
    conn: Connection,
}

impl PresetStore {
    const SCHEMA: &'static str = r#"
        CREATE TABLE IF NOT EXISTS presets (
            slot INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            amp_enabled INTEGER,
            amp_model TEXT,
            amp_gain REAL,
            amp_bass REAL,
            amp_mid REAL,
            amp_treble REAL,
            amp_presence REAL,
            amp_master REAL,
            cab_enabled INTEGER,
            cab_slot INTEGER,
            gate_enabled INTEGER,
            gate_threshold_db REAL,
            gate_ratio REAL,
            input_gain REAL,
            output_level REAL,
            saved_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS preset_effects (
            slot INTEGER NOT NULL REFERENCES presets(slot) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            effect TEXT NOT NULL,
            enabled INTEGER NOT NULL,
            p0 REAL NOT NULL,
            p1 REAL NOT NULL,
            p2 REAL NOT NULL,
            p3 REAL NOT NULL,
            PRIMARY KEY (slot, position)
        );
        PRAGMA foreign_keys = ON;
    "#;

    const SELECT_PRESET: &'static str = "SELECT name, amp_enabled, amp_model, amp_gain, amp_bass, amp_mid,
                amp_treble, amp_presence, amp_master, cab_enabled, cab_slot,
                gate_enabled, gate_threshold_db, gate_ratio, input_gain, output_level
         FROM presets WHERE slot = ?1";

    /// Open or create a preset database at the given path
    pub fn open(db_path: &Path) -> Result<Self, PresetError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        conn.execute_batch(Self::SCHEMA)?;
        debug!(path = %db_path.display(), "preset store opened");
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing)
    pub fn in_memory() -> Result<Self, PresetError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(Self::SCHEMA)?;
        Ok(Self { conn })
    }

    /// Number of stored presets
    pub fn count(&self) -> Result<usize, PresetError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM presets", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Write one slot, replacing what was there
    pub fn save_slot(&mut self, slot: usize, preset: &PresetData) -> Result<(), PresetError> {
        if slot >= MAX_PRESETS {
            return Err(PresetError::InvalidSlot(slot));
        }
        let tx = self.conn.transaction()?;
        Self::write_slot(&tx, slot, preset)?;
        tx.commit()?;
        Ok(())
    }

    fn write_slot(conn: &Connection, slot: usize, p: &PresetData) -> Result<(), PresetError> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;

        let f = |v: f32| v as f64;
        conn.execute("DELETE FROM preset_effects WHERE slot = ?1", params![slot as i64])?;
        conn.execute(
            r#"INSERT OR REPLACE INTO presets
               (slot, name, amp_enabled, amp_model, amp_gain, amp_bass, amp_mid,
                amp_treble, amp_presence, amp_master, cab_enabled, cab_slot,
                gate_enabled, gate_threshold_db, gate_ratio, input_gain, output_level, saved_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"#,
            params![
                slot as i64,
                p.name,
                p.amp.map(|a| a.enabled),
                p.amp.map(|a| a.model.name()),
                p.amp.map(|a| f(a.gain)),
                p.amp.map(|a| f(a.bass)),
                p.amp.map(|a| f(a.mid)),
                p.amp.map(|a| f(a.treble)),
                p.amp.map(|a| f(a.presence)),
                p.amp.map(|a| f(a.master)),
                p.cabinet.map(|c| c.enabled),
                p.cabinet.map(|c| c.slot as i64),
                p.noise_gate.map(|g| g.enabled),
                p.noise_gate.map(|g| f(g.threshold_db)),
                p.noise_gate.map(|g| f(g.ratio)),
                p.levels.map(|l| f(l.input_gain)),
                p.levels.map(|l| f(l.output_level)),
                now,
            ],
        )?;

        let mut stmt = conn.prepare(
            "INSERT INTO preset_effects (slot, position, effect, enabled, p0, p1, p2, p3)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for (position, e) in p.effects.iter().enumerate() {
            stmt.execute(params![
                slot as i64,
                position as i64,
                e.effect.name(),
                e.enabled,
                f(e.params[0]),
                f(e.params[1]),
                f(e.params[2]),
                f(e.params[3]),
            ])?;
        }
        Ok(())
    }

    pub fn delete_slot(&self, slot: usize) -> Result<(), PresetError> {
        self.conn
            .execute("DELETE FROM preset_effects WHERE slot = ?1", params![slot as i64])?;
        self.conn
            .execute("DELETE FROM presets WHERE slot = ?1", params![slot as i64])?;
        Ok(())
    }

    /// Read one slot, `None` if it was never saved
    pub fn load_slot(&self, slot: usize) -> Result<Option<PresetData>, PresetError> {
        let header = self
            .conn
            .query_row(Self::SELECT_PRESET, params![slot as i64], Self::read_header)
            .optional()?;

        let Some(header) = header else {
            return Ok(None);
        };
        let mut preset = header?;

        let mut stmt = self.conn.prepare(
            "SELECT effect, enabled, p0, p1, p2, p3 FROM preset_effects
             WHERE slot = ?1 ORDER BY position ASC",
        )?;
        let rows = stmt.query_map(params![slot as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, bool>(1)?,
                [
                    row.get::<_, f64>(2)? as f32,
                    row.get::<_, f64>(3)? as f32,
                    row.get::<_, f64>(4)? as f32,
                    row.get::<_, f64>(5)? as f32,
                ],
            ))
        })?;

        for row in rows {
            let (name, enabled, params) = row?;
            let effect = EffectType::from_name(&name)
                .ok_or_else(|| PresetError::Corrupt(format!("unknown effect {}", name)))?;
            let mut p = [0.0; MAX_PARAMS];
            p.copy_from_slice(&params);
            preset.effects.push(PresetEffect {
                effect,
                enabled,
                params: p,
            });
        }

        Ok(Some(preset))
    }

    /// Decode the `presets` row. The outer error is SQLite's, the inner one
    /// flags values this build doesn't understand.
    fn read_header(row: &Row<'_>) -> rusqlite::Result<Result<PresetData, PresetError>> {
        let real = |i: usize| -> rusqlite::Result<Option<f32>> {
            Ok(row.get::<_, Option<f64>>(i)?.map(|v| v as f32))
        };

        let name: String = row.get(0)?;
        let amp_enabled: Option<bool> = row.get(1)?;
        let amp_model: Option<String> = row.get(2)?;
        let cab_enabled: Option<bool> = row.get(9)?;
        let cab_slot: Option<i64> = row.get(10)?;
        let gate_enabled: Option<bool> = row.get(11)?;

        let amp = match (amp_enabled, amp_model) {
            (Some(enabled), Some(model_name)) => {
                let Some(model) = AmpModel::from_name(&model_name) else {
                    return Ok(Err(PresetError::Corrupt(format!("unknown amp model {}", model_name))));
                };
                Some(AmpSettings {
                    enabled,
                    model,
                    gain: real(3)?.unwrap_or(0.5),
                    bass: real(4)?.unwrap_or(0.5),
                    mid: real(5)?.unwrap_or(0.5),
                    treble: real(6)?.unwrap_or(0.5),
                    presence: real(7)?.unwrap_or(0.3),
                    master: real(8)?.unwrap_or(0.7),
                })
            }
            _ => None,
        };

        let cabinet = match (cab_enabled, cab_slot) {
            (Some(enabled), Some(slot)) => Some(CabinetSettings {
                enabled,
                slot: slot.max(0) as usize,
            }),
            _ => None,
        };

        let noise_gate = gate_enabled.map(|enabled| -> rusqlite::Result<GateSettings> {
            Ok(GateSettings {
                enabled,
                threshold_db: real(12)?.unwrap_or(GateSettings::OFF.threshold_db),
                ratio: real(13)?.unwrap_or(GateSettings::OFF.ratio),
            })
        });
        let noise_gate = noise_gate.transpose()?;

        let levels = match (real(14)?, real(15)?) {
            (Some(input_gain), Some(output_level)) => Some(LevelSettings {
                input_gain,
                output_level,
            }),
            _ => None,
        };

        Ok(Ok(PresetData {
            name,
            effects: Vec::new(),
            amp,
            cabinet,
            noise_gate,
            levels,
        }))
    }

    /// Replace the stored bank with `bank`
    pub fn save_bank(&mut self, bank: &PresetBank) -> Result<(), PresetError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM preset_effects", [])?;
        tx.execute("DELETE FROM presets", [])?;
        for slot in 0..MAX_PRESETS {
            if let Some(preset) = bank.get(slot) {
                Self::write_slot(&tx, slot, preset)?;
            }
        }
        tx.commit()?;
        info!(presets = bank.valid_count(), "preset bank saved");
        Ok(())
    }

    /// Read the stored bank. An empty database yields the factory bank.
    pub fn load_bank(&self) -> Result<PresetBank, PresetError> {
        if self.count()? == 0 {
            debug!("preset store empty, using factory presets");
            return Ok(PresetBank::factory());
        }

        let mut bank = PresetBank::empty();
        for slot in 0..MAX_PRESETS {
            if let Some(preset) = self.load_slot(slot)? {
                bank.set(slot, preset)?;
            }
        }
        Ok(bank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::{factory_presets, IncludeFlags};

    #[test]
    fn test_empty_store_gives_factory_bank() {
        let store = PresetStore::in_memory().unwrap();
        assert_eq!(store.count().unwrap(), 0);
        let bank = store.load_bank().unwrap();
        assert_eq!(bank.valid_count(), MAX_PRESETS);
    }

    #[test]
    fn test_bank_roundtrip() {
        let mut store = PresetStore::in_memory().unwrap();
        let mut bank = PresetBank::factory();
        bank.clear(6).unwrap();
        store.save_bank(&bank).unwrap();
        assert_eq!(store.count().unwrap(), MAX_PRESETS - 1);

        let loaded = store.load_bank().unwrap();
        for slot in 0..MAX_PRESETS {
            assert_eq!(loaded.get(slot), bank.get(slot), "slot {}", slot);
        }
    }

    #[test]
    fn test_partial_preset_keeps_missing_sections() {
        let mut store = PresetStore::in_memory().unwrap();
        let pedal = pedal_audio::Pipeline::default();
        let include = IncludeFlags {
            amp: false,
            levels: false,
            ..IncludeFlags::default()
        };
        let preset = PresetData::capture(&pedal, "Bare", include);
        store.save_slot(3, &preset).unwrap();

        let loaded = store.load_slot(3).unwrap().unwrap();
        assert_eq!(loaded, preset);
        assert!(loaded.amp.is_none());
        assert!(loaded.levels.is_none());
        assert!(loaded.cabinet.is_some());
    }

    #[test]
    fn test_overwrite_and_delete() {
        let mut store = PresetStore::in_memory().unwrap();
        let presets = factory_presets();
        store.save_slot(0, &presets[7]).unwrap();
        store.save_slot(0, &presets[0]).unwrap();
        let loaded = store.load_slot(0).unwrap().unwrap();
        assert_eq!(loaded.effects.len(), presets[0].effects.len());
        assert_eq!(loaded.name, "Clean Sparkle");

        store.delete_slot(0).unwrap();
        assert!(store.load_slot(0).unwrap().is_none());
        assert!(matches!(store.save_slot(8, &presets[0]), Err(PresetError::InvalidSlot(8))));
    }
}
