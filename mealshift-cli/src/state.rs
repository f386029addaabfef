use anyhow::{Context, Result};
use chrono::NaiveDate;
use mealshift_core::{DayPlan, DayPlanStore, KernelError, Proposal};
use std::fs;
use std::path::{Path, PathBuf};

/// `$MEALSHIFT_HOME`, else `~/.mealshift`.
pub fn mealshift_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("MEALSHIFT_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".mealshift"))
}

pub fn ensure_mealshift_home() -> Result<PathBuf> {
    let dir = mealshift_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// Day plans as `days/<date>.json`, plus the single pending proposal.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn day_path(&self, day: NaiveDate) -> PathBuf {
        self.root.join("days").join(format!("{day}.json"))
    }

    pub fn pending_path(&self) -> PathBuf {
        self.root.join("pending.json")
    }

    pub fn load_pending(&self) -> Result<Option<Proposal>> {
        let p = self.pending_path();
        if !p.exists() {
            return Ok(None);
        }
        let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
        let proposal = serde_json::from_str(&s).with_context(|| format!("parse {}", p.display()))?;
        Ok(Some(proposal))
    }

    pub fn save_pending(&self, proposal: &Proposal) -> Result<()> {
        let p = self.pending_path();
        fs::create_dir_all(&self.root).with_context(|| format!("create {}", self.root.display()))?;
        let json = serde_json::to_string_pretty(proposal)?;
        fs::write(&p, json).with_context(|| format!("write {}", p.display()))?;
        Ok(())
    }

    pub fn clear_pending(&self) -> Result<()> {
        let p = self.pending_path();
        if p.exists() {
            fs::remove_file(&p).with_context(|| format!("remove {}", p.display()))?;
        }
        Ok(())
    }
}

fn read_plan(path: &Path) -> Result<DayPlan, KernelError> {
    let s = fs::read_to_string(path)
        .map_err(|e| KernelError::store(format!("read {}", path.display()), e))?;
    serde_json::from_str(&s).map_err(|e| KernelError::store(format!("parse {}", path.display()), e))
}

impl DayPlanStore for FileStore {
    fn load(&self, day: NaiveDate) -> Result<Option<DayPlan>, KernelError> {
        let p = self.day_path(day);
        if !p.exists() {
            return Ok(None);
        }
        read_plan(&p).map(Some)
    }

    fn save(&mut self, plan: &DayPlan) -> Result<(), KernelError> {
        let p = self.day_path(plan.day());
        if let Some(dir) = p.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| KernelError::store(format!("create {}", dir.display()), e))?;
        }
        let json = serde_json::to_string_pretty(plan)
            .map_err(|e| KernelError::store("serialize day plan", e))?;
        fs::write(&p, json).map_err(|e| KernelError::store(format!("write {}", p.display()), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use mealshift_core::{MacroTargets, RedistributionKernel, Window, WindowPurpose};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, 0, 0).unwrap()
    }

    fn plan() -> DayPlan {
        let w = |id: &str, s: u32, p: f64, c: f64, f: f64| {
            Window::new(
                id,
                id,
                at(s),
                at(s + 2),
                WindowPurpose::SustainedEnergy,
                MacroTargets::new(p, c, f).unwrap(),
            )
            .unwrap()
        };
        DayPlan::new(
            day(),
            vec![w("w1", 7, 35.0, 70.0, 20.0), w("w2", 12, 40.0, 90.0, 20.0), w("w3", 18, 40.0, 90.0, 20.0)],
            None,
        )
        .unwrap()
    }

    #[test]
    fn day_plan_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path());
        assert!(store.load(day()).unwrap().is_none());

        store.save(&plan()).unwrap();
        assert!(dir.path().join("days").join("2026-03-02.json").exists());
        assert_eq!(store.load(day()).unwrap(), Some(plan()));
    }

    #[test]
    fn corrupt_plan_is_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        fs::create_dir_all(dir.path().join("days")).unwrap();
        fs::write(store.day_path(day()), "{ not json").unwrap();
        assert!(matches!(store.load(day()), Err(KernelError::Store { .. })));
    }

    #[test]
    fn pending_proposal_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let mut kernel = RedistributionKernel::new(FileStore::new(dir.path()));
        kernel.install(&plan()).unwrap();

        let proposal = kernel
            .log_meal(day(), "w1", MacroTargets::new(60.0, 120.0, 20.0).unwrap(), at(8))
            .unwrap()
            .unwrap();

        let files = kernel.store().clone();
        assert!(files.load_pending().unwrap().is_none());
        files.save_pending(&proposal).unwrap();
        let loaded = files.load_pending().unwrap().unwrap();
        assert_eq!(loaded, proposal);

        let accepted = kernel.accept(&loaded).unwrap();
        files.clear_pending().unwrap();
        assert!(files.load_pending().unwrap().is_none());

        // The accepted targets are what a fresh store sees on disk.
        let reread = FileStore::new(dir.path()).load(day()).unwrap().unwrap();
        assert_eq!(reread, accepted);
        assert_eq!(reread.window("w2").unwrap().effective_target().total_calories(), 500);
    }
}
