//! Usage data manager
//!
//! Collects snapshots from the registered collectors, writes them to dated
//! `.ud` files under the repository directory, and retains at most one file
//! per retention group (week/month/year) outside the current month.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{Datelike, Days, Local, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use cascata_common::FIELD_TIMESTAMP;

use crate::collector::Collector;

/// Snapshot file prefix, e.g. `cascata_2019-08-06.ud`
pub const FILE_PREFIX: &str = "cascata_";

/// Snapshot file extension
pub const FILE_EXT: &str = ".ud";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// How often a new snapshot file is kept by retention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileFrequency {
    Daily,
    Weekly,
    #[default]
    Monthly,
    Yearly,
}

impl std::str::FromStr for FileFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(FileFrequency::Daily),
            "weekly" => Ok(FileFrequency::Weekly),
            "monthly" => Ok(FileFrequency::Monthly),
            "yearly" => Ok(FileFrequency::Yearly),
            other => Err(format!("Invalid file frequency: {}", other)),
        }
    }
}

/// Collects usage snapshots into the repository directory
pub struct UsageDataManager {
    repository_dir: PathBuf,
    file_frequency: FileFrequency,
    collectors: Vec<Arc<dyn Collector>>,
    running: AtomicBool,
}

impl UsageDataManager {
    pub fn new(repository_dir: impl Into<PathBuf>, file_frequency: FileFrequency) -> Self {
        Self {
            repository_dir: repository_dir.into(),
            file_frequency,
            collectors: Vec::new(),
            running: AtomicBool::new(false),
        }
    }

    pub fn register_collector(&mut self, collector: Arc<dyn Collector>) {
        self.collectors.push(collector);
    }

    pub fn repository_dir(&self) -> &Path {
        &self.repository_dir
    }

    /// One snapshot: a timestamp plus the merge of every collector's fragment
    pub async fn collect(&self, parameters: &Map<String, Value>) -> Map<String, Value> {
        let mut result = Map::new();
        result.insert(
            FIELD_TIMESTAMP.to_string(),
            json!(Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        );

        let fragments = futures::future::join_all(
            self.collectors
                .iter()
                .map(|collector| collector.collect(parameters)),
        )
        .await;
        for fragment in fragments {
            result.extend(fragment);
        }

        result
    }

    /// Snapshot files currently in the repository
    pub fn collector_files(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(&self.repository_dir) else {
            return Vec::new();
        };
        entries
            .flatten()
            .filter(|entry| entry.path().is_file())
            .filter(|entry| {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                name.starts_with(FILE_PREFIX) && name.ends_with(FILE_EXT)
            })
            .map(|entry| entry.path())
            .collect()
    }

    /// Sorted dates of the snapshot files currently in the repository
    pub fn dates_of_collector_files(&self) -> Vec<String> {
        let mut dates: Vec<String> = self
            .collector_files()
            .iter()
            .filter_map(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .map(|name| name[FILE_PREFIX.len()..name.len() - FILE_EXT.len()].to_string())
            .collect();
        dates.sort();
        dates
    }

    /// Collect a snapshot and write it to the repository, then purge
    ///
    /// The file date comes from the snapshot's own timestamp.
    pub async fn save_to_repository(&self) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(&self.repository_dir)?;

        let mut result = self.collect(&Map::new()).await;

        let datetime = result
            .get(FIELD_TIMESTAMP)
            .and_then(Value::as_str)
            .and_then(|ts| ts.parse::<NaiveDateTime>().ok())
            .unwrap_or_else(|| Local::now().naive_local());
        result.insert(
            FIELD_TIMESTAMP.to_string(),
            json!(datetime.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        );

        let file_name = format!("{}{}{}", FILE_PREFIX, datetime.format(DATE_FORMAT), FILE_EXT);
        let path = self.repository_dir.join(file_name);
        let file = std::fs::File::create(&path)?;
        serde_json::to_writer(file, &Value::Object(result))?;

        self.purge_old_groups(Local::now().date_naive());

        Ok(path)
    }

    /// Delete all but the latest file of every retention group outside the
    /// current month
    fn purge_old_groups(&self, current: NaiveDate) {
        // daily files are already at the retention granularity
        if self.file_frequency == FileFrequency::Daily {
            return;
        }

        let dates = self.dates_of_collector_files();
        let groups = filter_date_and_group(&dates, current, self.file_frequency);

        for (_, mut group) in groups {
            group.sort();
            for date in &group[..group.len() - 1] {
                let path = self.repository_dir.join(format!(
                    "{}{}{}",
                    FILE_PREFIX,
                    date.format(DATE_FORMAT),
                    FILE_EXT
                ));
                if path.exists()
                    && let Err(e) = std::fs::remove_file(&path)
                {
                    warn!(path = %path.display(), "failed to purge snapshot: {e}");
                }
            }
        }
    }

    /// Save a snapshot every `interval` until [`stop`](Self::stop) is called
    pub async fn start(&self, interval: Duration) {
        if self.running.swap(true, Ordering::SeqCst) {
            info!("usage data scheduler already running");
            return;
        }

        info!(
            repository = %self.repository_dir.display(),
            "starting usage data scheduler"
        );

        let mut ticker = tokio::time::interval(interval);
        while self.running.load(Ordering::SeqCst) {
            ticker.tick().await;

            match self.save_to_repository().await {
                Ok(path) => info!(path = %path.display(), "saved usage snapshot"),
                Err(e) => warn!("failed to save usage snapshot: {e}"),
            }
        }

        info!("usage data scheduler stopped");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Group snapshot dates by retention key, excluding the current month
fn filter_date_and_group(
    dates: &[String],
    current: NaiveDate,
    frequency: FileFrequency,
) -> BTreeMap<NaiveDate, Vec<NaiveDate>> {
    let mut groups: BTreeMap<NaiveDate, Vec<NaiveDate>> = BTreeMap::new();

    for date in dates {
        let Ok(date) = NaiveDate::parse_from_str(date, DATE_FORMAT) else {
            continue;
        };
        // files of the current month are still being accumulated
        if (date.year(), date.month()) == (current.year(), current.month()) {
            continue;
        }
        let key = match frequency {
            FileFrequency::Weekly => {
                date - Days::new(u64::from(date.weekday().num_days_from_monday()))
            }
            FileFrequency::Monthly => date.with_day(1).unwrap_or(date),
            FileFrequency::Yearly => date.with_ordinal(1).unwrap_or(date),
            FileFrequency::Daily => date,
        };
        groups.entry(key).or_default().push(date);
    }

    groups
}
