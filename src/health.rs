//! Background health-check loop (spec §9's ambient observability note).
//!
//! Grounded directly on the teacher's self-healer: the same
//! `HealthCheck`/`HealthStatus`/`HealAction` vocabulary and the same
//! 30-second `run()` loop, with domain checks swapped for this crate's
//! two shared resources — the database pool each worker depends on, and
//! free disk space under the output directories a day's artifacts land
//! in.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub enum HealthStatus {
    Healthy,
    Degraded { reason: String },
    Unhealthy { reason: String },
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "HEALTHY"),
            HealthStatus::Degraded { reason } => write!(f, "DEGRADED: {reason}"),
            HealthStatus::Unhealthy { reason } => write!(f, "UNHEALTHY: {reason}"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum HealAction {
    Reconnected,
    NoActionNeeded,
    ManualInterventionRequired { reason: String },
}

impl std::fmt::Display for HealAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealAction::Reconnected => write!(f, "reconnected"),
            HealAction::NoActionNeeded => write!(f, "no action needed"),
            HealAction::ManualInterventionRequired { reason } => write!(f, "manual intervention required: {reason}"),
        }
    }
}

pub trait HealthCheck: Send + Sync {
    fn component_name(&self) -> &str;
    fn check(&self) -> HealthStatus;
    fn heal(&self) -> HealAction;
}

#[derive(Debug, Clone)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub last_checked: Instant,
    pub last_action: Option<HealAction>,
}

#[derive(Debug, Clone)]
pub struct SystemHealth {
    pub components: Vec<ComponentHealth>,
    pub overall: HealthStatus,
    pub check_cycles: u64,
}

impl SystemHealth {
    fn new() -> Self {
        Self {
            components: Vec::new(),
            overall: HealthStatus::Healthy,
            check_cycles: 0,
        }
    }
}

/// Checks staleness of a worker pool's `last_success_handle` (spec §4.6:
/// the pool already rebuilds on a transport error; this check only
/// surfaces when a pool has gone quiet for longer than a rebuild would
/// normally take).
pub struct DbHealthCheck {
    last_success: Arc<RwLock<Option<Instant>>>,
    timeout: Duration,
}

impl DbHealthCheck {
    pub fn new(last_success: Arc<RwLock<Option<Instant>>>) -> Self {
        Self {
            last_success,
            timeout: Duration::from_secs(300),
        }
    }
}

impl HealthCheck for DbHealthCheck {
    fn component_name(&self) -> &str {
        "Database Pool"
    }

    fn check(&self) -> HealthStatus {
        match self.last_success.try_read() {
            Ok(guard) => match *guard {
                Some(last) if last.elapsed() > self.timeout => HealthStatus::Unhealthy {
                    reason: format!("no successful query for {:.0}s", last.elapsed().as_secs()),
                },
                Some(_) => HealthStatus::Healthy,
                None => HealthStatus::Degraded {
                    reason: "no query has succeeded yet".to_string(),
                },
            },
            Err(_) => HealthStatus::Degraded {
                reason: "could not read pool's last-success timestamp (lock contention)".to_string(),
            },
        }
    }

    fn heal(&self) -> HealAction {
        warn!("database pool quiet for too long — rebuild is the pool's own responsibility");
        HealAction::ManualInterventionRequired {
            reason: "pool reconnection is handled by ManagedPool::run's retry loop".to_string(),
        }
    }
}

/// Disk-space check across every configured output root (spec §6.4:
/// mseed/signal/pdf/psd).
pub struct OutputDiskHealthCheck {
    paths: Vec<String>,
    min_free_bytes: u64,
}

impl OutputDiskHealthCheck {
    pub fn new(paths: Vec<String>) -> Self {
        Self {
            paths,
            min_free_bytes: 500 * 1024 * 1024,
        }
    }
}

impl HealthCheck for OutputDiskHealthCheck {
    fn component_name(&self) -> &str {
        "Output Disk Space"
    }

    fn check(&self) -> HealthStatus {
        let mut worst_free = u64::MAX;
        let mut worst_path = String::new();
        for path in &self.paths {
            match check_disk_free(path) {
                Ok(free) if free < worst_free => {
                    worst_free = free;
                    worst_path = path.clone();
                }
                Ok(_) => {}
                Err(e) => {
                    return HealthStatus::Degraded {
                        reason: format!("could not check disk space for {path}: {e}"),
                    }
                }
            }
        }
        if worst_free == u64::MAX {
            return HealthStatus::Healthy;
        }
        if worst_free < self.min_free_bytes {
            HealthStatus::Unhealthy {
                reason: format!(
                    "{worst_path} has only {:.0} MB free (minimum {:.0} MB)",
                    worst_free as f64 / 1_048_576.0,
                    self.min_free_bytes as f64 / 1_048_576.0
                ),
            }
        } else if worst_free < self.min_free_bytes * 2 {
            HealthStatus::Degraded {
                reason: format!("{worst_path} has {:.0} MB free — approaching minimum", worst_free as f64 / 1_048_576.0),
            }
        } else {
            HealthStatus::Healthy
        }
    }

    fn heal(&self) -> HealAction {
        warn!("output disk space low — new artifact writes may start failing");
        HealAction::NoActionNeeded
    }
}

fn check_disk_free(path: &str) -> Result<u64, String> {
    use std::mem::MaybeUninit;

    std::fs::create_dir_all(path).map_err(|e| e.to_string())?;
    let c_path = std::ffi::CString::new(path).map_err(|e| e.to_string())?;
    let mut stat = MaybeUninit::<libc::statvfs>::uninit();

    let result = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
    if result == 0 {
        let stat = unsafe { stat.assume_init() };
        Ok(stat.f_bfree * stat.f_bsize)
    } else {
        Err(format!("statvfs failed for {path}"))
    }
}

pub struct SelfHealer {
    checks: Vec<Box<dyn HealthCheck>>,
    health: Arc<RwLock<SystemHealth>>,
}

impl SelfHealer {
    pub fn new(checks: Vec<Box<dyn HealthCheck>>) -> Self {
        Self {
            checks,
            health: Arc::new(RwLock::new(SystemHealth::new())),
        }
    }

    pub fn health_handle(&self) -> Arc<RwLock<SystemHealth>> {
        self.health.clone()
    }

    /// Never returns under normal operation; the caller races it against a
    /// shutdown signal with `tokio::select!`.
    pub async fn run(self) {
        info!(checks = self.checks.len(), interval_secs = HEALTH_CHECK_INTERVAL.as_secs(), "self-healer started");
        loop {
            tokio::time::sleep(HEALTH_CHECK_INTERVAL).await;
            self.run_cycle().await;
        }
    }

    async fn run_cycle(&self) {
        let mut components = Vec::with_capacity(self.checks.len());
        let mut worst = HealthStatus::Healthy;

        for check in &self.checks {
            let status = check.check();
            let action = match &status {
                HealthStatus::Unhealthy { .. } => {
                    error!(component = check.component_name(), status = %status, "component unhealthy, attempting heal");
                    Some(check.heal())
                }
                HealthStatus::Degraded { .. } => {
                    warn!(component = check.component_name(), status = %status, "component degraded");
                    None
                }
                HealthStatus::Healthy => {
                    debug!(component = check.component_name(), "component healthy");
                    None
                }
            };

            if let Some(ref action) = action {
                info!(component = check.component_name(), action = %action, "heal action taken");
            }

            match (&worst, &status) {
                (HealthStatus::Healthy, HealthStatus::Degraded { .. } | HealthStatus::Unhealthy { .. }) => {
                    worst = status.clone();
                }
                (HealthStatus::Degraded { .. }, HealthStatus::Unhealthy { .. }) => worst = status.clone(),
                _ => {}
            }

            components.push(ComponentHealth {
                name: check.component_name().to_string(),
                status,
                last_checked: Instant::now(),
                last_action: action,
            });
        }

        let mut health = self.health.write().await;
        health.components = components;
        health.overall = worst;
        health.check_cycles += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysHealthy;
    impl HealthCheck for AlwaysHealthy {
        fn component_name(&self) -> &str {
            "always-healthy"
        }
        fn check(&self) -> HealthStatus {
            HealthStatus::Healthy
        }
        fn heal(&self) -> HealAction {
            HealAction::NoActionNeeded
        }
    }

    struct AlwaysUnhealthy;
    impl HealthCheck for AlwaysUnhealthy {
        fn component_name(&self) -> &str {
            "always-unhealthy"
        }
        fn check(&self) -> HealthStatus {
            HealthStatus::Unhealthy { reason: "simulated".to_string() }
        }
        fn heal(&self) -> HealAction {
            HealAction::Reconnected
        }
    }

    #[tokio::test]
    async fn overall_status_is_the_worst_of_its_components() {
        let healer = SelfHealer::new(vec![Box::new(AlwaysHealthy), Box::new(AlwaysUnhealthy)]);
        healer.run_cycle().await;
        let health = healer.health_handle().read().await.clone();
        assert_eq!(health.check_cycles, 1);
        assert!(matches!(health.overall, HealthStatus::Unhealthy { .. }));
    }

    #[tokio::test]
    async fn db_health_check_is_degraded_before_any_query_succeeds() {
        let handle: Arc<RwLock<Option<Instant>>> = Arc::new(RwLock::new(None));
        let check = DbHealthCheck::new(handle);
        assert!(matches!(check.check(), HealthStatus::Degraded { .. }));
    }

    #[tokio::test]
    async fn db_health_check_is_healthy_right_after_a_success() {
        let handle: Arc<RwLock<Option<Instant>>> = Arc::new(RwLock::new(Some(Instant::now())));
        let check = DbHealthCheck::new(handle);
        assert_eq!(check.check(), HealthStatus::Healthy);
    }

    #[test]
    fn output_disk_check_reports_healthy_for_a_writable_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let check = OutputDiskHealthCheck::new(vec![dir.path().to_str().unwrap().to_string()]);
        assert_eq!(check.check(), HealthStatus::Healthy);
    }
}
