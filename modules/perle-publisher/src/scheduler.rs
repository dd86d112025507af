use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};
use thiserror::Error;
use tracing::{info, warn};

use crate::workflow::Workflow;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("schedule.times is empty")]
    Empty,

    #[error("Invalid schedule time {0:?}, expected HH:MM")]
    InvalidTime(String),
}

/// Fixed local times of day at which a cycle fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySchedule {
    times: Vec<NaiveTime>,
}

impl DailySchedule {
    pub fn parse<S: AsRef<str>>(times: &[S]) -> Result<Self, ScheduleError> {
        let mut parsed = times
            .iter()
            .map(|raw| {
                let raw = raw.as_ref().trim();
                NaiveTime::parse_from_str(raw, "%H:%M")
                    .map_err(|_| ScheduleError::InvalidTime(raw.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if parsed.is_empty() {
            return Err(ScheduleError::Empty);
        }
        parsed.sort();
        parsed.dedup();
        Ok(Self { times: parsed })
    }

    pub fn times(&self) -> &[NaiveTime] {
        &self.times
    }

    /// First fire time strictly after `now`. Local times that do not exist
    /// on a given day (DST gap) are skipped.
    pub fn next_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = now.timezone();
        let today = now.date_naive();
        (0..=2u64)
            .filter_map(|offset| today.checked_add_days(Days::new(offset)))
            .flat_map(|day| self.times.iter().map(move |t| day.and_time(*t)))
            .filter_map(|naive| tz.from_local_datetime(&naive).earliest())
            .find(|candidate| candidate > now)
    }
}

/// Fire cycles at the scheduled times until Ctrl-C. A cycle in flight is
/// finished before the loop exits.
pub async fn serve(workflow: &Workflow, schedule: &DailySchedule, run_now: bool) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    serve_until(workflow, schedule, run_now, ctrl_c).await;
}

/// Same as [`serve`], stopping when `shutdown` resolves. The shutdown future
/// stays armed for the whole run, including while a cycle executes.
pub async fn serve_until<F>(
    workflow: &Workflow,
    schedule: &DailySchedule,
    run_now: bool,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    if run_now {
        info!("Running startup cycle");
        if run_watching(workflow, shutdown.as_mut()).await {
            return;
        }
    }

    loop {
        let now = Local::now();
        let Some(next) = schedule.next_after(&now) else {
            warn!("No upcoming schedule time found, stopping");
            return;
        };
        let wait = (next.clone() - now).to_std().unwrap_or_default();
        info!(next = %next.format("%Y-%m-%d %H:%M %Z"), wait_secs = wait.as_secs(), "Next cycle scheduled");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.as_mut() => {
                info!("Shutdown requested");
                return;
            }
        }

        if run_watching(workflow, shutdown.as_mut()).await {
            return;
        }
    }
}

/// Runs one cycle to completion. Returns true if shutdown fired meanwhile.
async fn run_watching<F>(workflow: &Workflow, mut shutdown: Pin<&mut F>) -> bool
where
    F: Future<Output = ()>,
{
    let cycle = workflow.run_cycle();
    tokio::pin!(cycle);

    tokio::select! {
        _ = cycle.as_mut() => false,
        _ = shutdown.as_mut() => {
            info!("Shutdown requested, finishing cycle in flight");
            cycle.await;
            true
        }
    }
}
