use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};
use ww_core::{BlogStorage, Result, SharedConfig};
use ww_inference::BlogGenerator;
use ww_publish::WordPressClient;
use ww_scrapers::{Pipeline, RunOutcome};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub interval_minutes: Option<u64>,
    pub next_run: Option<DateTime<Utc>>,
    pub is_processing: bool,
}

/// What one scrape, generate and publish cycle did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    pub skipped: bool,
    pub new: usize,
    pub generated: usize,
    pub published: usize,
}

impl CycleReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

struct Job {
    handle: JoinHandle<()>,
    interval_minutes: u64,
    next_run: Arc<RwLock<DateTime<Utc>>>,
}

struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
struct Cycle {
    config: SharedConfig,
    pipeline: Arc<Pipeline>,
    generator: Arc<BlogGenerator>,
    blogs: Arc<dyn BlogStorage>,
    processing: Arc<AtomicBool>,
}

impl Cycle {
    async fn run(&self) -> Result<CycleReport> {
        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("Previous run still in progress, skipping");
            return Ok(CycleReport::skipped());
        }
        let _guard = ProcessingGuard(&self.processing);
        info!(at = %Utc::now(), "Scheduled run started");

        let summary = match self.pipeline.run().await? {
            RunOutcome::Completed(summary) => summary,
            RunOutcome::Skipped => return Ok(CycleReport::skipped()),
        };
        info!(new = summary.new, "Scrape finished");

        let mut report = CycleReport {
            new: summary.new,
            ..CycleReport::default()
        };
        let config = self.config.read().await.clone();
        if !config.auto_generate_blogs || summary.new == 0 {
            return Ok(report);
        }

        let blogs = self.generator.process_unprocessed(summary.new, None).await?;
        report.generated = blogs.len();
        info!(generated = report.generated, "Generated blog posts");

        if config.auto_publish_drafts && config.wordpress_configured() {
            let client = WordPressClient::from_config(&config)?;
            for mut blog in blogs {
                match client.publish_as_draft(&*self.blogs, &mut blog).await {
                    Ok(_) => report.published += 1,
                    Err(e) => warn!(blog_id = blog.id, error = %e, "Draft publish failed"),
                }
            }
            info!(published = report.published, "Published drafts to WordPress");
        }
        Ok(report)
    }
}

/// Runs the pipeline on the configured interval. The first run happens one
/// full interval after [`start`](Self::start).
#[derive(Clone)]
pub struct Scheduler {
    cycle: Cycle,
    job: Arc<Mutex<Option<Job>>>,
}

impl Scheduler {
    pub fn new(
        config: SharedConfig,
        pipeline: Arc<Pipeline>,
        generator: Arc<BlogGenerator>,
        blogs: Arc<dyn BlogStorage>,
    ) -> Self {
        Self {
            cycle: Cycle {
                config,
                pipeline,
                generator,
                blogs,
                processing: Arc::new(AtomicBool::new(false)),
            },
            job: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns `false` when already running.
    pub async fn start(&self) -> bool {
        let mut job = self.job.lock().await;
        if job.as_ref().is_some_and(|j| !j.handle.is_finished()) {
            return false;
        }

        let minutes = self.cycle.config.read().await.scrape_interval_minutes.max(1);
        let period = Duration::from_secs(minutes * 60);
        let step = ChronoDuration::minutes(minutes as i64);
        let next_run = Arc::new(RwLock::new(Utc::now() + step));

        let cycle = self.cycle.clone();
        let next = next_run.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                *next.write().await = Utc::now() + step;
                if let Err(e) = cycle.run().await {
                    error!(error = %e, "Scheduled run failed");
                }
            }
        });

        *job = Some(Job {
            handle,
            interval_minutes: minutes,
            next_run,
        });
        info!(interval_minutes = minutes, "Scheduler started");
        true
    }

    /// Returns `false` when nothing was running.
    pub async fn stop(&self) -> bool {
        match self.job.lock().await.take() {
            Some(job) => {
                job.handle.abort();
                info!("Scheduler stopped");
                true
            }
            None => false,
        }
    }

    pub async fn status(&self) -> SchedulerStatus {
        let job = self.job.lock().await;
        let is_processing = self.cycle.processing.load(Ordering::Acquire);
        match job.as_ref().filter(|j| !j.handle.is_finished()) {
            Some(job) => SchedulerStatus {
                running: true,
                interval_minutes: Some(job.interval_minutes),
                next_run: Some(*job.next_run.read().await),
                is_processing,
            },
            None => SchedulerStatus {
                running: false,
                interval_minutes: None,
                next_run: None,
                is_processing,
            },
        }
    }

    /// One cycle now, outside the timer.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        self.cycle.run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{feed_config, test_state, StaticFetcher, FEED_URL, RELEVANT_RSS};
    use ww_core::Config;

    #[tokio::test]
    async fn test_cycle_generates_for_new_articles() {
        let fetcher = StaticFetcher::new().page(FEED_URL, RELEVANT_RSS);
        let state = test_state(feed_config(), fetcher).await;

        let report = state.scheduler.run_cycle().await.unwrap();
        assert_eq!(
            report,
            CycleReport {
                skipped: false,
                new: 1,
                generated: 1,
                published: 0
            }
        );
        assert_eq!(state.storage.articles.count_unprocessed().await.unwrap(), 0);
        assert_eq!(state.storage.blogs.count_blogs(None).await.unwrap(), 1);

        let again = state.scheduler.run_cycle().await.unwrap();
        assert_eq!(again.new, 0);
        assert_eq!(again.generated, 0);
    }

    #[tokio::test]
    async fn test_cycle_respects_auto_generate_flag() {
        let mut config = feed_config();
        config.auto_generate_blogs = false;
        let fetcher = StaticFetcher::new().page(FEED_URL, RELEVANT_RSS);
        let state = test_state(config, fetcher).await;

        let report = state.scheduler.run_cycle().await.unwrap();
        assert_eq!(report.new, 1);
        assert_eq!(report.generated, 0);
        assert_eq!(state.storage.articles.count_unprocessed().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_start_stop_status() {
        let mut config = Config::default();
        config.scrape_interval_minutes = 30;
        let state = test_state(config, StaticFetcher::new()).await;
        let scheduler = &state.scheduler;

        let idle = scheduler.status().await;
        assert!(!idle.running);
        assert!(idle.next_run.is_none());

        assert!(scheduler.start().await);
        assert!(!scheduler.start().await);
        let status = scheduler.status().await;
        assert!(status.running);
        assert!(!status.is_processing);
        assert_eq!(status.interval_minutes, Some(30));
        let next = status.next_run.unwrap();
        assert!(next > Utc::now() + ChronoDuration::minutes(29));

        assert!(scheduler.stop().await);
        assert!(!scheduler.stop().await);
        assert!(!scheduler.status().await.running);
    }
}
