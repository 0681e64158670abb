//! Per-term retrieval → summarization → assembly.
//!
//! Every term becomes an independent unit of work: fetch one article, then
//! summarize its description. Units run under a bounded concurrency limit
//! (`buffer_unordered`) so external rate limits are respected while one slow
//! call never holds up the others.
//!
//! Each unit writes its [`UnitOutcome`] exactly once into its own slot of a
//! results buffer laid out in input (ascending rank) order. The slots are
//! disjoint, so no lock guards the buffer. A global deadline drops whatever
//! is still in flight; finished slots are kept and the unfinished ones
//! become skips attributed to the stage they were in.
//!
//! Per-term failures are diagnostics, never errors: the run always produces
//! a [`Report`], possibly header-only.

use crate::config::PipelineConfig;
use crate::delivery::{DeliveryDispatcher, Notifier};
use crate::error::{AppError, FetchError, SkipReason, SummarizeError};
use crate::models::{ReportEntry, Summary, TrendTerm, UnitOutcome};
use crate::outputs::report::{Report, ReportAssembler};
use crate::outputs::store::ArtifactStore;
use crate::sources::newsapi::FetchArticle;
use crate::summarizer::Summarize;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{info, instrument, warn};

/// Concurrency and time bounds for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    pub concurrency: usize,
    pub unit_timeout: Duration,
    pub deadline: Duration,
}

impl RunLimits {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            unit_timeout: Duration::from_secs(config.unit_timeout_secs),
            deadline: Duration::from_secs(config.deadline_secs),
        }
    }
}

/// The assembled report plus every term that did not make it in.
#[derive(Debug)]
pub struct RunReport {
    pub report: Report,
    pub skipped: Vec<(TrendTerm, SkipReason)>,
    /// `false` when the global deadline cut the run short.
    pub completed: bool,
}

const STAGE_FETCH: u8 = 0;
const STAGE_SUMMARIZE: u8 = 1;

/// Drives fetch + summarize for all terms and assembles the result.
#[derive(Debug)]
pub struct Orchestrator<F, S> {
    fetcher: F,
    summarizer: S,
    assembler: ReportAssembler,
}

impl<F, S> Orchestrator<F, S>
where
    F: FetchArticle,
    S: Summarize,
{
    pub fn new(fetcher: F, summarizer: S, assembler: ReportAssembler) -> Self {
        Self {
            fetcher,
            summarizer,
            assembler,
        }
    }

    /// Process `terms` (ascending rank) and assemble the day's report.
    #[instrument(level = "info", skip_all, fields(%date, terms = terms.len()))]
    pub async fn run(&self, date: NaiveDate, terms: &[TrendTerm], limits: RunLimits) -> RunReport {
        let t0 = Instant::now();
        let slots: Vec<OnceLock<UnitOutcome>> = terms.iter().map(|_| OnceLock::new()).collect();
        let stages: Vec<AtomicU8> = terms.iter().map(|_| AtomicU8::new(STAGE_FETCH)).collect();

        info!(
            concurrency = limits.concurrency,
            unit_timeout = ?limits.unit_timeout,
            deadline = ?limits.deadline,
            "Starting units"
        );

        let unit_timeout = limits.unit_timeout;
        let units = stream::iter(terms.iter().zip(slots.iter().zip(stages.iter())))
            .map(move |(term, (slot, stage))| async move {
                let outcome = self.run_unit(term, stage, unit_timeout).await;
                // one writer per slot
                let _ = slot.set(outcome);
            })
            .buffer_unordered(limits.concurrency.max(1))
            .for_each(|()| std::future::ready(()));

        let completed = timeout_at(t0 + limits.deadline, units).await.is_ok();
        if !completed {
            warn!(deadline = ?limits.deadline, "Run deadline elapsed; abandoning pending units");
        }

        let mut included = Vec::new();
        let mut skipped = Vec::new();
        for ((term, slot), stage) in terms.iter().zip(slots).zip(stages) {
            let outcome = slot.into_inner().unwrap_or_else(|| {
                let reason = if stage.into_inner() == STAGE_SUMMARIZE {
                    SkipReason::Summarize(SummarizeError::Cancelled)
                } else {
                    SkipReason::Fetch(FetchError::Cancelled)
                };
                UnitOutcome::Skipped(term.clone(), reason)
            });
            match outcome {
                UnitOutcome::Included(entry) => included.push(entry),
                UnitOutcome::Skipped(term, reason) => {
                    warn!(
                        rank = term.rank,
                        term = %term.text,
                        reason = reason.kind(),
                        error = %reason,
                        "Skipped term"
                    );
                    skipped.push((term, reason));
                }
            }
        }

        let report = self.assembler.assemble(date, included);
        info!(
            included = report.len(),
            skipped = skipped.len(),
            completed,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Units finished"
        );
        RunReport {
            report,
            skipped,
            completed,
        }
    }

    async fn run_unit(&self, term: &TrendTerm, stage: &AtomicU8, unit_timeout: Duration) -> UnitOutcome {
        match timeout(unit_timeout, self.fetch_and_summarize(term, stage)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let reason = if stage.load(Ordering::Acquire) == STAGE_SUMMARIZE {
                    SkipReason::Summarize(SummarizeError::UnitTimeout(unit_timeout))
                } else {
                    SkipReason::Fetch(FetchError::UnitTimeout(unit_timeout))
                };
                UnitOutcome::Skipped(term.clone(), reason)
            }
        }
    }

    #[instrument(level = "info", skip_all, fields(rank = term.rank, term = %term.text))]
    async fn fetch_and_summarize(&self, term: &TrendTerm, stage: &AtomicU8) -> UnitOutcome {
        let article = match self.fetcher.fetch(term).await {
            Ok(Some(article)) => article,
            Ok(None) => return UnitOutcome::Skipped(term.clone(), SkipReason::NotFound),
            Err(e) => return UnitOutcome::Skipped(term.clone(), e.into()),
        };

        stage.store(STAGE_SUMMARIZE, Ordering::Release);
        match self.summarizer.summarize(&article.description).await {
            Ok(bullet_lines) => {
                let summary = Summary {
                    term: term.clone(),
                    bullet_lines,
                };
                info!(title = %article.title, domain = %article.source_domain, "Unit included");
                UnitOutcome::Included(ReportEntry::from_parts(article, summary))
            }
            Err(e) => UnitOutcome::Skipped(term.clone(), e.into()),
        }
    }
}

/// Persist the report, then hand it to the dispatcher if there is one.
///
/// A delivery failure is returned as an error but leaves the already
/// written artifact exactly as it was.
#[instrument(level = "info", skip_all, fields(date = %report.date, entries = report.len()))]
pub async fn publish<A, N>(
    store: &A,
    dispatcher: Option<&DeliveryDispatcher<N>>,
    report: &Report,
) -> Result<PathBuf, AppError>
where
    A: ArtifactStore,
    N: Notifier,
{
    let text = report.to_string();
    let path = store.save(report.date, &text).await?;
    info!(key = %report.artifact_key(), "Report persisted");

    match dispatcher {
        Some(d) => d.deliver(&text).await?,
        None => info!("Delivery skipped"),
    }
    Ok(path)
}
