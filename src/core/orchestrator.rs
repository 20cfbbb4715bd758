//! Job orchestrator module.
//!
//! Drives each disc through `scanned → remuxed → classified → placed → done`,
//! persisting the run record at every stage boundary so a later run resumes
//! where the previous one stopped.

use crate::core::classifier::{self, Classification};
use crate::core::placer::{self, LibraryPlacer};
use crate::core::remux::{RemuxSupervisor, SpaceProbe, VolumeSpace};
use crate::core::store::RecordStore;
use crate::models::config::Config;
use crate::models::disc::{Category, DiscSource, TitleInfo};
use crate::models::record::{ErrorKind, RunRecord, Stage};
use crate::services::ffprobe::{FfprobeProbe, MetadataProbe};
use crate::services::hooks::{
    EpisodeMatchHook, LogNotifier, MkvMatchHook, NoHook, Notifier, SeasonPlaced,
};
use crate::services::tmdb::{NoLookup, TitleLookup, TmdbClient, TmdbLookup};
use crate::utils::hash;
use crate::Result;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Cooperative cancellation shared with the signal handler.
///
/// A stop request finishes the current disc and starts no new one; an abort
/// request also kills a running remux between output lines.
#[derive(Debug, Default)]
pub struct RunControl {
    stop: AtomicBool,
    abort: AtomicBool,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn request_abort(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.abort.store(true, Ordering::SeqCst);
    }

    /// First call requests a stop, later calls an abort. Returns true once
    /// aborting.
    pub fn interrupt(&self) -> bool {
        if self.stop.swap(true, Ordering::SeqCst) {
            self.abort.store(true, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }
}

/// How far a run takes each disc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Stop once tracks are extracted.
    Remux,
    /// Classify and place discs that were already remuxed.
    Rename,
    /// The whole pipeline.
    Full,
}

/// Options for one run.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub mode: RunMode,
    /// Reprocess discs already at `done`.
    pub force: bool,
    /// Report intended actions without launching or mutating anything.
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: RunMode::Full,
            force: false,
            dry_run: false,
        }
    }
}

/// Terminal state of one disc in one run.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscOutcome {
    Done,
    /// Stopped at the stage the run mode targets.
    Reached(Stage),
    /// Already done, or nothing to do in this mode.
    Skipped(String),
    Failed {
        stage: Stage,
        kind: ErrorKind,
        message: String,
    },
    /// Run halted or stopped before this disc started.
    NotAttempted,
    /// Dry-run: actions were reported only.
    Planned,
}

/// One failed disc in the summary.
#[derive(Debug, Clone)]
pub struct FailureEntry {
    pub signature: String,
    pub display: String,
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
}

/// Counts of discs by terminal state.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub done: usize,
    pub reached: usize,
    pub skipped: usize,
    pub failed: usize,
    pub not_attempted: usize,
    pub planned: usize,
    /// Discs without a category, left for manual review.
    pub review: usize,
    /// A fatal error stopped the run.
    pub halted: bool,
    /// The user stopped the run.
    pub stopped: bool,
    pub failures: Vec<FailureEntry>,
}

impl RunSummary {
    pub fn record(&mut self, disc: &DiscSource, outcome: &DiscOutcome) {
        match outcome {
            DiscOutcome::Done => self.done += 1,
            DiscOutcome::Reached(_) => self.reached += 1,
            DiscOutcome::Skipped(_) => self.skipped += 1,
            DiscOutcome::NotAttempted => self.not_attempted += 1,
            DiscOutcome::Planned => self.planned += 1,
            DiscOutcome::Failed {
                stage,
                kind,
                message,
            } => {
                self.failed += 1;
                self.failures.push(FailureEntry {
                    signature: disc.signature.clone(),
                    display: disc.display.clone(),
                    stage: *stage,
                    kind: *kind,
                    message: message.clone(),
                });
            }
        }
    }

    pub fn total(&self) -> usize {
        self.done + self.reached + self.skipped + self.failed + self.not_attempted + self.planned
    }

    pub fn one_line(&self) -> String {
        let mut line = format!(
            "Run finished: {} done, {} failed, {} skipped",
            self.done, self.failed, self.skipped
        );
        if self.reached > 0 {
            line.push_str(&format!(", {} remuxed", self.reached));
        }
        if self.planned > 0 {
            line.push_str(&format!(", {} planned", self.planned));
        }
        if self.not_attempted > 0 {
            line.push_str(&format!(", {} not attempted", self.not_attempted));
        }
        if self.review > 0 {
            line.push_str(&format!(", {} need review", self.review));
        }
        if self.halted {
            line.push_str(" (halted on fatal error)");
        } else if self.stopped {
            line.push_str(" (stopped by user)");
        }
        line
    }
}

/// State shared by the workers of one run.
pub struct RunContext<'a> {
    pub options: RunOptions,
    pub control: &'a RunControl,
    halted: AtomicBool,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<'a> RunContext<'a> {
    pub fn new(options: RunOptions, control: &'a RunControl) -> Self {
        Self {
            options,
            control,
            halted: AtomicBool::new(false),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
    }

    /// Whether new discs may still be started.
    fn may_start(&self) -> bool {
        !self.is_halted() && !self.control.is_stopped()
    }

    fn lock_for(&self, entry_key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(locks.entry(entry_key.to_string()).or_default())
    }
}

/// Collaborators injected into the orchestrator.
pub struct Services {
    pub probe: Arc<dyn MetadataProbe>,
    pub space: Arc<dyn SpaceProbe>,
    pub lookup: Arc<dyn TitleLookup>,
    pub hook: Arc<dyn EpisodeMatchHook>,
    pub notifier: Arc<dyn Notifier>,
}

impl Services {
    /// Production collaborators for a configuration.
    pub fn from_config(config: &Config) -> Self {
        let lookup: Arc<dyn TitleLookup> = match TmdbClient::new(&config.tmdb) {
            Ok(client) => Arc::new(TmdbLookup::new(client)),
            Err(_) => Arc::new(NoLookup),
        };
        let hook: Arc<dyn EpisodeMatchHook> = if config.hooks.mkv_match.enabled {
            Arc::new(MkvMatchHook::new(config.hooks.mkv_match.clone()))
        } else {
            Arc::new(NoHook)
        };

        Self {
            probe: Arc::new(FfprobeProbe::new(&config.probe.ffprobe)),
            space: Arc::new(VolumeSpace),
            lookup,
            hook,
            notifier: Arc::new(LogNotifier),
        }
    }
}

/// A disc or a TV season group processed by one worker.
#[derive(Debug, Clone)]
pub struct WorkUnit {
    pub discs: Vec<DiscSource>,
}

/// Series grouping key for TV discs.
pub fn series_key(title: &TitleInfo) -> String {
    title.folder_name().to_lowercase()
}

/// Group discs into work units: one per movie disc, one per TV
/// (series, season) in disc-number order. Units keep the order in which
/// their first disc was discovered. Unknown-category discs are left out.
pub fn work_units(discs: &[DiscSource]) -> Vec<WorkUnit> {
    let mut units: Vec<WorkUnit> = Vec::new();
    let mut seasons: HashMap<(String, u16), usize> = HashMap::new();

    for disc in discs {
        match disc.category {
            Category::Movies => units.push(WorkUnit {
                discs: vec![disc.clone()],
            }),
            Category::Tv => {
                let title = placer::title_info(disc);
                let key = (series_key(&title), title.season.unwrap_or(1));
                match seasons.get(&key) {
                    Some(&index) => units[index].discs.push(disc.clone()),
                    None => {
                        seasons.insert(key, units.len());
                        units.push(WorkUnit {
                            discs: vec![disc.clone()],
                        });
                    }
                }
            }
            Category::Unknown => {}
        }
    }

    for unit in &mut units {
        unit.discs.sort_by(|a, b| {
            a.disc_no
                .unwrap_or(u16::MAX)
                .cmp(&b.disc_no.unwrap_or(u16::MAX))
                .then_with(|| a.entry_path.cmp(&b.entry_path))
        });
    }

    units
}

/// Sequences locator output through remux, classification and placement.
pub struct Orchestrator {
    config: Config,
    store: RecordStore,
    remux: RemuxSupervisor,
    placer: LibraryPlacer,
    lookup: Arc<dyn TitleLookup>,
    hook: Arc<dyn EpisodeMatchHook>,
    notifier: Arc<dyn Notifier>,
}

impl Orchestrator {
    pub fn new(config: Config, store: RecordStore, services: Services) -> Self {
        let remux = RemuxSupervisor::new(config.remux.clone(), Arc::clone(&services.probe))
            .with_space_probe(services.space);
        let placer = LibraryPlacer::new(
            &config.paths.library_root,
            config.placement.clone(),
            config.classify.trailer_max_secs,
            services.probe,
        );
        Self {
            config,
            store,
            remux,
            placer,
            lookup: services.lookup,
            hook: services.hook,
            notifier: services.notifier,
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Temporary extraction directory for a disc.
    pub fn temp_dir_for(&self, disc: &DiscSource) -> PathBuf {
        self.config.temp_root().join(&disc.signature)
    }

    /// Create `scanned` records for discs seen for the first time.
    pub fn record_scanned(&self, discs: &[DiscSource]) -> Result<usize> {
        let mut created = 0;
        for disc in discs.iter().filter(|d| d.category != Category::Unknown) {
            if self.store.get(&disc.signature)?.is_none() {
                self.store.put(&self.new_record(disc))?;
                created += 1;
            }
        }
        Ok(created)
    }

    fn new_record(&self, disc: &DiscSource) -> RunRecord {
        let mut record = RunRecord::new(disc, self.temp_dir_for(disc));
        if disc.category == Category::Tv {
            let title = placer::title_info(disc);
            record.series_key = Some(series_key(&title));
            record.season = title.season;
        }
        record
    }

    /// Process every disc and return the run summary.
    ///
    /// `review` counts discs that were located but need manual review.
    pub async fn run(
        &self,
        discs: &[DiscSource],
        review: usize,
        options: RunOptions,
        control: &RunControl,
    ) -> RunSummary {
        let ctx = RunContext::new(options, control);
        let units = work_units(discs);
        let workers = self.config.concurrency.0.max(1);

        tracing::info!(
            "Processing {} discs in {} units with {} worker(s)",
            discs.len(),
            units.len(),
            workers
        );

        let results: Vec<Vec<(DiscSource, DiscOutcome)>> = stream::iter(units)
            .map(|unit| self.process_unit(unit, &ctx))
            .buffer_unordered(workers)
            .collect()
            .await;

        let mut summary = RunSummary {
            review,
            halted: ctx.is_halted(),
            stopped: control.is_stopped(),
            ..Default::default()
        };
        for (disc, outcome) in results.iter().flatten() {
            summary.record(disc, outcome);
        }

        self.notifier.notify(&summary);
        summary
    }

    async fn process_unit(
        &self,
        unit: WorkUnit,
        ctx: &RunContext<'_>,
    ) -> Vec<(DiscSource, DiscOutcome)> {
        let mut outcomes = Vec::with_capacity(unit.discs.len());
        for disc in unit.discs {
            let outcome = if ctx.may_start() {
                self.process_disc(&disc, ctx).await
            } else {
                DiscOutcome::NotAttempted
            };
            outcomes.push((disc, outcome));
        }
        outcomes
    }

    /// Run one disc through the remaining stages.
    pub async fn process_disc(&self, disc: &DiscSource, ctx: &RunContext<'_>) -> DiscOutcome {
        let lock = ctx.lock_for(&hash::normalize_path(&disc.entry_path));
        let _guard = lock.lock().await;

        let options = ctx.options;
        let mut record = match self.store.get(&disc.signature) {
            Ok(Some(record)) => record,
            Ok(None) => self.new_record(disc),
            Err(e) => {
                tracing::warn!(
                    "Unreadable record for {}, starting over: {}",
                    disc.short_signature(),
                    e
                );
                self.new_record(disc)
            }
        };

        if record.is_done() {
            if options.force && options.mode == RunMode::Full {
                tracing::info!("Reprocessing {} (forced)", disc.display);
                record.reset();
            } else {
                tracing::info!("Skipping {} (already done)", disc.display);
                return DiscOutcome::Skipped("already done".to_string());
            }
        }

        let title = placer::title_info(disc);
        let mut stage = record.resume_stage();
        if matches!(stage, Stage::Remuxed | Stage::Classified)
            && !self.can_resume(disc, &title, &record, stage)
        {
            tracing::warn!(
                "Extracted tracks for {} are gone, remuxing again",
                disc.display
            );
            record.reset();
            stage = Stage::Scanned;
        }

        match options.mode {
            RunMode::Rename if stage < Stage::Remuxed => {
                return DiscOutcome::Skipped("not remuxed yet".to_string());
            }
            RunMode::Remux if stage >= Stage::Remuxed => {
                return DiscOutcome::Skipped(format!("already {}", stage));
            }
            _ => {}
        }

        tracing::info!(
            signature = %disc.short_signature(),
            "Processing {} ({}) from stage {}",
            disc.display,
            disc.category,
            stage
        );

        if stage == Stage::Scanned {
            if options.dry_run {
                let plan = self.remux.plan(disc, &record.temp_dir);
                tracing::info!("[DRY-RUN] Remux: {}", plan.command.join(" "));
                if !plan.has_space() {
                    tracing::warn!(
                        "[DRY-RUN] {} would fail: {} bytes required, {} available",
                        disc.display,
                        plan.required_bytes,
                        plan.available_bytes.unwrap_or(0)
                    );
                }
                return DiscOutcome::Planned;
            }

            if let Err(e) = self.save(&record, options) {
                return self.fail(disc, &mut record, Stage::Scanned, &e, ctx);
            }
            if let Err(e) = self.remux_stage(disc, &mut record, ctx).await {
                return self.fail(disc, &mut record, Stage::Remuxed, &e, ctx);
            }
            if options.mode == RunMode::Remux {
                return DiscOutcome::Reached(Stage::Remuxed);
            }
            stage = Stage::Remuxed;
        }

        if stage == Stage::Remuxed {
            if let Err(e) = self.classify_stage(disc, &title, &mut record, options).await {
                return self.fail(disc, &mut record, Stage::Classified, &e, ctx);
            }
            stage = Stage::Classified;
        }

        if stage == Stage::Classified {
            match self.place_stage(disc, &title, &mut record, options).await {
                Ok(true) => stage = Stage::Placed,
                Ok(false) => return DiscOutcome::Planned,
                Err(e) => return self.fail(disc, &mut record, Stage::Placed, &e, ctx),
            }
        }

        if stage == Stage::Placed {
            let source = placer::removal_target(&record.root_path, &record.item_root);
            if let Err(e) =
                self.placer
                    .finalize(&record.placements, &record.temp_dir, &source, options.dry_run)
            {
                return self.fail(disc, &mut record, Stage::Done, &e, ctx);
            }
            record.advance(Stage::Done);
            if let Err(e) = self.save(&record, options) {
                return self.fail(disc, &mut record, Stage::Done, &e, ctx);
            }
            tracing::info!("Done: {}", disc.display);

            if disc.category == Category::Tv {
                self.season_placed(&title, &record, options).await;
            }
        }

        if options.dry_run {
            DiscOutcome::Planned
        } else {
            DiscOutcome::Done
        }
    }

    async fn remux_stage(
        &self,
        disc: &DiscSource,
        record: &mut RunRecord,
        ctx: &RunContext<'_>,
    ) -> Result<()> {
        let max_attempts = self.config.remux.max_retries + 1;
        let temp_dir = record.temp_dir.clone();
        let mut attempt = 0;

        let output = loop {
            attempt += 1;
            record.attempts += 1;
            match self.remux.remux(disc, &temp_dir, ctx.control).await {
                Ok(output) => break output,
                Err(e) => {
                    if e.is_retryable() && attempt < max_attempts && !ctx.control.is_stopped() {
                        tracing::warn!(
                            "Remux attempt {}/{} for {} failed, retrying: {}",
                            attempt,
                            max_attempts,
                            disc.display,
                            e
                        );
                        continue;
                    }
                    if let Err(cleanup) = crate::utils::fs::remove_path(&temp_dir) {
                        tracing::debug!("Temp cleanup failed: {}", cleanup);
                    }
                    return Err(e);
                }
            }
        };

        for message in &output.messages {
            tracing::debug!("{}: {}", disc.display, message);
        }
        record.tracks = output.tracks;
        record.advance(Stage::Remuxed);
        self.store.put(record)
    }

    async fn classify_stage(
        &self,
        disc: &DiscSource,
        title: &TitleInfo,
        record: &mut RunRecord,
        options: RunOptions,
    ) -> Result<()> {
        let classification = match disc.category {
            Category::Tv => {
                let key = series_key(title);
                let season = title.season.unwrap_or(1);
                let offset = self
                    .store
                    .last_episode_for(&key, season, &disc.signature, disc.disc_no)?
                    .map(|last| last + 1)
                    .unwrap_or(self.config.classify.episode_offset);
                record.series_key = Some(key);
                record.season = Some(season);

                let classification =
                    classifier::classify_tv(&record.tracks, &self.config.classify, offset);
                self.check_episode_count(title, season, &classification).await;
                classification
            }
            category => classifier::classify(category, &record.tracks, &self.config.classify),
        };

        for warning in &classification.warnings {
            tracing::warn!("{}: {}", disc.display, warning);
        }
        log_classification(disc, &classification);

        record.classifications = classification.results.clone();
        record.first_episode = classification.first_episode();
        record.last_episode = classification.last_episode();
        record.advance(Stage::Classified);
        self.save(record, options)
    }

    async fn check_episode_count(
        &self,
        title: &TitleInfo,
        season: u16,
        classification: &Classification,
    ) {
        let Some(last) = classification.last_episode() else {
            return;
        };
        if let Some(expected) = self
            .lookup
            .season_episode_count(&title.title, title.year, season)
            .await
        {
            if last > expected {
                tracing::warn!(
                    "{} season {}: episode {} assigned but only {} expected",
                    title.title,
                    season,
                    last,
                    expected
                );
            }
        }
    }

    /// Returns `Ok(false)` in dry-run mode, where nothing is moved.
    async fn place_stage(
        &self,
        disc: &DiscSource,
        title: &TitleInfo,
        record: &mut RunRecord,
        options: RunOptions,
    ) -> Result<bool> {
        let report = self.placer.place(
            disc,
            &record.classifications,
            title,
            &record.placements,
            options.dry_run,
        )?;
        for warning in &report.warnings {
            tracing::warn!("{}: {}", disc.display, warning);
        }
        if options.dry_run {
            return Ok(false);
        }

        record.placements = report.placed.clone();
        if !report.is_complete() {
            return Err(crate::Error::PlacementIncomplete {
                failures: report.failures,
            });
        }
        record.advance(Stage::Placed);
        self.save(record, options)?;
        Ok(true)
    }

    /// Hand finished season directories to the episode-match hook. Runs only
    /// after the placement was verified, since the hook may rename files.
    async fn season_placed(&self, title: &TitleInfo, record: &RunRecord, options: RunOptions) {
        for season_dir in placer::season_dirs(&record.placements) {
            let event = SeasonPlaced {
                series: title.title.clone(),
                season: title.season.unwrap_or(1),
                season_dir,
                dry_run: options.dry_run,
            };
            if let Err(e) = self.hook.season_placed(&event).await {
                tracing::warn!("Episode match hook failed for {}: {}", title.title, e);
            }
        }
    }

    /// Whether a record at `remuxed` or `classified` can continue without
    /// remuxing again.
    fn can_resume(
        &self,
        disc: &DiscSource,
        title: &TitleInfo,
        record: &RunRecord,
        stage: Stage,
    ) -> bool {
        if record.tracks.is_empty() {
            return false;
        }
        if stage == Stage::Classified {
            return self.placer.can_resume(
                disc,
                &record.classifications,
                title,
                &record.placements,
            );
        }
        record.tracks.iter().all(|t| t.path.exists())
    }

    fn save(&self, record: &RunRecord, options: RunOptions) -> Result<()> {
        if options.dry_run {
            return Ok(());
        }
        self.store.put(record)
    }

    fn fail(
        &self,
        disc: &DiscSource,
        record: &mut RunRecord,
        stage: Stage,
        error: &crate::Error,
        ctx: &RunContext<'_>,
    ) -> DiscOutcome {
        let kind = error.kind();
        let message = error.to_string();

        tracing::error!(
            signature = %disc.short_signature(),
            stage = %stage,
            kind = %kind,
            "{} failed: {}",
            disc.display,
            message
        );

        if error.is_fatal() {
            tracing::error!("Fatal error, no further discs will be started");
            ctx.halt();
        }

        record.fail(kind, &message);
        if let Err(e) = self.save(record, ctx.options) {
            tracing::error!("Could not persist failure for {}: {}", disc.display, e);
        }

        DiscOutcome::Failed {
            stage,
            kind,
            message,
        }
    }
}

fn log_classification(disc: &DiscSource, classification: &Classification) {
    if let Some(median) = classification.median_secs {
        tracing::debug!("{}: episode median {:.1}s", disc.display, median);
    }
    for result in &classification.results {
        tracing::debug!(
            "{}: track {} ({}) -> {} {:?}",
            disc.display,
            result.track.index,
            result
                .track
                .duration_secs
                .map(|d| format!("{:.0}s", d))
                .unwrap_or_else(|| "unknown".to_string()),
            result.role.label(),
            result.rank()
        );
    }
}
