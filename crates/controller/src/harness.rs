//! Scripted play-cycle harness
//!
//! Drives a connected agent through repeated cycles of: hello, wait for
//! select music, pick a song, start it, watch live stats, pause and
//! resume, stop. Every step is recorded as a [`CaseResult`] and each
//! finished cycle is written out as one JSON line. Status polls taken in
//! the stats window go to a second sink as [`StatsSample`] lines.

use std::io::Write;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::time::Instant;

use itg_remote_protocol::response::{is_select_music_screen, SongEntry, SongList, StatusSnapshot};
use itg_remote_protocol::{ListQuery, Request, SetPaused, StartSong};

use crate::{Controller, ControllerError, Envelope};

const STATUS_POLL: Duration = Duration::from_millis(500);
const CONNECT_POLL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub cycles: usize,

    /// Length of the live stats window
    pub stats_duration: Duration,

    /// Delay between status samples inside the stats window
    pub poll_interval: Duration,

    pub pause_resume: bool,

    /// Per-attempt hello timeouts; one attempt per entry
    pub hello_timeouts: Vec<Duration>,
    pub hello_retry_delay: Duration,

    pub select_timeout: Duration,
    pub start_timeout: Duration,
    pub stop_timeout: Duration,
    pub songs_timeout: Duration,
    pub gameplay_start_timeout: Duration,
    pub gameplay_stop_timeout: Duration,

    pub song_count: u16,
    pub preferred_difficulty: String,

    /// Wait for the first heartbeat before starting cycles
    pub ready_timeout: Duration,

    /// Pause between cycles
    pub cycle_pause: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            cycles: 5,
            stats_duration: Duration::from_secs(12),
            poll_interval: Duration::from_millis(250),
            pause_resume: true,
            hello_timeouts: vec![
                Duration::from_secs(10),
                Duration::from_secs(20),
                Duration::from_secs(30),
            ],
            hello_retry_delay: Duration::from_secs(1),
            select_timeout: Duration::from_secs(240),
            start_timeout: Duration::from_secs(15),
            stop_timeout: Duration::from_secs(15),
            songs_timeout: Duration::from_secs(30),
            gameplay_start_timeout: Duration::from_secs(30),
            gameplay_stop_timeout: Duration::from_secs(45),
            song_count: 200,
            preferred_difficulty: "Difficulty_Easy".to_string(),
            ready_timeout: Duration::from_secs(15),
            cycle_pause: Duration::from_secs(1),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum HarnessError {
    #[error(transparent)]
    Controller(#[from] ControllerError),

    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Hello failed after {attempts} attempts: {last}")]
    HelloFailed { attempts: usize, last: String },

    #[error("Select music screen not reached within {0:?} (last screen {1:?})")]
    SelectMusicTimeout(Duration, String),
}

/// Outcome of one harness step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseResult {
    pub name: String,
    pub passed: bool,
    pub details: String,
}

impl CaseResult {
    fn new(name: &str, passed: bool, details: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed,
            details: details.into(),
        }
    }

    fn from_envelope(name: &str, envelope: &Envelope) -> Self {
        Self::new(name, envelope.is_ok(), envelope.body.to_string())
    }

    fn failed(name: &str, err: impl std::fmt::Display) -> Self {
        Self::new(name, false, err.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleSummary {
    pub song_title: String,
    pub song_dir: String,
    pub difficulty: String,
    pub stats_samples: usize,
    pub score_delta: i64,
    pub combo_delta: i64,
    pub percent_delta: f64,
    pub judgment_delta: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle: usize,
    pub passed_all: bool,
    pub summary: CycleSummary,
    pub cases: Vec<CaseResult>,

    /// Written to the timeseries sink, not the cycle line
    #[serde(skip)]
    pub samples: Vec<StatsSample>,
}

/// One status poll from a stats window
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSample {
    /// Milliseconds since the Unix epoch
    pub wall_time_ms: u64,
    pub cycle: usize,
    /// Seconds since the window opened
    pub elapsed_s: f64,
    pub screen: String,
    pub inferred_playing: bool,
    pub score_p1: f64,
    pub combo_p1: f64,
    pub percent_dp_p1: f64,
    pub judgment_sum_p1: f64,
    pub song_title: Option<String>,
    pub song_dir: Option<String>,
    pub difficulty_p1: Option<String>,
    pub paused_known: bool,
    pub paused: bool,
}

impl StatsSample {
    pub fn new(cycle: usize, elapsed: Duration, status: &StatusSnapshot) -> Self {
        let wall_time_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        Self {
            wall_time_ms,
            cycle,
            elapsed_s: elapsed.as_secs_f64(),
            screen: status.screen.clone(),
            inferred_playing: status.inferred_playing(),
            score_p1: status.score_p1.unwrap_or(0.0),
            combo_p1: status.current_combo_p1.unwrap_or(0.0),
            percent_dp_p1: status.percent_dp_p1.unwrap_or(0.0),
            judgment_sum_p1: status.judgment_total_p1(),
            song_title: status.current_title.clone(),
            song_dir: status.current_song_dir.clone(),
            difficulty_p1: status.current_difficulty_p1.clone(),
            paused_known: status.paused_known,
            paused: status.paused.unwrap_or(false),
        }
    }
}

/// Growth of the P1 counters over a stats window
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatsDeltas {
    pub score: f64,
    pub combo: f64,
    pub percent: f64,
    pub judgments: f64,
}

impl StatsDeltas {
    /// Names of the counters that went up
    pub fn changed(&self) -> Vec<&'static str> {
        [
            ("score", self.score),
            ("combo", self.combo),
            ("percent", self.percent),
            ("judgments", self.judgments),
        ]
        .into_iter()
        .filter(|(_, delta)| *delta > 0.0)
        .map(|(name, _)| name)
        .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Sample {
    score: f64,
    combo: f64,
    percent: f64,
    judgments: f64,
}

impl Sample {
    fn of(status: &StatusSnapshot) -> Self {
        Self {
            score: status.score_p1.unwrap_or(0.0),
            combo: status.current_combo_p1.unwrap_or(0.0),
            percent: status.percent_dp_p1.unwrap_or(0.0),
            judgments: status.judgment_total_p1(),
        }
    }
}

/// Tracks the first sample and the running maxima of a stats window
#[derive(Debug, Default)]
pub struct StatsTracker {
    baseline: Option<Sample>,
    max: Sample,
    samples: usize,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, status: &StatusSnapshot) {
        let sample = Sample::of(status);
        if self.baseline.is_none() {
            self.baseline = Some(sample);
            self.max = sample;
        }

        self.max.score = self.max.score.max(sample.score);
        self.max.combo = self.max.combo.max(sample.combo);
        self.max.percent = self.max.percent.max(sample.percent);
        self.max.judgments = self.max.judgments.max(sample.judgments);
        self.samples += 1;
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Maximum minus baseline for each counter
    pub fn deltas(&self) -> StatsDeltas {
        let base = self.baseline.unwrap_or_default();
        StatsDeltas {
            score: self.max.score - base.score,
            combo: self.max.combo - base.combo,
            percent: self.max.percent - base.percent,
            judgments: self.max.judgments - base.judgments,
        }
    }
}

/// Song and chart chosen for a cycle
#[derive(Debug, Clone, PartialEq)]
pub struct PickedSong {
    pub song_dir: String,
    pub title: String,
    pub difficulty: String,
}

/// Takes the first song, preferring `preferred` among its charts
///
/// Falls back to the song's first chart, or to `preferred` when the entry
/// lists none.
pub fn pick_song(songs: &[SongEntry], preferred: &str) -> Option<PickedSong> {
    let song = songs.first()?;

    let difficulty = if song.difficulties.iter().any(|d| d == preferred) {
        preferred.to_string()
    } else {
        song.difficulties
            .first()
            .cloned()
            .unwrap_or_else(|| preferred.to_string())
    };

    Some(PickedSong {
        song_dir: song.song_dir.clone(),
        title: song.title.clone(),
        difficulty,
    })
}

pub struct Harness {
    controller: Controller,
    config: HarnessConfig,
}

impl Harness {
    pub fn new(controller: Controller, config: HarnessConfig) -> Self {
        Self { controller, config }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub async fn hello_with_retry(&self) -> Result<Envelope, HarnessError> {
        let attempts = self.config.hello_timeouts.len();
        let mut last = String::from("no attempts configured");

        for (index, timeout) in self.config.hello_timeouts.iter().enumerate() {
            match self.controller.hello_with_timeout(*timeout).await {
                Ok(envelope) => return Ok(envelope),
                Err(e) => {
                    tracing::warn!(attempt = index + 1, attempts, error = %e, "Hello failed");
                    last = e.to_string();
                }
            }

            if index + 1 < attempts {
                tokio::time::sleep(self.config.hello_retry_delay).await;
            }
        }

        Err(HarnessError::HelloFailed { attempts, last })
    }

    /// Polls status until a select-music screen shows up
    pub async fn wait_for_music_select(&self) -> Result<String, HarnessError> {
        let deadline = Instant::now() + self.config.select_timeout;
        let mut screen = String::new();

        while Instant::now() < deadline {
            screen = self.controller.status().await?.screen;
            tracing::info!(screen = %screen, "Waiting for select music");
            if is_select_music_screen(&screen) {
                return Ok(screen);
            }
            tokio::time::sleep(STATUS_POLL).await;
        }

        Err(HarnessError::SelectMusicTimeout(self.config.select_timeout, screen))
    }

    /// Polls status until gameplay is (or is no longer) running
    ///
    /// Returns `false` when `timeout` passes first.
    pub async fn wait_for_gameplay(
        &self,
        desired: bool,
        timeout: Duration,
    ) -> Result<bool, HarnessError> {
        let deadline = Instant::now() + timeout;

        while Instant::now() < deadline {
            let status = self.controller.status().await?;
            let inferred = status.inferred_playing();
            tracing::debug!(
                is_playing = status.is_playing,
                inferred,
                screen = %status.screen,
                "Gameplay poll"
            );
            if inferred == desired {
                return Ok(true);
            }
            tokio::time::sleep(STATUS_POLL).await;
        }

        Ok(false)
    }

    pub async fn fetch_songs(&self) -> Result<Vec<SongEntry>, HarnessError> {
        let request = Request::ListSongs(ListQuery::new(self.config.song_count, ""));
        let list: SongList = self
            .controller
            .request_with_timeout(&request, self.config.songs_timeout)
            .await?
            .decode()?;
        Ok(list.songs)
    }

    /// Samples status for the stats window, appending each poll to
    /// `samples`
    pub async fn collect_stats(
        &self,
        cycle: usize,
        samples: &mut Vec<StatsSample>,
    ) -> Result<StatsTracker, HarnessError> {
        let started = Instant::now();
        let mut tracker = StatsTracker::new();

        while started.elapsed() < self.config.stats_duration {
            let status = self.controller.status().await?;
            samples.push(StatsSample::new(cycle, started.elapsed(), &status));
            tracing::debug!(
                screen = %status.screen,
                score = ?status.score_p1,
                combo = ?status.current_combo_p1,
                percent = ?status.percent_dp_p1,
                judgments = status.judgment_total_p1(),
                "Stats sample"
            );
            tracker.observe(&status);
            tokio::time::sleep(self.config.poll_interval).await;
        }

        Ok(tracker)
    }

    async fn request_case(&self, name: &str, request: Request, timeout: Duration) -> CaseResult {
        match self.controller.request_with_timeout(&request, timeout).await {
            Ok(envelope) => CaseResult::from_envelope(name, &envelope),
            Err(e) => CaseResult::failed(name, e),
        }
    }

    /// Runs one cycle, stopping at the first step that leaves nothing to
    /// continue with
    pub async fn run_cycle(&self, cycle: usize) -> CycleReport {
        let mut summary = CycleSummary::default();
        let mut cases = Vec::new();
        let mut samples = Vec::new();

        self.cycle_steps(cycle, &mut summary, &mut cases, &mut samples)
            .await;

        CycleReport {
            cycle,
            passed_all: cases.iter().all(|c| c.passed),
            summary,
            cases,
            samples,
        }
    }

    async fn cycle_steps(
        &self,
        cycle: usize,
        summary: &mut CycleSummary,
        cases: &mut Vec<CaseResult>,
        samples: &mut Vec<StatsSample>,
    ) {
        match self.hello_with_retry().await {
            Ok(envelope) => cases.push(CaseResult::from_envelope("hello", &envelope)),
            Err(e) => {
                cases.push(CaseResult::failed("hello", e));
                return;
            }
        }

        tracing::info!("Navigate to select music and join P1");
        match self.wait_for_music_select().await {
            Ok(screen) => cases.push(CaseResult::new(
                "reach music select",
                true,
                format!("screen={}", screen),
            )),
            Err(e) => {
                cases.push(CaseResult::failed("reach music select", e));
                return;
            }
        }

        let songs = match self.fetch_songs().await {
            Ok(songs) => songs,
            Err(e) => {
                cases.push(CaseResult::failed("get songs", e));
                return;
            }
        };
        cases.push(CaseResult::new(
            "get songs",
            !songs.is_empty(),
            format!("song_count={}", songs.len()),
        ));

        let Some(picked) = pick_song(&songs, &self.config.preferred_difficulty) else {
            return;
        };
        summary.song_title = picked.title.clone();
        summary.song_dir = picked.song_dir.clone();
        summary.difficulty = picked.difficulty.clone();
        cases.push(CaseResult::new(
            "choose song",
            true,
            format!(
                "title={} song_dir={} difficulty={}",
                picked.title, picked.song_dir, picked.difficulty
            ),
        ));

        let start = StartSong::new(picked.song_dir, picked.difficulty);
        let started = self
            .request_case("start song", Request::StartSong(start), self.config.start_timeout)
            .await;
        let accepted = started.passed;
        cases.push(started);
        if !accepted {
            return;
        }

        match self
            .wait_for_gameplay(true, self.config.gameplay_start_timeout)
            .await
        {
            Ok(true) => cases.push(CaseResult::new("verify gameplay started", true, "")),
            Ok(false) => {
                cases.push(CaseResult::new("verify gameplay started", false, ""));
                return;
            }
            Err(e) => {
                cases.push(CaseResult::failed("verify gameplay started", e));
                return;
            }
        }

        tracing::info!(
            seconds = self.config.stats_duration.as_secs_f64(),
            "Collecting live stats; step on the pad"
        );
        match self.collect_stats(cycle, samples).await {
            Ok(tracker) => {
                let deltas = tracker.deltas();
                summary.stats_samples = tracker.samples();
                summary.score_delta = deltas.score as i64;
                summary.combo_delta = deltas.combo as i64;
                summary.percent_delta = deltas.percent;
                summary.judgment_delta = deltas.judgments as i64;

                let changed = deltas.changed();
                cases.push(CaseResult::new(
                    "live stats change",
                    !changed.is_empty(),
                    format!(
                        "samples={} changed={:?} deltas={:?}",
                        tracker.samples(),
                        changed,
                        deltas
                    ),
                ));
            }
            Err(e) => cases.push(CaseResult::failed("live stats change", e)),
        }

        if self.config.pause_resume {
            for (name, paused) in [("pause", true), ("resume", false)] {
                let case = self
                    .request_case(
                        name,
                        Request::SetPaused(SetPaused { paused }),
                        self.controller.request_timeout(),
                    )
                    .await;
                cases.push(case);
            }
        }

        match self
            .controller
            .request_with_timeout(&Request::Stop, self.config.stop_timeout)
            .await
        {
            Ok(envelope) => cases.push(CaseResult::from_envelope("stop", &envelope)),
            Err(e) => {
                cases.push(CaseResult::failed("stop", e));
                return;
            }
        }

        match self
            .wait_for_gameplay(false, self.config.gameplay_stop_timeout)
            .await
        {
            Ok(ended) => cases.push(CaseResult::new("verify stopped", ended, "")),
            Err(e) => cases.push(CaseResult::failed("verify stopped", e)),
        }
    }

    /// Runs cycles until the configured count completes, writing one JSON
    /// line per cycle to `out` and one per stats sample to `timeseries`
    ///
    /// Waits out agent disconnects between cycles.
    pub async fn run<W: Write, T: Write>(
        &self,
        out: &mut W,
        timeseries: &mut T,
    ) -> Result<Vec<CycleReport>, HarnessError> {
        let mut reports = Vec::with_capacity(self.config.cycles);

        while reports.len() < self.config.cycles {
            if let Err(e) = self.controller.wait_connected(CONNECT_POLL).await {
                if e.is_link_timeout() {
                    tracing::info!("Waiting for the agent to connect");
                    continue;
                }
                return Err(e.into());
            }

            if let Err(e) = self.controller.wait_ready(self.config.ready_timeout).await {
                if !e.is_link_timeout() {
                    return Err(e.into());
                }
                tracing::warn!("Connected but no heartbeat yet; waiting");
                tokio::time::sleep(self.config.cycle_pause).await;
                continue;
            }

            let cycle = reports.len() + 1;
            tracing::info!(cycle, cycles = self.config.cycles, "Starting cycle");
            let report = self.run_cycle(cycle).await;

            for case in report.cases.iter().filter(|c| !c.passed) {
                tracing::warn!(case = %case.name, details = %case.details, "FAIL");
            }
            tracing::info!(cycle, passed_all = report.passed_all, "Cycle complete");

            for sample in &report.samples {
                serde_json::to_writer(&mut *timeseries, sample)?;
                writeln!(timeseries)?;
            }
            timeseries.flush()?;

            serde_json::to_writer(&mut *out, &report)?;
            writeln!(out)?;
            out.flush()?;
            reports.push(report);

            if !self.controller.link_status().state.is_connected() {
                tracing::warn!("Connection dropped; waiting for reconnect");
            }
            if reports.len() < self.config.cycles {
                tokio::time::sleep(self.config.cycle_pause).await;
            }
        }

        tracing::info!(cycles = reports.len(), "Completed requested cycles");
        Ok(reports)
    }
}
