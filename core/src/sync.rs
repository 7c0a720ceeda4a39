//! Frame synchronization.
//!
//! [`MarkerSearch`] slides a one-symbol window across the stream one sample
//! at a time, tracking the start-marker tone energy with a sliding DFT.
//! Within a sustained run of marker energy, the onset is the position where
//! the marker tones add up in phase: every tone starts at phase zero on the
//! symbol boundary, so any offset rotates each tone by a different angle
//! and the coherent sum drops within a sample or two. The onset is
//! confirmed by the end-marker set one symbol later.
//!
//! [`SymbolTracker`] then steps through the data one symbol at a time,
//! watching for the postamble and nudging the symbol boundary when windows
//! on either side of it consistently see more tone energy.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::buffer::SampleBuffer;
use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::profile::Profile;
use crate::spectrum::{SpectralAnalyzer, Spectrum};
use crate::symbol::MarkerKind;
use crate::{
    DFT_REFRESH_SYMBOLS, DRIFT_MARGIN, DRIFT_NUDGE_DIVISOR, DRIFT_PATIENCE, MARKER_THRESHOLD,
    MIN_MARKER_RUN_DIVISOR, MIN_WINDOW_ENERGY, POSTAMBLE_SYMBOLS, PREAMBLE_SYMBOLS,
};

/// DFT of a fixed set of bins over a window that advances one sample at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlidingDft {
    len: usize,
    bins: Vec<usize>,
    /// `e^{+j2πk/N}` per bin
    twiddle: Vec<(f64, f64)>,
    re: Vec<f64>,
    im: Vec<f64>,
    /// Sum of squares over the current window
    window_energy: f64,
    /// Start of the window the bins describe; `None` until primed
    offset: Option<usize>,
    slides: usize,
}

impl SlidingDft {
    pub fn new(len: usize, bins: Vec<usize>) -> Self {
        let twiddle = bins
            .iter()
            .map(|&k| {
                let angle = 2.0 * PI * k as f64 / len as f64;
                (angle.cos(), angle.sin())
            })
            .collect();
        let count = bins.len();
        Self {
            len,
            bins,
            twiddle,
            re: vec![0.0; count],
            im: vec![0.0; count],
            window_energy: 0.0,
            offset: None,
            slides: 0,
        }
    }

    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    pub fn invalidate(&mut self) {
        self.offset = None;
    }

    /// Recompute every bin directly from `window`, which starts at `start`.
    pub fn prime(&mut self, start: usize, window: &[f32]) {
        let n = self.len;
        for (i, &k) in self.bins.iter().enumerate() {
            let (mut re, mut im) = (0.0f64, 0.0f64);
            for (t, &x) in window.iter().enumerate() {
                let angle = 2.0 * PI * ((k * t) % n) as f64 / n as f64;
                re += x as f64 * angle.cos();
                im -= x as f64 * angle.sin();
            }
            self.re[i] = re;
            self.im[i] = im;
        }
        self.window_energy = window.iter().map(|&x| (x as f64) * (x as f64)).sum();
        self.offset = Some(start);
        self.slides = 0;
    }

    /// Advance the window by one sample.
    pub fn slide(&mut self, outgoing: f32, incoming: f32) {
        let delta = incoming as f64 - outgoing as f64;
        for i in 0..self.bins.len() {
            let (c, s) = self.twiddle[i];
            let re = self.re[i] + delta;
            let im = self.im[i];
            self.re[i] = re * c - im * s;
            self.im[i] = re * s + im * c;
        }
        self.window_energy += (incoming as f64).powi(2) - (outgoing as f64).powi(2);
        self.offset = self.offset.map(|o| o + 1);
        self.slides += 1;
    }

    /// Rounding error accumulates while sliding; re-prime periodically.
    pub fn needs_refresh(&self) -> bool {
        self.slides >= DFT_REFRESH_SYMBOLS * self.len
    }

    /// Raw energy across the tracked bins.
    pub fn bin_energy(&self) -> f64 {
        self.re.iter().zip(&self.im).map(|(r, i)| r * r + i * i).sum()
    }

    /// Squared magnitude of the complex sum of the bins at `indices`.
    pub fn coherent_energy(&self, indices: &[usize]) -> f64 {
        let (re, im) = indices
            .iter()
            .fold((0.0, 0.0), |(re, im), &i| (re + self.re[i], im + self.im[i]));
        re * re + im * im
    }

    /// Share of the window energy held by the tracked bins.
    pub fn score(&self) -> f32 {
        if self.window_energy / (self.len as f64) < MIN_WINDOW_ENERGY {
            return 0.0;
        }
        (2.0 * self.bin_energy() / (self.len as f64 * self.window_energy)) as f32
    }
}

/// Result of a confirmed preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lock {
    /// Absolute position where the start-marker window begins
    pub preamble_start: usize,
    /// Absolute position of the first data symbol
    pub data_origin: usize,
}

/// Sample-accurate search for the start marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerSearch {
    dft: SlidingDft,
    /// Indices into the DFT bins of each slot's marker tone
    centers: Vec<usize>,
    len: usize,
    /// Next window start to evaluate
    position: usize,
    run: usize,
    best: usize,
    best_energy: f64,
    /// Run accepted, waiting for the end-marker confirmation window
    candidate: Option<usize>,
}

impl MarkerSearch {
    pub fn new(profile: &Profile) -> Self {
        let radius = profile.neighbourhood_radius();
        let bins = (0..profile.tones_per_symbol)
            .flat_map(|slot| {
                let center = profile.marker_bin(MarkerKind::Start, slot);
                center - radius..=center + radius
            })
            .collect();
        let centers = (0..profile.tones_per_symbol)
            .map(|slot| slot * (2 * radius + 1) + radius)
            .collect();
        Self {
            dft: SlidingDft::new(profile.symbol_duration_samples, bins),
            centers,
            len: profile.symbol_duration_samples,
            position: 0,
            run: 0,
            best: 0,
            best_energy: 0.0,
            candidate: None,
        }
    }

    /// Continue searching from absolute position `position`.
    pub fn restart(&mut self, position: usize) {
        self.position = position;
        self.run = 0;
        self.best_energy = 0.0;
        self.candidate = None;
        self.dft.invalidate();
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Earliest absolute sample the search may still read.
    pub fn earliest_needed(&self) -> usize {
        let mut earliest = self.position.saturating_sub(1);
        if self.run > 0 {
            earliest = earliest.min(self.best + self.len);
        }
        if let Some(candidate) = self.candidate {
            earliest = earliest.min(candidate + self.len);
        }
        earliest
    }

    fn end_run(&mut self, diagnostics: &dyn Diagnostics) {
        let min_run = self.len / MIN_MARKER_RUN_DIVISOR;
        if self.run >= min_run && self.run <= 2 * self.len {
            self.candidate = Some(self.best);
        } else {
            diagnostics.debug(format_args!(
                "marker run of {} samples at {} rejected (need {}..={})",
                self.run,
                self.best,
                min_run,
                2 * self.len
            ));
        }
        self.run = 0;
        self.best_energy = 0.0;
    }

    /// Scan newly buffered samples. Returns a lock once a preamble has been
    /// found and confirmed, `None` when more samples are needed.
    pub fn scan(
        &mut self,
        buffer: &SampleBuffer,
        analyzer: &mut SpectralAnalyzer,
        diagnostics: &dyn Diagnostics,
    ) -> Result<Option<Lock>> {
        let n = self.len;
        if self.position < buffer.base() {
            self.position = buffer.base();
            self.dft.invalidate();
        }

        loop {
            if let Some(candidate) = self.candidate {
                if !buffer.contains(candidate + n, n) {
                    return Ok(None);
                }
                let confirm = analyzer.analyze(buffer.window(candidate + n, n))?;
                self.candidate = None;
                if confirm.end_marker >= MARKER_THRESHOLD {
                    return Ok(Some(Lock {
                        preamble_start: candidate,
                        data_origin: candidate + PREAMBLE_SYMBOLS * n,
                    }));
                }
                diagnostics.debug(format_args!(
                    "start marker at {} not followed by end marker ({:.3})",
                    candidate, confirm.end_marker
                ));
                continue;
            }

            if !buffer.contains(self.position, n) {
                return Ok(None);
            }

            let can_slide = self
                .dft
                .offset()
                .is_some_and(|o| o + 1 == self.position && o >= buffer.base());
            if can_slide && !self.dft.needs_refresh() {
                let outgoing = buffer.at(self.position - 1);
                let incoming = buffer.at(self.position + n - 1);
                self.dft.slide(outgoing, incoming);
            } else if self.dft.offset() != Some(self.position) {
                self.dft.prime(self.position, buffer.window(self.position, n));
            }

            if self.dft.score() >= MARKER_THRESHOLD {
                let energy = self.dft.coherent_energy(&self.centers);
                if self.run == 0 || energy > self.best_energy {
                    self.best = self.position;
                    self.best_energy = energy;
                }
                self.run += 1;
            } else if self.run > 0 {
                self.end_run(diagnostics);
            }

            self.position += 1;
        }
    }
}

/// Votes on timing drift and decides when to move the symbol boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriftGuard {
    votes: i32,
    total: i64,
}

impl DriftGuard {
    /// Record one comparison of tone concentration just before and just
    /// after the current boundary. Returns the nudge to apply, in samples.
    pub fn observe(&mut self, early: f32, late: f32, step: usize) -> i64 {
        let vote = if late > early * (1.0 + DRIFT_MARGIN) {
            1
        } else if early > late * (1.0 + DRIFT_MARGIN) {
            -1
        } else {
            0
        };

        if vote == 0 || vote != self.votes.signum() {
            self.votes = vote;
        } else {
            self.votes += vote;
        }

        if self.votes.abs() >= DRIFT_PATIENCE {
            let nudge = self.votes.signum() as i64 * step as i64;
            self.votes = 0;
            self.total += nudge;
            nudge
        } else {
            0
        }
    }

    /// Net boundary correction applied since the lock.
    pub fn total_correction(&self) -> i64 {
        self.total
    }
}

/// What the tracker found at the current symbol boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackEvent {
    Symbol(Spectrum),
    /// End-marker energy where a data symbol was expected
    Postamble,
}

/// Steps through data symbols after a lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolTracker {
    cursor: usize,
    len: usize,
    offset: usize,
    nudge_step: usize,
    drift: DriftGuard,
}

impl SymbolTracker {
    pub fn new(profile: &Profile, origin: usize) -> Self {
        let len = profile.symbol_duration_samples;
        Self {
            cursor: origin,
            len,
            offset: profile.fade_samples(),
            nudge_step: (len / DRIFT_NUDGE_DIVISOR).max(1),
            drift: DriftGuard::default(),
        }
    }

    /// Absolute start of the next symbol window.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Where the postamble ends if it starts at the cursor.
    pub fn resume_point(&self) -> usize {
        self.cursor + POSTAMBLE_SYMBOLS * self.len
    }

    pub fn drift(&self) -> &DriftGuard {
        &self.drift
    }

    pub fn earliest_needed(&self) -> usize {
        self.cursor.saturating_sub(self.offset)
    }

    /// Examine the window at the cursor. Returns `None` until the window and
    /// both offset windows are buffered.
    pub fn advance(&mut self, buffer: &SampleBuffer, analyzer: &mut SpectralAnalyzer) -> Result<Option<TrackEvent>> {
        let early_start = self.cursor.saturating_sub(self.offset);
        let late_start = self.cursor + self.offset;
        if !buffer.contains(early_start, late_start + self.len - early_start) {
            return Ok(None);
        }

        let spectrum = analyzer.analyze(buffer.window(self.cursor, self.len))?;
        if spectrum.end_marker >= MARKER_THRESHOLD {
            return Ok(Some(TrackEvent::Postamble));
        }

        let early = analyzer.analyze(buffer.window(early_start, self.len))?.concentration();
        let late = analyzer.analyze(buffer.window(late_start, self.len))?.concentration();
        let nudge = self.drift.observe(early, late, self.nudge_step);

        let next = self.cursor as i64 + self.len as i64 + nudge;
        self.cursor = next.max(0) as usize;

        Ok(Some(TrackEvent::Symbol(spectrum)))
    }
}
