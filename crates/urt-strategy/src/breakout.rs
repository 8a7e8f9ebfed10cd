use std::collections::{BTreeMap, VecDeque};

use tracing::debug;

use urt_schemas::{Action, PositionState};

use crate::{Bar, BarDecision, BoxState, BreakoutConfig, BreakoutConfigError};

fn fmt_px(x: f64) -> String {
    format!("{:.1}", x)
}

/// Box breakout state machine for one instrument.
///
/// The candidate box is the max high / min low of the `lookback` bars before
/// the current one. It freezes after `min_width` consecutive closes inside
/// it. A close beyond a frozen edge is a breakout; the box stays frozen until
/// it expires or the caller resets it.
#[derive(Clone, Debug)]
pub struct BreakoutDetector {
    cfg: BreakoutConfig,
    bars: VecDeque<Bar>,
    state: BoxState,
    /// Index of the most recent bar; `None` before the first bar.
    bar_index: Option<u64>,
}

impl BreakoutDetector {
    pub fn new(cfg: BreakoutConfig) -> Result<Self, BreakoutConfigError> {
        cfg.validate()?;
        Ok(Self::fresh(cfg))
    }

    /// Caller guarantees `cfg` is valid.
    fn fresh(cfg: BreakoutConfig) -> Self {
        let cap = cfg.lookback + 2;
        Self {
            cfg,
            bars: VecDeque::with_capacity(cap),
            state: BoxState::default(),
            bar_index: None,
        }
    }

    pub fn config(&self) -> &BreakoutConfig {
        &self.cfg
    }

    pub fn box_state(&self) -> &BoxState {
        &self.state
    }

    pub fn bars_seen(&self) -> u64 {
        self.bar_index.map(|i| i + 1).unwrap_or(0)
    }

    /// Clear the box, e.g. after the caller acted on a breakout.
    pub fn reset_box(&mut self) {
        self.state.reset();
    }

    /// Feed one bar with the caller's current position.
    ///
    /// The bar is always recorded. Box state is only touched while FLAT.
    pub fn on_bar(&mut self, bar: Bar, position: PositionState) -> BarDecision {
        let idx = self.bar_index.map(|i| i + 1).unwrap_or(0);
        self.bar_index = Some(idx);
        if self.bars.len() == self.cfg.lookback + 2 {
            self.bars.pop_front();
        }
        self.bars.push_back(bar);

        if !position.is_flat() {
            return BarDecision::hold(format!("breakout_veto_not_flat:{position}"), "veto");
        }

        if self.bars.len() <= self.cfg.lookback {
            let need = self.cfg.lookback + 1 - self.bars.len();
            return BarDecision::hold(format!("darvas_warming_up_need_{need}_bars"), "hold");
        }

        if self.state.active {
            return self.check_frozen(idx, bar.close);
        }
        self.form(idx, bar.close)
    }

    /// (top, bottom) over the `lookback` bars preceding the current one.
    fn candidate_bounds(&self) -> (f64, f64) {
        let n = self.bars.len();
        let window = self.bars.range(n - 1 - self.cfg.lookback..n - 1);
        window.fold((f64::NEG_INFINITY, f64::INFINITY), |(top, bot), b| {
            (top.max(b.high), bot.min(b.low))
        })
    }

    fn form(&mut self, idx: u64, close: f64) -> BarDecision {
        let (top, bot) = self.candidate_bounds();
        self.state.candidate_top = Some(top);
        self.state.candidate_bottom = Some(bot);

        if bot <= close && close <= top {
            self.state.confirm_count += 1;
        } else {
            self.state.confirm_count = 0;
        }

        if self.state.confirm_count >= self.cfg.min_width {
            self.state.active = true;
            self.state.top = Some(top);
            self.state.bottom = Some(bot);
            self.state.formed_at_index = Some(idx);
            debug!(top, bottom = bot, bar = idx, "box frozen");
            return BarDecision::hold(
                format!(
                    "darvas_box_frozen|top={}|bot={}|confirm={}/{}",
                    fmt_px(top),
                    fmt_px(bot),
                    self.state.confirm_count,
                    self.cfg.min_width
                ),
                "box_frozen",
            );
        }

        BarDecision::hold(
            format!(
                "darvas_box_forming|confirm={}/{}|cand_top={}|cand_bot={}",
                self.state.confirm_count,
                self.cfg.min_width,
                fmt_px(top),
                fmt_px(bot)
            ),
            "hold",
        )
    }

    fn check_frozen(&mut self, idx: u64, close: f64) -> BarDecision {
        let (Some(top), Some(bot), Some(formed)) =
            (self.state.top, self.state.bottom, self.state.formed_at_index)
        else {
            // An active box always carries its bounds; recover by starting over.
            self.state.reset();
            return BarDecision::hold("darvas_box_state_reset".to_string(), "hold");
        };

        let age = idx - formed;
        if age > self.cfg.expiry_bars {
            self.state.reset();
            debug!(age, top, bottom = bot, "box expired");
            return BarDecision::hold(
                format!(
                    "darvas_box_expired|age={}|top={}|bot={}",
                    age,
                    fmt_px(top),
                    fmt_px(bot)
                ),
                "box_expired",
            );
        }

        if close > top {
            return BarDecision::enter(
                Action::EnterLong,
                format!("darvas_breakout_up_close_over_top={}", fmt_px(top)),
            );
        }
        if close < bot {
            return BarDecision::enter(
                Action::EnterShort,
                format!("darvas_breakout_down_close_under_bot={}", fmt_px(bot)),
            );
        }

        BarDecision::hold(
            format!(
                "darvas_box_active_no_breakout|age={}|top={}|bot={}",
                age,
                fmt_px(top),
                fmt_px(bot)
            ),
            "hold",
        )
    }
}

/// One detector per instrument, created on first use.
#[derive(Clone, Debug)]
pub struct DetectorBook {
    cfg: BreakoutConfig,
    detectors: BTreeMap<String, BreakoutDetector>,
}

impl DetectorBook {
    pub fn new(cfg: BreakoutConfig) -> Result<Self, BreakoutConfigError> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            detectors: BTreeMap::new(),
        })
    }

    pub fn get_mut(&mut self, instrument: &str) -> &mut BreakoutDetector {
        let cfg = &self.cfg;
        self.detectors
            .entry(instrument.to_string())
            .or_insert_with(|| BreakoutDetector::fresh(cfg.clone()))
    }

    pub fn get(&self, instrument: &str) -> Option<&BreakoutDetector> {
        self.detectors.get(instrument)
    }

    pub fn instruments(&self) -> impl Iterator<Item = &str> {
        self.detectors.keys().map(String::as_str)
    }
}
