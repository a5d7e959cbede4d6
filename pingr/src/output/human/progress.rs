use std::collections::BTreeMap;
use std::sync::Mutex;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use pingr_core::{ProgressEvent, ProgressPhase};

/// The "submitting" and "collecting" bars, created on their first event.
pub(crate) struct HumanProgress {
    inner: Mutex<Inner>,
}

impl HumanProgress {
    pub(crate) fn new() -> Self {
        let multi = MultiProgress::new();
        multi.set_draw_target(ProgressDrawTarget::stderr_with_hz(5));

        Self {
            inner: Mutex::new(Inner {
                multi,
                bars: BTreeMap::new(),
            }),
        }
    }

    pub(crate) fn update(&self, event: ProgressEvent) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let pb = inner.get_or_create_bar(event.phase, event.total);
        pb.set_position(event.done.min(event.total));
    }

    pub(crate) fn finish(&self) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        while let Some((_, pb)) = inner.bars.pop_first() {
            pb.finish_and_clear();
        }

        let _ = inner.multi.clear();
    }
}

struct Inner {
    multi: MultiProgress,
    bars: BTreeMap<u8, ProgressBar>,
}

impl Inner {
    fn get_or_create_bar(&mut self, phase: ProgressPhase, total: u64) -> &ProgressBar {
        let multi = &self.multi;
        self.bars.entry(phase_order(phase)).or_insert_with(|| {
            let pb = ProgressBar::new(total);
            pb.set_style(bar_style());
            pb.set_prefix(format!("{:>10}", phase.to_string()));
            // Keep "submitting" above "collecting" whatever arrives first.
            match phase {
                ProgressPhase::Submitting => multi.insert(0, pb),
                ProgressPhase::Collecting => multi.add(pb),
            }
        })
    }
}

fn phase_order(phase: ProgressPhase) -> u8 {
    match phase {
        ProgressPhase::Submitting => 0,
        ProgressPhase::Collecting => 1,
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix} [ {bar:20.cyan/blue} ] {percent:>3}% {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█░")
}
