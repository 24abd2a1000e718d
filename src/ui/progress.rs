use console::Term;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

const RENDER_INTERVAL: Duration = Duration::from_millis(100);
const BAR_WIDTH: usize = 30;

#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressConfig {
    pub total: usize,
    /// Print one line per finished item.
    pub verbose: bool,
    /// Print nothing at all.
    pub quiet: bool,
}

enum Sink {
    /// Interactive terminal: an indicatif bar, log lines printed above it.
    Bar { bar: ProgressBar, term: Term },
    /// Anything else: a single status line redrawn with `\r`.
    Stream(Box<dyn Write + Send>),
    Hidden,
}

struct ProgressState {
    completed: usize,
    started: Instant,
    last_render: Option<Instant>,
    finished: bool,
    sink: Sink,
}

/// Completion counter shared by all workers.
///
/// Every mutation and every write happens under one short-held lock, so lines
/// from different workers never interleave. Write errors are ignored.
pub struct ProgressReporter {
    total: usize,
    verbose: bool,
    state: Mutex<ProgressState>,
}

impl ProgressReporter {
    /// Report to stderr: a bar on a terminal, plain status lines otherwise.
    pub fn new(config: ProgressConfig) -> Self {
        let sink = if config.quiet {
            Sink::Hidden
        } else if Term::stderr().is_term() {
            Sink::Bar {
                bar: create_bar(config.total),
                term: Term::stderr(),
            }
        } else {
            Sink::Stream(Box::new(io::stderr()))
        };
        Self::with_sink(config, sink)
    }

    pub fn with_writer(config: ProgressConfig, writer: Box<dyn Write + Send>) -> Self {
        let sink = if config.quiet {
            Sink::Hidden
        } else {
            Sink::Stream(writer)
        };
        Self::with_sink(config, sink)
    }

    pub fn hidden(total: usize) -> Self {
        Self::with_sink(
            ProgressConfig {
                total,
                ..ProgressConfig::default()
            },
            Sink::Hidden,
        )
    }

    fn with_sink(config: ProgressConfig, sink: Sink) -> Self {
        Self {
            total: config.total,
            verbose: config.verbose,
            state: Mutex::new(ProgressState {
                completed: 0,
                started: Instant::now(),
                last_render: None,
                finished: false,
                sink,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProgressState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.lock().completed
    }

    /// Reset the clock and draw the empty bar.
    pub fn start(&self) {
        let mut state = self.lock();
        state.started = Instant::now();
        self.render(&mut state);
    }

    /// Count one finished item. `message` is printed on its own line in verbose mode.
    pub fn increment(&self, message: Option<&str>) {
        let mut state = self.lock();
        state.completed += 1;
        let completed = state.completed;

        if let (true, Some(message)) = (self.verbose, message) {
            let line = format!("[{}/{}] {}", completed, self.total, message);
            match &mut state.sink {
                Sink::Bar { bar, .. } => bar.println(line),
                Sink::Stream(writer) => {
                    let _ = writeln!(writer, "\r\x1b[K{}", line);
                }
                Sink::Hidden => {}
            }
            self.render(&mut state);
            return;
        }

        let due = state
            .last_render
            .map_or(true, |last| last.elapsed() >= RENDER_INTERVAL);
        if due || completed >= self.total {
            self.render(&mut state);
        }
    }

    /// Print the summary line. Only the first call has any effect.
    pub fn finish(&self) {
        let mut state = self.lock();
        if state.finished {
            return;
        }
        state.finished = true;

        let elapsed = format_duration(state.started.elapsed());
        let summary = if state.completed >= self.total {
            format!("✓ Completed {} snapshots in {}", self.total, elapsed)
        } else {
            format!(
                "Completed {} of {} snapshots in {}",
                state.completed, self.total, elapsed
            )
        };

        match &mut state.sink {
            Sink::Bar { bar, term } => {
                bar.finish_and_clear();
                let _ = term.write_line(&summary);
            }
            Sink::Stream(writer) => {
                let _ = writeln!(writer, "\r\x1b[K{}", summary);
                let _ = writer.flush();
            }
            Sink::Hidden => {}
        }
    }

    fn render(&self, state: &mut ProgressState) {
        state.last_render = Some(Instant::now());
        let completed = state.completed;

        match &mut state.sink {
            Sink::Bar { bar, .. } => bar.set_position(completed as u64),
            Sink::Stream(writer) => {
                let line = status_line(completed, self.total, state.started.elapsed());
                let _ = write!(writer, "\r\x1b[K{}", line);
                let _ = writer.flush();
            }
            Sink::Hidden => {}
        }
    }
}

fn create_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos:>5}/{len:5} snapshots (ETA {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░"),
    );
    bar.enable_steady_tick(RENDER_INTERVAL);
    bar
}

/// `[██████░░░…]  40% (2/5) ETA: 3s`
fn status_line(completed: usize, total: usize, elapsed: Duration) -> String {
    let percent = if total > 0 { completed * 100 / total } else { 0 };
    let filled = if total > 0 {
        (BAR_WIDTH * completed / total).min(BAR_WIDTH)
    } else {
        0
    };
    let bar = format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled));

    let eta = if completed == 0 {
        "calculating...".to_string()
    } else if completed >= total {
        "almost done".to_string()
    } else {
        let per_item = elapsed / completed as u32;
        format_duration(per_item * (total - completed) as u32)
    };

    format!("[{}] {:>3}% ({}/{}) ETA: {}", bar, percent, completed, total, eta)
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", duration.as_millis())
    }
}
