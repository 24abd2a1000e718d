use crate::error::{UserFriendlyError, XplodeError};
use crate::extractor::RunReport;
use crate::ExtractionPlan;
use console::{style, Emoji, Term};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
    Plain,
}

impl OutputMode {
    pub fn from_string(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputMode::Json,
            "plain" => OutputMode::Plain,
            _ => OutputMode::Human,
        }
    }
}

static CHECKMARK: Emoji = Emoji("✅ ", "✓ ");
static CROSS: Emoji = Emoji("❌ ", "✗ ");
static INFO: Emoji = Emoji("ℹ️  ", "i ");
static WARNING: Emoji = Emoji("⚠️  ", "! ");
static BOOM: Emoji = Emoji("💥 ", "> ");

pub struct OutputFormatter {
    mode: OutputMode,
    use_colors: bool,
    verbose_level: u8,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let use_colors = match mode {
            OutputMode::Human => Term::stdout().features().colors_supported() && !quiet,
            _ => false,
        };

        Self {
            mode,
            use_colors,
            verbose_level: if quiet { 0 } else { verbose },
            quiet,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Success, message),
            OutputMode::Json => self.print_json_message("success", message),
            OutputMode::Plain => println!("SUCCESS: {}", message),
        }
    }

    /// Errors are printed even in quiet mode.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Error, message),
            OutputMode::Json => self.print_json_message("error", message),
            OutputMode::Plain => eprintln!("ERROR: {}", message),
        }
    }

    pub fn warning(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Warning, message),
                OutputMode::Json => self.print_json_message("warning", message),
                OutputMode::Plain => println!("WARNING: {}", message),
            }
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Info, message),
                OutputMode::Json => self.print_json_message("info", message),
                OutputMode::Plain => println!("INFO: {}", message),
            }
        }
    }

    pub fn print_user_friendly_error(&self, error: &XplodeError) {
        self.error(&error.user_message());

        if let Some(suggestion) = error.suggestion() {
            match self.mode {
                OutputMode::Human => {
                    eprintln!();
                    if self.use_colors {
                        eprintln!(
                            "{}{}",
                            INFO,
                            style(&format!("Suggestion: {}", suggestion)).cyan()
                        );
                    } else {
                        eprintln!("Suggestion: {}", suggestion);
                    }
                }
                OutputMode::Json => {
                    self.print_json_object(&serde_json::json!({
                        "type": "suggestion",
                        "message": suggestion
                    }));
                }
                OutputMode::Plain => eprintln!("SUGGESTION: {}", suggestion),
            }
        }
    }

    /// Announces what is about to be extracted.
    pub fn print_run_header(&self, plan: &ExtractionPlan, workers: usize) {
        if self.quiet {
            return;
        }

        let snapshots = plan.total_commits();
        match self.mode {
            OutputMode::Human => {
                println!();
                let title = format!("Exploding {}", plan.repository_name);
                if self.use_colors {
                    println!("{}{}", BOOM, style(title).bold().cyan());
                } else {
                    println!("=== {} ===", title);
                }
                println!("  Repository: {}", plan.repository_root.display());
                println!("  Branch:     {}", plan.reference);
                println!("  Output:     {}", plan.output_directory.display());
                println!("  Snapshots:  {}", snapshots);
                println!("  Workers:    {}", workers);
                if plan.targets.len() > 1 {
                    println!("  Branches:   {}", plan.targets.len());
                }
                println!();
            }
            OutputMode::Json => {
                self.print_json_object(&serde_json::json!({
                    "type": "start",
                    "repository": plan.repository_root,
                    "branch": plan.reference,
                    "output_directory": plan.output_directory,
                    "snapshots": snapshots,
                    "workers": workers,
                    "branches": plan.targets.len(),
                }));
            }
            OutputMode::Plain => {
                println!(
                    "STARTING: {} snapshots from {} ({}) into {} with {} workers",
                    snapshots,
                    plan.repository_root.display(),
                    plan.reference,
                    plan.output_directory.display(),
                    workers
                );
            }
        }
    }

    /// Lists what a run would do, without doing it.
    pub fn print_plan(&self, plan: &ExtractionPlan) {
        match self.mode {
            OutputMode::Json => {
                let targets: Vec<_> = plan
                    .targets
                    .iter()
                    .map(|target| {
                        serde_json::json!({
                            "branch": target.branch,
                            "output_directory": target.output_directory,
                            "commits": target.commits.iter().map(|c| &c.hash).collect::<Vec<_>>(),
                        })
                    })
                    .collect();
                self.print_json_object(&serde_json::json!({
                    "type": "plan",
                    "repository": plan.repository_root,
                    "branch": plan.reference,
                    "output_directory": plan.output_directory,
                    "snapshots": plan.total_commits(),
                    "targets": targets,
                    "skipped_branches": plan.skipped_branches,
                }));
            }
            OutputMode::Human | OutputMode::Plain => {
                println!(
                    "Would extract {} snapshots from {} ({}) into {}",
                    plan.total_commits(),
                    plan.repository_root.display(),
                    plan.reference,
                    plan.output_directory.display()
                );
                for target in &plan.targets {
                    if let Some(branch) = &target.branch {
                        println!();
                        println!("{} ({} commits):", branch, target.commits.len());
                    }
                    for (commit, folder) in target.commits.iter().zip(&target.folders) {
                        println!("  {}  {}", folder, commit.subject);
                    }
                }
                for branch in &plan.skipped_branches {
                    println!("Skipping {}: no commits", branch);
                }
            }
        }
    }

    pub fn print_run_summary(&self, report: &RunReport) {
        match self.mode {
            OutputMode::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
                );
            }
            OutputMode::Human if !self.quiet => self.print_human_summary(report),
            OutputMode::Plain if !self.quiet => self.print_plain_summary(report),
            _ => {}
        }
    }

    pub fn print_separator(&self) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                if self.use_colors {
                    println!("{}", style("─".repeat(60)).dim());
                } else {
                    println!("{}", "-".repeat(60));
                }
            }
            OutputMode::Plain => println!("{}", "-".repeat(60)),
            OutputMode::Json => {}
        }
    }

    fn should_show_message(&self, min_verbose_level: u8) -> bool {
        !self.quiet && self.verbose_level >= min_verbose_level
    }

    fn print_human_message(&self, msg_type: MessageType, message: &str) {
        if self.use_colors {
            let (emoji, styled) = match msg_type {
                MessageType::Success => (&CHECKMARK, style(message).green().bold()),
                MessageType::Error => (&CROSS, style(message).red().bold()),
                MessageType::Warning => (&WARNING, style(message).yellow().bold()),
                MessageType::Info => (&INFO, style(message).cyan()),
            };
            match msg_type {
                MessageType::Error => eprintln!("{}{}", emoji, styled),
                _ => println!("{}{}", emoji, styled),
            }
        } else {
            let prefix = match msg_type {
                MessageType::Success => "✓",
                MessageType::Error => "✗",
                MessageType::Warning => "!",
                MessageType::Info => "i",
            };
            match msg_type {
                MessageType::Error => eprintln!("{} {}", prefix, message),
                _ => println!("{} {}", prefix, message),
            }
        }
    }

    fn print_json_message(&self, level: &str, message: &str) {
        self.print_json_object(&serde_json::json!({
            "type": "message",
            "level": level,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }));
    }

    fn print_json_object(&self, obj: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string(obj).unwrap_or_else(|_| "{}".to_string())
        );
    }

    fn highlight(&self, value: impl ToString) -> String {
        if self.use_colors {
            style(value.to_string()).cyan().bold().to_string()
        } else {
            value.to_string()
        }
    }

    fn print_human_summary(&self, report: &RunReport) {
        println!();
        self.print_separator();

        let headline = if report.is_success() {
            "Extraction completed!"
        } else if report.cancelled {
            "Extraction cancelled"
        } else {
            "Extraction finished with failures"
        };
        if self.use_colors {
            let styled = if report.is_success() {
                style(headline).green().bold()
            } else {
                style(headline).yellow().bold()
            };
            println!("{}", styled);
        } else {
            println!("{}", headline);
        }

        println!();
        println!("  Extracted:  {} of {}", self.highlight(report.succeeded), report.total);
        if report.failed > 0 {
            println!("  Failed:     {}", self.highlight(report.failed));
        }
        if report.skipped > 0 {
            println!("  Skipped:    {}", self.highlight(report.skipped));
        }
        println!(
            "  Time taken: {}",
            self.highlight(format_duration(Duration::from_millis(report.duration_ms)))
        );
        println!("  Output:     {}", report.output_directory.display());

        self.print_separator();
    }

    fn print_plain_summary(&self, report: &RunReport) {
        println!("COMPLETED: {} of {} snapshots extracted", report.succeeded, report.total);
        println!("Failed: {}", report.failed);
        println!("Skipped: {}", report.skipped);
        println!("Duration: {} ms", report.duration_ms);
        println!("Output: {}", report.output_directory.display());
    }
}

#[derive(Debug, Clone, Copy)]
enum MessageType {
    Success,
    Error,
    Warning,
    Info,
}

fn format_duration(duration: Duration) -> String {
    crate::ui::progress::format_duration(duration)
}
