use std::io::IsTerminal;
use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{HumanCount, HumanDuration, ProgressBar, ProgressStyle};

const SKILL_BAR_TEMPLATE: &str =
    "{spinner:.green} {msg} [{bar:24.green/white}] {pos}/{len} ({elapsed})";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

/// Plain output carries no badges, colors or progress bars.
#[derive(Copy, Clone, Debug)]
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
}

pub(crate) struct TerminalProgress {
    style: OutputStyle,
    label: String,
    done: u64,
    total: u64,
    bar: Option<ProgressBar>,
    started: Instant,
}

pub(crate) fn resolve_output_style(stdout_is_tty: bool, force_plain: bool) -> OutputStyle {
    match (stdout_is_tty, force_plain) {
        (true, false) => OutputStyle::Rich,
        _ => OutputStyle::Plain,
    }
}

/// `--plain` and a non-empty `NO_COLOR` both force plain output.
pub(crate) fn current_output_style(plain_flag: bool) -> OutputStyle {
    let no_color = std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty());
    resolve_output_style(std::io::stdout().is_terminal(), plain_flag || no_color)
}

impl TerminalRenderer {
    pub(crate) fn from_style(style: OutputStyle) -> Self {
        Self { style }
    }

    pub(crate) fn style(self) -> OutputStyle {
        self.style
    }

    pub(crate) fn print_status(self, status: &str, message: &str) {
        println!("{}", render_status_line(self.style, status, message));
    }

    pub(crate) fn print_warnings(self, warnings: &[String]) {
        for warning in warnings {
            self.print_status("warn", warning);
        }
    }

    pub(crate) fn print_section(self, title: &str) {
        if self.style == OutputStyle::Plain {
            return;
        }
        println!();
        println!("{}", paint(heading_style(), &format!("== {title} ==")));
    }

    pub(crate) fn print_lines(self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }

    pub(crate) fn start_progress(self, label: &str, total: u64) -> TerminalProgress {
        let bar = (self.style == OutputStyle::Rich).then(|| skill_bar(label, total));
        TerminalProgress {
            style: self.style,
            label: label.to_string(),
            done: 0,
            total,
            bar,
            started: Instant::now(),
        }
    }
}

fn skill_bar(label: &str, total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    match ProgressStyle::with_template(SKILL_BAR_TEMPLATE) {
        Ok(style) => bar.set_style(style.progress_chars("#>-")),
        Err(err) => tracing::debug!(%err, "invalid progress template"),
    }
    bar.set_message(label.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

impl TerminalProgress {
    pub(crate) fn advance(&mut self) {
        if self.done < self.total {
            self.done += 1;
        }
        if let Some(bar) = &self.bar {
            bar.set_position(self.done);
        }
    }

    pub(crate) fn finish_success(mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        let summary = render_progress_line(
            self.style,
            &self.label,
            self.done,
            self.total,
            Some(self.started.elapsed()),
        );
        if let Some(line) = summary {
            println!("{line}");
        }
    }
}

/// `[OK]`, `[WARN]` and `[ERR]` badges in rich mode; anything else is a step.
pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    if style == OutputStyle::Plain {
        return message.to_string();
    }
    let badge = match status {
        "ok" => "[OK]",
        "warn" => "[WARN]",
        "err" => "[ERR]",
        _ => "[..]",
    };
    format!("{badge} {message}")
}

/// Summary printed once a progress bar is cleared. Plain output has none.
pub(crate) fn render_progress_line(
    style: OutputStyle,
    label: &str,
    done: u64,
    total: u64,
    elapsed: Option<Duration>,
) -> Option<String> {
    if style == OutputStyle::Plain {
        return None;
    }
    let took = elapsed
        .map(|elapsed| format!(" in {}", HumanDuration(elapsed)))
        .unwrap_or_default();
    Some(format!(
        "{} {}/{} copied{took}",
        paint(label_style(), label),
        HumanCount(done),
        HumanCount(total)
    ))
}

fn heading_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::Magenta.into()))
        .effects(Effects::BOLD | Effects::UNDERLINE)
}

fn label_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::Green.into()))
        .effects(Effects::BOLD)
}

fn paint(style: Style, text: &str) -> String {
    format!("{style}{text}{style:#}")
}
