use std::fmt::Write as _;
use std::str::FromStr;

use counter::Counter;
use dialoguer::console::Style;
use num_format::{Locale, ToFormattedString};

use crate::shared_interface::{AlertLevel, Warning};

pub mod export;

/// Colour scheme for terminal output. Has no effect on predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Default for Theme {
    fn default() -> Self {
        Theme::Dark
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme \"{}\" (expected light or dark)", other)),
        }
    }
}

impl Theme {
    pub fn alert_style(self, level: AlertLevel) -> Style {
        let style = Style::new().bold();
        match (self, level) {
            (Theme::Dark, AlertLevel::Green) => style.green().bright(),
            (Theme::Dark, AlertLevel::Yellow) => style.yellow().bright(),
            (Theme::Dark, AlertLevel::Orange) => style.color256(208),
            (Theme::Dark, AlertLevel::Red) => style.red().bright(),
            (Theme::Light, AlertLevel::Green) => style.green(),
            // Plain yellow is unreadable on a light background
            (Theme::Light, AlertLevel::Yellow) => style.color256(136),
            (Theme::Light, AlertLevel::Orange) => style.color256(166),
            (Theme::Light, AlertLevel::Red) => style.red(),
        }
    }

    pub fn heading_style(self) -> Style {
        match self {
            Theme::Dark => Style::new().bold().white().bright(),
            Theme::Light => Style::new().bold().black(),
        }
    }

    pub fn warning_style(self) -> Style {
        match self {
            Theme::Dark => Style::new().yellow(),
            Theme::Light => Style::new().color256(130),
        }
    }
}

pub fn render_definitions(theme: Theme) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", theme.heading_style().apply_to("Alert Level Definitions"));
    for level in AlertLevel::ALL.iter().copied() {
        let _ = writeln!(out, "  {} {}", theme.alert_style(level).apply_to(format!("{}:", level)), level.description());
    }
    out
}

/// The result screen for one record.
pub fn render_prediction(level: AlertLevel, theme: Theme) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Predicted Alert Level: {}", theme.alert_style(level).apply_to(level));
    let _ = writeln!(out);
    out.push_str(&render_definitions(theme));
    out
}

pub fn render_warnings(warnings: &[Warning], theme: Theme) -> String {
    let style = theme.warning_style();
    warnings.iter()
        .map(|w| format!("{} {}\n", style.apply_to("warning:"), w))
        .collect()
}

/// Per-level counts of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub total: usize,
    /// In order of increasing severity.
    pub counts: Vec<(AlertLevel, usize)>,
}

impl Summary {
    pub fn from_labels(labels: &[AlertLevel]) -> Self {
        let counter = labels.iter().copied().collect::<Counter<AlertLevel>>();
        let counts = AlertLevel::ALL.iter()
            .map(|level| (*level, counter.get(level).copied().unwrap_or(0)))
            .collect();

        Summary { total: labels.len(), counts }
    }

    pub fn count(&self, level: AlertLevel) -> usize {
        self.counts.iter().find(|(l, _)| *l == level).map_or(0, |(_, n)| *n)
    }

    pub fn render(&self, theme: Theme) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", theme.heading_style().apply_to(format!(
            "Predicted {} event(s)", self.total.to_formatted_string(&Locale::en)
        )));

        for (level, n) in self.counts.iter() {
            let share = if self.total == 0 { 0. } else { *n as f64 * 100. / self.total as f64 };
            // Pad before styling, escape codes would count toward the width
            let _ = writeln!(
                out,
                "  {} {:>10}  {:>5.1}%",
                theme.alert_style(*level).apply_to(format!("{:<16}", level)),
                n.to_formatted_string(&Locale::en),
                share
            );
        }
        out
    }
}
