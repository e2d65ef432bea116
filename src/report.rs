//! Terminal output for the CLI.

use owo_colors::OwoColorize;

use crate::materialize::{GlobalSummary, LeaderboardEntry};
use crate::pipeline::CycleReport;
use crate::rules::{RuleResult, RuleSet};

#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    no_color: bool,
}

fn opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.1}"))
}

impl Reporter {
    pub fn new(no_color: bool) -> Self {
        Self { no_color }
    }

    pub fn cycle_line(&self, report: &CycleReport) -> String {
        if self.no_color {
            format!(
                "Cycle {}: fetched={}, added={}, duplicates={}, errors={}, gaps={}, generation={} ({} ms)",
                report.cycle_id,
                report.fetched,
                report.hands_added,
                report.duplicates,
                report.ingestion_errors,
                report.classification_gaps,
                report.generation,
                report.elapsed_ms
            )
        } else {
            format!(
                "{} {} {} {} {} {} {} {} {} {}",
                "Cycle".bold().cyan(),
                report.cycle_id.to_string().dimmed(),
                "fetched".bold().white(),
                report.fetched,
                "added".bold().white(),
                report.hands_added.green(),
                "errors".bold().white(),
                report.ingestion_errors.yellow(),
                "gaps".bold().white(),
                report.classification_gaps.red()
            )
        }
    }

    pub fn summary_line(&self, summary: &GlobalSummary) -> String {
        if self.no_color {
            format!(
                "Summary: players={}, hands={}, actions={}, vpip={}%, pfr={}%, j-score={}",
                summary.total_players,
                summary.total_hands,
                summary.total_actions,
                opt(summary.vpip_pct),
                opt(summary.pfr_pct),
                opt(summary.avg_j_score)
            )
        } else {
            format!(
                "{} {} {} {} {} {}% {} {}% {} {}",
                "Summary".bold().magenta(),
                summary.total_players,
                "hands".bold().white(),
                summary.total_hands,
                "VPIP".bold().white(),
                opt(summary.vpip_pct),
                "PFR".bold().white(),
                opt(summary.pfr_pct),
                "J-score".bold().white(),
                opt(summary.avg_j_score).bold().green()
            )
        }
    }

    pub fn leaderboard_lines(&self, entries: &[LeaderboardEntry]) -> Vec<String> {
        if entries.is_empty() {
            return vec!["Leaderboard: no player above the hand threshold".to_string()];
        }
        let header = format!(
            "{:>4}  {:<16} {:>6} {:>8} {:>6} {:>6}",
            "#", "player", "hands", "j-score", "vpip", "pfr"
        );
        let mut lines = vec![if self.no_color {
            header
        } else {
            header.bold().to_string()
        }];
        lines.extend(entries.iter().map(|e| {
            format!(
                "{:>4}  {:<16} {:>6} {:>8} {:>6} {:>6}",
                e.rank,
                e.name,
                e.hands,
                opt(e.avg_j_score),
                opt(e.vpip_pct),
                opt(e.pfr_pct)
            )
        }));
        lines
    }

    pub fn rule_lines(&self, rules: &RuleSet) -> Vec<String> {
        let mut lines = vec![format!(
            "{} rules (version {})",
            rules.len(),
            rules.version().unwrap_or("unversioned")
        )];
        lines.extend(rules.rules().iter().map(|rule| {
            let result = match rule.result {
                RuleResult::Literal(label) => label.to_string(),
                RuleResult::Template(_) => "{n}bet".to_string(),
            };
            let id = if self.no_color {
                rule.id.clone()
            } else {
                rule.id.bold().to_string()
            };
            format!(
                "{:>5}  {:<9} {:<24} -> {} ({} conditions)",
                rule.priority,
                rule.scope.to_string(),
                id,
                result,
                rule.predicates.len()
            )
        }));
        lines
    }

    pub fn print_cycle(&self, report: &CycleReport) {
        println!("{}", self.cycle_line(report));
    }

    pub fn print_summary(&self, summary: &GlobalSummary) {
        println!("{}", self.summary_line(summary));
    }

    pub fn print_leaderboard(&self, entries: &[LeaderboardEntry]) {
        for line in self.leaderboard_lines(entries) {
            println!("{line}");
        }
    }

    pub fn print_rules(&self, rules: &RuleSet) {
        for line in self.rule_lines(rules) {
            println!("{line}");
        }
    }
}
