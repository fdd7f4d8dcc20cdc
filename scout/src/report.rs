//! Plain-text and JSON rendering of scan and review results.

use std::fmt::Write;

use repertoire::{Mistake, OpeningStats, OutcomeTally, PositionNode, ScanProgress, ScanSummary};
use serde::Serialize;

/// Everything a scan produced, in a serializable shape.
#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub games: usize,
    pub skipped: usize,
    pub progress: ScanProgress,
    pub openings: Vec<OpeningStats>,
    /// Nodes in first-visit order.
    pub positions: Vec<PositionNode>,
}

impl ScanReport {
    pub fn new(
        summary: &ScanSummary,
        progress: ScanProgress,
        openings: Vec<OpeningStats>,
        positions: Vec<PositionNode>,
    ) -> Self {
        Self {
            games: summary.games,
            skipped: summary.index.skipped.len(),
            progress,
            openings,
            positions,
        }
    }
}

fn rate(stats: &OutcomeTally) -> String {
    stats
        .score_rate()
        .map_or_else(|| "-".to_string(), |r| format!("{:.0}%", r * 100.0))
}

/// Openings by games played, then the scored positions.
pub fn format_scan(report: &ScanReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} games indexed ({} skipped), {} positions, {}/{} analyzed",
        report.games.saturating_sub(report.skipped),
        report.skipped,
        report.positions.len(),
        report.progress.analyzed,
        report.progress.analyze_total,
    );

    let mut openings: Vec<&OpeningStats> = report.openings.iter().collect();
    openings.sort_by(|a, b| b.total_games().cmp(&a.total_games()).then(a.name.cmp(&b.name)));

    let _ = writeln!(out, "\nOpenings:");
    for stats in openings {
        let _ = writeln!(
            out,
            "  {:<40} white {:>3} ({:>4})  black {:>3} ({:>4})",
            stats.name,
            stats.as_white.games,
            rate(&stats.as_white),
            stats.as_black.games,
            rate(&stats.as_black),
        );
    }

    let scored: Vec<_> = report
        .positions
        .iter()
        .filter_map(|node| node.evaluation.as_ref().map(|eval| (node, eval)))
        .collect();
    if !scored.is_empty() {
        let _ = writeln!(out, "\nRecurring positions:");
    }
    for (node, eval) in scored {
        let main = node
            .main_move()
            .map_or_else(String::new, |(san, count)| format!("{} x{}", san, count));
        let _ = writeln!(
            out,
            "  {:+6.2}  seen {:>3}  played {:<10} best {:<6} {}",
            eval.score,
            node.visit_count,
            main,
            eval.best_move.as_deref().unwrap_or("-"),
            node.fen,
        );
    }
    out
}

/// One line per mistake, or a note that there were none.
pub fn format_mistakes(game_id: &str, mistakes: &[Mistake]) -> String {
    if mistakes.is_empty() {
        return format!("No mistakes found in {}\n", game_id);
    }

    let mut out = format!("{} mistakes in {}:\n", mistakes.len(), game_id);
    for m in mistakes {
        let dots = match m.player_color {
            chess::PlayerSide::White => ".",
            chess::PlayerSide::Black => "...",
        };
        let _ = writeln!(
            out,
            "  {}{} {}  {:+.2} -> {:+.2} (-{:.2})  best {}  acceptable: {}",
            m.move_number,
            dots,
            m.user_move,
            m.eval_before,
            m.eval_after,
            m.eval_drop,
            m.best_move_san.as_deref().unwrap_or("-"),
            m.acceptable_moves.join(" "),
        );
    }
    out
}
