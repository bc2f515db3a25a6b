//! File export for simulation runs

use crate::analytics::metrics::ResultsAggregator;
use crate::simulation::SimulationRun;
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes run results under an output directory
pub struct SimulationLogger {
    output_dir: PathBuf,
}

impl SimulationLogger {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    fn logs_dir(&self) -> PathBuf {
        self.output_dir.join("logs")
    }

    /// Ensure output directories exist
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(self.logs_dir()).context("Failed to create logs directory")?;
        Ok(())
    }

    /// Save the full run as pretty JSON
    pub fn save_results(&self, run: &SimulationRun) -> Result<PathBuf> {
        self.ensure_dirs()?;

        let filename = self
            .logs_dir()
            .join(format!("simulation_{}.json", run.started_at.format("%Y%m%d_%H%M%S")));
        let json = serde_json::to_string_pretty(run).context("Failed to serialize results")?;

        let mut file = File::create(&filename).context("Failed to create results file")?;
        file.write_all(json.as_bytes()).context("Failed to write results file")?;

        info!("Results saved to: {}", filename.display());
        Ok(filename)
    }

    pub fn load_results(path: impl AsRef<Path>) -> Result<SimulationRun> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read results file {}", path.display()))?;
        serde_json::from_str(&contents).context("Failed to parse results file")
    }

    /// Save the text summary next to the JSON results
    pub fn save_summary(&self, run: &SimulationRun) -> Result<PathBuf> {
        self.ensure_dirs()?;

        let filename = self
            .logs_dir()
            .join(format!("summary_{}.txt", run.started_at.format("%Y%m%d_%H%M%S")));
        let mut file = File::create(&filename).context("Failed to create summary file")?;
        file.write_all(format_summary(run).as_bytes())
            .context("Failed to write summary file")?;

        info!("Summary saved to: {}", filename.display());
        Ok(filename)
    }
}

/// Format a run as a boxed text summary
pub fn format_summary(run: &SimulationRun) -> String {
    let t = &run.totals;
    let report = ResultsAggregator::analyze(run);
    let rule = "═".repeat(66);
    let line = |text: String| format!("║  {:<64}║\n", text);
    let fmt_corr = |c: Option<f64>| c.map_or_else(|| "n/a".to_string(), |v| format!("{:.3}", v));

    let mut out = String::new();
    out.push_str(&format!("\n╔{}╗\n", rule));
    out.push_str(&line("MEV COMPETITION RESULTS".to_string()));
    out.push_str(&format!("╠{}╣\n", rule));
    out.push_str(&line(format!("Run:                  {}", run.name)));
    out.push_str(&line(format!("Rounds:               {:>10}", run.rounds.len())));
    out.push_str(&line(format!("Stopped by:           {:?}", run.stop_reason)));
    out.push_str(&line(format!("Trade intents:        {:>10}", t.total_intents)));
    out.push_str(&line(format!(
        "Executed / rejected:  {:>10} / {}",
        t.executed_trades, t.rejected_trades
    )));
    out.push_str(&format!("╠{}╣\n", rule));
    out.push_str(&line(format!("Attacks:              {:>10}", t.total_attacks)));
    out.push_str(&line(format!(
        "Successful:           {:>10} ({:.1}%)",
        t.successful_attacks,
        t.success_rate * 100.0
    )));
    out.push_str(&line(format!("Total MEV profit:     {:>10.6}", t.total_mev_profit)));
    out.push_str(&line(format!("Total victim loss:    {:>10.6}", t.total_victim_loss)));
    out.push_str(&line(format!("Value destroyed:      {:>10.6}", t.total_value_destroyed)));
    out.push_str(&line(format!(
        "Extraction efficiency:{:>10.1}%",
        report.extraction_efficiency * 100.0
    )));
    out.push_str(&format!("╠{}╣\n", rule));
    out.push_str(&line("EXTRACTORS (by profit)".to_string()));
    for r in &report.agent_rankings {
        out.push_str(&line(format!(
            "{}. {:<18} {:<12} {:>10.6} {:>6.1}%",
            r.rank,
            r.agent_id,
            r.strategy.as_str(),
            r.total_profit,
            r.success_rate * 100.0
        )));
    }
    out.push_str(&format!("╠{}╣\n", rule));
    out.push_str(&line("RACES (wins / contests, mean rank, mean latency)".to_string()));
    for c in &report.contention_stats {
        out.push_str(&line(format!(
            "{:<18} {:>5} / {:<5} rank {:>4.2}  {:>8.1}ms",
            c.agent_id, c.wins, c.contests, c.avg_rank, c.avg_latency_ms
        )));
    }
    out.push_str(&format!("╠{}╣\n", rule));
    out.push_str(&line("VICTIMS (by persona)".to_string()));
    for (persona, impact) in &report.persona_impact {
        out.push_str(&line(format!(
            "{:<12} attacks {:>5}  rate {:>5.1}%  loss {:>10.6}",
            persona,
            impact.mev_attacks,
            impact.attack_rate * 100.0,
            impact.total_mev_loss
        )));
    }
    out.push_str(&format!("╠{}╣\n", rule));
    out.push_str(&line(format!(
        "Latency vs profit:    {:>10}",
        fmt_corr(report.latency_correlation.latency_vs_profit)
    )));
    out.push_str(&line(format!(
        "Latency vs success:   {:>10}",
        fmt_corr(report.latency_correlation.latency_vs_success)
    )));
    out.push_str(&format!("╚{}╝\n", rule));
    out.push_str(&format!("\nGenerated: {}\n", run.ended_at.format("%Y-%m-%d %H:%M:%S UTC")));
    out
}

/// Print summary to terminal
pub fn print_summary(run: &SimulationRun) {
    println!("{}", format_summary(run));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::simulation::CompetitionOrchestrator;

    async fn quick_run(rounds: u64) -> SimulationRun {
        let mut config = SimulationConfig::quick_test();
        config.target_rounds = rounds;
        CompetitionOrchestrator::new(config).unwrap().run().await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_and_load_round_trip() {
        let dir = std::env::temp_dir().join(format!("mev-sim-logger-{}", std::process::id()));
        let logger = SimulationLogger::new(&dir);
        let run = quick_run(5).await;

        let path = logger.save_results(&run).unwrap();
        let loaded = SimulationLogger::load_results(&path).unwrap();

        assert_eq!(loaded.rounds.len(), 5);
        assert_eq!(loaded.totals, run.totals);

        let summary = logger.save_summary(&run).unwrap();
        assert!(summary.exists());
        fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test(start_paused = true)]
    async fn test_format_summary_lists_agents() {
        let run = quick_run(3).await;
        let text = format_summary(&run);

        assert!(text.contains("MEV COMPETITION RESULTS"));
        assert!(text.contains("RACES"));
        for stats in &run.extractor_stats {
            assert!(text.contains(&stats.agent_id));
        }
    }

    #[test]
    fn test_load_missing_file() {
        let err = SimulationLogger::load_results("/nonexistent/run.json").unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read results file"));
    }
}
