//! CLI command implementations.

use colored::Colorize;
use fasttrack_core::{extract_span, language_for_path, Node};
use fasttrack_graph::{LoadOutcome, ProjectStore, Settings, SpanTag, TrackingGraph};
use fasttrack_server::{FastTrackServer, ServerConfig};
use fasttrack_watcher::{ProjectWatcher, Scanner, WatchConfig};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Initialize FastTrack in a project.
pub fn init(path: &Path) -> Result<()> {
    let store = ProjectStore::new(path);

    if store.is_initialized() {
        println!("{} Already initialized", "✓".green());
        return Ok(());
    }

    store.initialize()?;
    store.log_activity("Initialized FastTrack");

    println!("{} Initialized FastTrack in {}", "✓".green(), path.display());
    println!("  Run {} to find AI-generated code", "fasttrack scan".cyan());

    Ok(())
}

/// Scan the project and save the graph.
pub fn scan(path: &Path) -> Result<()> {
    let (store, settings) = open(path)?;
    let mut graph = load_graph(&store);

    println!("{}", "Scanning project...".cyan());

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message("Analyzing files...");

    let result = Scanner::new(path, &settings)?.scan(&mut graph);

    spinner.finish_and_clear();

    store.save_graph(&graph.into_document())?;
    store.log_activity(&format!(
        "Scanned {} files: {} blocks tagged, {} tests linked",
        result.files_scanned, result.blocks_tagged, result.tests_linked
    ));

    println!(
        "{} Scanned {} files in {}ms",
        "✓".green(),
        result.files_scanned.to_string().cyan(),
        result.duration_ms
    );
    println!(
        "  {} AI blocks tagged, {} removed, {} test links added",
        result.blocks_tagged.to_string().cyan(),
        result.blocks_pruned,
        result.tests_linked.to_string().cyan()
    );
    if result.files_removed > 0 {
        println!(
            "  {} deleted files dropped from the graph",
            result.files_removed.to_string().yellow()
        );
    }

    if !result.errors.is_empty() {
        println!("\n{} files could not be analyzed:", "⚠".yellow());
        for error in result.errors.iter().take(5) {
            println!("  {}", error.red());
        }
        if result.errors.len() > 5 {
            println!("  ... and {} more", result.errors.len() - 5);
        }
    }

    Ok(())
}

/// Show graph statistics and the dashboard summary.
pub fn status(path: &Path) -> Result<()> {
    let (store, settings) = open(path)?;
    let graph = load_graph(&store);
    let summary = graph.summary(settings.stale_code.days, settings.complexity.threshold);

    println!("{}", "FastTrack Status".cyan().bold());
    println!();
    println!("  {} {}", "Files:".dimmed(), summary.stats.files);
    println!("  {} {}", "Code blocks:".dimmed(), summary.stats.code_blocks);
    println!("  {} {}", "Tests:".dimmed(), summary.stats.tests);
    println!("  {} {}", "AI blocks:".dimmed(), summary.ai_blocks);
    println!(
        "  {} {}",
        "Untested:".dimmed(),
        colored_count(summary.untested_blocks)
    );
    println!(
        "  {} {} (>= {} days)",
        "Stale:".dimmed(),
        colored_count(summary.stale_blocks),
        summary.stale_days
    );
    println!(
        "  {} {} (>= {})",
        "Complex:".dimmed(),
        colored_count(summary.complex_blocks),
        summary.complexity_threshold
    );

    if !summary.tools.is_empty() {
        println!();
        println!("  {}", "AI tools:".dimmed());
        for tool in &summary.tools {
            println!("    {} {}", tool.ai_tool.cyan(), tool.count);
        }
    }

    Ok(())
}

/// List code blocks without a linked test.
pub fn untested(path: &Path) -> Result<()> {
    let (store, _) = open(path)?;
    let graph = load_graph(&store);
    let blocks = graph.find_untested_code_blocks();

    if blocks.is_empty() {
        println!("{} Every code block has a test", "✓".green());
        return Ok(());
    }

    println!("Found {} untested blocks:\n", blocks.len());
    for node in blocks {
        let lines = node.as_code_block().map_or(0, |b| b.line_count());
        println!(
            "  {} {} {}",
            "○".yellow(),
            block_location(&graph, node).cyan(),
            format!("({} lines)", lines).dimmed()
        );
    }

    Ok(())
}

/// List stale AI-generated blocks.
pub fn stale(path: &Path, days: Option<u32>) -> Result<()> {
    let (store, settings) = open(path)?;
    let graph = load_graph(&store);
    let days = days.unwrap_or(settings.stale_code.days);
    let blocks = graph.find_stale_ai_generated_blocks(days);

    if blocks.is_empty() {
        println!("{} No AI-generated blocks older than {} days", "✓".green(), days);
        return Ok(());
    }

    println!("Found {} blocks untouched for {}+ days:\n", blocks.len(), days);
    for node in blocks {
        let modified = node
            .as_code_block()
            .map(|b| b.last_modified.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        println!(
            "  {} {} {}",
            "◷".yellow(),
            block_location(&graph, node).cyan(),
            format!("(last modified {})", modified).dimmed()
        );
    }

    Ok(())
}

/// Rank files by AI-generated blocks.
pub fn hotspots(path: &Path, limit: usize) -> Result<()> {
    let (store, _) = open(path)?;
    let graph = load_graph(&store);
    let files = graph.find_files_with_most_ai_code(limit);

    if files.is_empty() {
        println!("No AI-generated code tracked yet");
        return Ok(());
    }

    println!("{}\n", "Files with the most AI-generated code".cyan().bold());
    for (rank, entry) in files.iter().enumerate() {
        println!(
            "  {:>3}. {} {}",
            rank + 1,
            file_path(&graph, &entry.file_id).cyan(),
            format!("({} blocks)", entry.count).dimmed()
        );
    }

    Ok(())
}

/// List complex code blocks.
pub fn complexity(path: &Path, threshold: Option<u32>) -> Result<()> {
    let (store, settings) = open(path)?;
    let graph = load_graph(&store);
    let threshold = threshold.unwrap_or(settings.complexity.threshold);
    let blocks = graph.find_complex_code_blocks(threshold);

    if blocks.is_empty() {
        println!("{} No blocks at complexity {} or above", "✓".green(), threshold);
        return Ok(());
    }

    println!("Found {} complex blocks:\n", blocks.len());
    for node in blocks {
        let score = node
            .as_code_block()
            .and_then(|b| b.complexity)
            .unwrap_or_default();
        println!(
            "  {} {}",
            format!("{:>3}", score).red().bold(),
            block_location(&graph, node).cyan()
        );
    }

    Ok(())
}

/// Tag a line range of a file as AI-generated.
pub fn tag(path: &Path, file: &Path, start: u32, end: u32, tool: Option<String>) -> Result<()> {
    if start == 0 || end < start {
        return Err(format!("invalid line range {}-{}", start, end).into());
    }

    let (store, settings) = open(path)?;
    let scanner = Scanner::new(path, &settings)?;

    let file = fs::canonicalize(file).map_err(|e| format!("{}: {}", file.display(), e))?;
    let rel = scanner
        .relative_path(&file)
        .ok_or_else(|| format!("{} is outside {}", file.display(), path.display()))?;
    let language = language_for_path(&file)
        .ok_or_else(|| format!("{} is not a supported source file", rel))?;

    let content = scanner.tracker().analyzer().read_source(&file)?;
    let span = extract_span(&content, start - 1, end - 1)
        .ok_or_else(|| format!("{} has fewer than {} lines", rel, end))?;

    let mut graph = load_graph(&store);
    let outcome = scanner.tracker().tag_span(
        &mut graph,
        SpanTag {
            path: rel.clone(),
            language: language.to_string(),
            start_line: start - 1,
            end_line: end - 1,
            content: span,
            ai_tool: tool,
        },
    );

    store.save_graph(graph.graph())?;
    store.log_activity(&format!("Tagged {}:{}-{}", rel, start, end));

    let tool = outcome
        .suggestion
        .as_ai_suggestion()
        .map(|s| s.ai_tool.clone())
        .unwrap_or_default();
    println!(
        "{} Tagged {}:{}-{} as {} ({})",
        "✓".green(),
        rel.cyan(),
        start,
        end,
        tool.yellow(),
        outcome.code_block.id.dimmed()
    );

    Ok(())
}

/// Export the graph document.
pub fn export(path: &Path, output: Option<&Path>) -> Result<()> {
    let (store, _) = open(path)?;
    let (doc, _) = store.load_graph();
    let json = serde_json::to_string_pretty(&doc)?;

    match output {
        Some(out) => {
            fs::write(out, json)?;
            println!("{} Exported to {}", "✓".green(), out.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

/// Start the dashboard server.
pub async fn serve(path: &Path, port: u16, watch: bool) -> Result<()> {
    let (store, settings) = open(path)?;
    let graph = Arc::new(RwLock::new(load_graph(&store)));

    println!("{}", "Starting FastTrack server...".cyan());

    let config = ServerConfig::from_settings(&settings).with_port(port);
    let server = FastTrackServer::with_shared(graph.clone(), config);

    println!("{} Listening on ws://{}", "✓".green(), server.addr());

    if !watch {
        println!("  Press {} to stop", "Ctrl+C".cyan());
        server.run().await?;
        return Ok(());
    }

    let watcher = ProjectWatcher::with_settings(WatchConfig::new(path), graph, &settings)?;
    let server = server.with_updates(watcher.sender());

    println!("{} Watching {}", "✓".green(), path.display());
    println!("  Press {} to stop", "Ctrl+C".cyan());

    tokio::select! {
        result = server.run() => result?,
        result = watcher.run() => result?,
    }

    Ok(())
}

/// Watch the project and keep the graph current.
pub async fn watch(path: &Path) -> Result<()> {
    let (store, settings) = open(path)?;
    let graph = Arc::new(RwLock::new(load_graph(&store)));

    let watcher = ProjectWatcher::with_settings(WatchConfig::new(path), graph, &settings)?;

    println!("{} Watching {}", "✓".green(), path.display());
    println!("  Press {} to stop", "Ctrl+C".cyan());

    watcher.run().await?;
    Ok(())
}

/// Opens an initialized project.
fn open(path: &Path) -> Result<(ProjectStore, Settings)> {
    let store = ProjectStore::new(path);

    if !store.is_initialized() {
        return Err(format!(
            "FastTrack is not initialized in {}. Run `fasttrack init` first",
            path.display()
        )
        .into());
    }

    let settings = store.load_settings();
    debug!("Opened project store at {}", store.dir().display());
    Ok((store, settings))
}

fn load_graph(store: &ProjectStore) -> TrackingGraph {
    let (graph, outcome) = store.load_tracking_graph();
    if let LoadOutcome::Recovered(reason) = outcome {
        println!(
            "{} Could not read the saved graph ({}); starting empty",
            "⚠".yellow(),
            reason
        );
    }
    graph
}

/// `path:start-end` for a code block, with 1-based lines.
fn block_location(graph: &TrackingGraph, node: &Node) -> String {
    match node.as_code_block() {
        Some(block) => format!(
            "{}:{}-{}",
            file_path(graph, &block.file_id),
            block.start_line + 1,
            block.end_line + 1
        ),
        None => node.id.clone(),
    }
}

fn file_path(graph: &TrackingGraph, file_id: &str) -> String {
    graph
        .find_node_by_id(file_id)
        .and_then(Node::as_file)
        .map(|f| f.path.clone())
        .unwrap_or_else(|| file_id.to_string())
}

fn colored_count(count: usize) -> colored::ColoredString {
    if count == 0 {
        count.to_string().green()
    } else {
        count.to_string().yellow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_location() {
        let mut graph = TrackingGraph::new();
        graph.create_file_node("f1", "src/a.js", "javascript");
        let block = graph.create_code_block_node("c1", "f1", 0, 4, "x");
        let orphan = graph.create_code_block_node("c2", "gone", 9, 9, "y");

        assert_eq!(block_location(&graph, &block), "src/a.js:1-5");
        assert_eq!(block_location(&graph, &orphan), "gone:10-10");
    }

    #[test]
    fn test_commands_require_init() {
        let dir = tempfile::tempdir().unwrap();
        assert!(status(dir.path()).is_err());

        init(dir.path()).unwrap();
        assert!(status(dir.path()).is_ok());
    }

    #[test]
    fn test_tag_and_export() {
        let dir = tempfile::tempdir().unwrap();
        init(dir.path()).unwrap();
        let file = dir.path().join("a.js");
        fs::write(&file, "// header\nfunction a() {\n  return 1;\n}\n").unwrap();

        tag(dir.path(), &file, 2, 4, Some("Cursor".into())).unwrap();
        assert!(tag(dir.path(), &file, 2, 40, None).is_err());

        let out = dir.path().join("out.json");
        export(dir.path(), Some(&out)).unwrap();
        let doc: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out).unwrap()).unwrap();
        let block = doc["nodes"]
            .as_array()
            .unwrap()
            .iter()
            .find(|n| n["type"] == "CodeBlock")
            .unwrap();
        assert_eq!(block["startLine"], 1);
        assert_eq!(block["content"], "function a() {\n  return 1;\n}");
    }
}
