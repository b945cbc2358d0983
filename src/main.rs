use std::path::Path;
use std::time::Instant;

use clap::{Parser, Subcommand};

use gamebook_ingest::{assemble, lint, repair, source, store};

#[derive(Parser)]
#[command(name = "gamebook_ingest", about = "Gamebook page-text to playable story graph")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble the story graph from a page dump, repair links, persist
    Build {
        /// Page-text dump produced by the book extraction step
        #[arg(short, long, default_value = "raw_text.txt")]
        source: String,
        /// Story JSON store (read as prior snapshot, then overwritten)
        #[arg(long, default_value = "story.json")]
        story: String,
        /// Where to write the link change report
        #[arg(long, default_value = "link_report.txt")]
        report: String,
        /// Section number the book starts on
        #[arg(long, default_value_t = 1)]
        entry: u32,
        /// Safety cap on assembled sections
        #[arg(long, default_value_t = 200)]
        max_nodes: usize,
        /// Continuation pages a choiceless section may absorb
        #[arg(long, default_value_t = 2)]
        max_continuation: u32,
        /// Physical page offset of section 1 in the dump
        #[arg(long, default_value_t = source::DEFAULT_PAGE_OFFSET)]
        page_offset: u32,
    },
    /// Check duplicate choices, reachability, and OCR noise thresholds
    Lint {
        #[arg(long, default_value = "story.json")]
        story: String,
        #[arg(long, default_value_t = 0.15)]
        min_reachable_ratio: f64,
        #[arg(long, default_value_t = 0.03)]
        max_noise_ratio: f64,
        /// Auto-fix duplicate choices in place
        #[arg(long)]
        fix: bool,
    },
    /// Story graph overview: node counts, endings, depth, unreachable
    Stats {
        #[arg(long, default_value = "story.json")]
        story: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Build {
            source,
            story,
            report,
            entry,
            max_nodes,
            max_continuation,
            page_offset,
        } => {
            let pages = source::PageFileSource::load(Path::new(&source), page_offset)?;
            let story_path = Path::new(&story);
            let prior = if story_path.exists() {
                store::load_nodes(story_path)?
            } else {
                Vec::new()
            };
            if !prior.is_empty() {
                println!("Seeding from {} prior nodes in {}", prior.len(), story);
            }

            let config = assemble::AssembleConfig {
                entry_section: entry,
                max_nodes,
                max_continuation,
            };
            println!("Assembling sections from {} ({} pages)...", source, pages.page_count());
            let drafts = assemble::assemble(&pages, &prior, &config);

            let (nodes, changes) = repair::repair(drafts);
            store::save_nodes(story_path, &nodes)?;
            write_link_report(Path::new(&report), &changes)?;

            println!("Wrote {} with {} nodes.", story, nodes.len());
            println!("Link changes logged: {}", changes.len());
            Ok(())
        }
        Commands::Lint {
            story,
            min_reachable_ratio,
            max_noise_ratio,
            fix,
        } => {
            let options = lint::LintOptions {
                min_reachable_ratio,
                max_noise_ratio,
                fix,
            };
            std::process::exit(lint::run(Path::new(&story), &options));
        }
        Commands::Stats { story } => {
            let nodes = store::load_nodes(Path::new(&story))?;
            let s = lint::summarize(&nodes);
            println!("Total nodes: {}", s.total_nodes);
            println!("Total choices: {}", s.total_choices);
            println!(
                "Ending counts -> win: {}, death: {}, neutral: {}",
                s.win_count, s.death_count, s.neutral_count
            );
            println!("Average choices per normal node: {:.2}", s.avg_choices);
            let entry = nodes.first().map(|n| n.id.as_str()).unwrap_or("-");
            println!(
                "Deepest reachable path length from entry ({}): {}",
                entry, s.depth
            );
            if s.unreachable.is_empty() {
                println!("Unreachable nodes: None");
            } else {
                println!("Unreachable nodes: {}", s.unreachable.join(", "));
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn write_link_report(path: &Path, changes: &[String]) -> anyhow::Result<()> {
    let body = if changes.is_empty() {
        "No broken links found.\n".to_string()
    } else {
        changes.join("\n") + "\n"
    };
    std::fs::write(path, body)?;
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
