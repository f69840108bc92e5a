use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use pri_reader::{CandidateData, PriReader, QualifierSet};

/// Resolve a localized string from a PRI resource container.
#[derive(Parser, Debug)]
#[command(name = "pri-reader", version, about)]
struct Cli {
    /// Path to the resources.pri file
    path: PathBuf,

    /// Resource name, e.g. `ms-resource:AppTitle` or `\Resources\AppTitle`
    name: String,

    /// Locale to resolve for (defaults to $LANG, then en-US)
    #[arg(long, short)]
    locale: Option<String>,

    /// List every candidate of the resource instead of only the winner
    #[arg(long)]
    candidates: bool,
}

/// Turns a POSIX locale such as `de_DE.UTF-8` into a tag like `de-DE`.
fn locale_from_env() -> Option<String> {
    let lang = std::env::var("LANG").ok()?;
    let tag = lang.split(['.', '@']).next()?.replace('_', "-");
    (!tag.is_empty() && tag != "C" && tag != "POSIX").then_some(tag)
}

fn describe(qualifiers: &QualifierSet) -> String {
    if qualifiers.qualifiers.is_empty() {
        return "(neutral)".to_string();
    }
    qualifiers
        .qualifiers
        .iter()
        .map(|q| format!("{:?}={}", q.qualifier_type, q.value))
        .collect::<Vec<_>>()
        .join(", ")
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let locale = cli
        .locale
        .or_else(locale_from_env)
        .unwrap_or_else(|| "en-US".to_string());

    let reader = match PriReader::open(&cli.path) {
        Ok(reader) => reader,
        Err(e) => {
            eprintln!("ERROR: Failed to open resource container");
            eprintln!("  {}", e);
            return ExitCode::FAILURE;
        }
    };

    if cli.candidates {
        println!("Container: {}", cli.path.display());
        println!("  Version: {}", reader.container().header.version);
        println!("  Schema: {}", reader.schema_name());
        println!("  Resources: {}", reader.num_resources());
        println!("{}", "=".repeat(60));

        match reader.item(&cli.name) {
            Ok(Some(item)) => {
                println!("{}", item.name);
                for (i, candidate) in item.candidates.iter().enumerate() {
                    let location = match candidate.data {
                        CandidateData::Inline(span) => format!("inline @{:#x}+{}", span.offset, span.length),
                        CandidateData::DataItem(r) => format!("data item {} in section {}", r.index, r.section),
                        CandidateData::External { source_file } => format!("referenced file {}", source_file),
                    };
                    let value = match reader.read_candidate(candidate) {
                        Ok(Some(text)) => format!("{:?}", text),
                        Ok(None) => "<external>".to_string(),
                        Err(e) => format!("<unreadable: {}>", e),
                    };
                    println!(
                        "  {}. [{}] {:?} {} -> {}",
                        i + 1,
                        describe(&candidate.qualifiers),
                        candidate.value_type,
                        location,
                        value
                    );
                }
                println!("{}", "=".repeat(60));
            }
            Ok(None) => {}
            Err(e) => {
                eprintln!("ERROR: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    match reader.resolve(&cli.name, &locale) {
        Ok(Some(text)) => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Ok(None) => {
            eprintln!("No text for '{}' in locale {}", cli.name, locale);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("ERROR: {}", e);
            ExitCode::FAILURE
        }
    }
}
