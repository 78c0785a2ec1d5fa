use std::{fs, path::PathBuf};

use clap::Parser;
use mints::{
    StripConfig,
    classify::{Verdict, classify},
    parse::parse,
    span::LineIndex,
};

#[derive(Parser, Debug)]
#[command(name = "parse")]
#[command(about = "Parse a TypeScript file and print the syntax tree", long_about = None)]
struct Args {
    /// Path to the source file to parse
    input: PathBuf,

    /// Annotate every node with the classifier's decision under the default config
    #[arg(long, short)]
    decisions: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let source = fs::read_to_string(&args.input)?;
    let parsed = parse(&source)?;
    let tree = &parsed.tree;
    let index = LineIndex::new(&source);
    let classification = args
        .decisions
        .then(|| classify(tree, &StripConfig::default()));

    for (id, depth) in tree.walk() {
        let node = tree.node(id);
        let indent = "  ".repeat(depth);
        let (sl, sc) = index.line_col(node.span.start);
        let (el, ec) = index.line_col(node.span.end);
        let text_preview = tree.text(node.span).replace('\n', "\\n");

        let decision = match &classification {
            Some(c) => match &c.decision(id).verdict {
                Verdict::Keep => String::new(),
                Verdict::Erase => format!(" erase({:?})", c.decision(id).rule),
                Verdict::KeepAsComment => format!(" comment({:?})", c.decision(id).rule),
                Verdict::Rewrite(_) => format!(" rewrite({:?})", c.decision(id).rule),
            },
            None => String::new(),
        };

        println!(
            "{indent}{kind} [{start}..{end}] ({sl}:{sc})..({el}:{ec}){decision} \"{text}\"",
            kind = node.kind.name(),
            start = node.span.start,
            end = node.span.end,
            text = truncate(&text_preview, 120),
        );
    }

    let diagnostics = parsed
        .diagnostics
        .iter()
        .chain(classification.iter().flat_map(|c| c.diagnostics()));
    for diagnostic in diagnostics {
        eprintln!("{}", diagnostic.render(&index));
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }

    // Try to truncate on a UTF-8 boundary.
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}
