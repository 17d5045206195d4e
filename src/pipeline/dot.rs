//! Graph snapshots in Graphviz DOT format.
//!
//! ```text
//! dot -Tsvg 0:00:02.004127311-added.dot > added.svg
//! ```

use crate::element::{Element, Pad};
use crate::error::Result;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Duration, Instant};

/// Reference point for the timestamp prefix of dump files.
static START: LazyLock<Instant> = LazyLock::new(Instant::now);

/// Render `bin` and everything below it as a DOT graph.
pub fn debug_bin_to_dot_data(bin: &Element) -> String {
    let mut out = String::new();
    let mut edges = Vec::new();

    out.push_str("digraph pipeline {\n");
    out.push_str("  rankdir=LR;\n");
    out.push_str("  fontname=\"sans\";\n");
    out.push_str("  fontsize=\"10\";\n");
    let _ = writeln!(
        out,
        "  label=\"<{}>\\n{}\\n[{}]\";",
        bin.name(),
        bin.factory_name(),
        bin.state()
    );
    out.push_str(
        "  node [style=\"filled,rounded\", shape=box, fontsize=\"9\", fontname=\"sans\"];\n",
    );
    out.push_str("  edge [labelfontsize=\"6\", fontsize=\"9\", fontname=\"monospace\"];\n\n");

    write_pads(&mut out, bin, 1, &mut edges);
    for child in bin.children() {
        write_element(&mut out, &child, 1, &mut edges);
    }

    out.push('\n');
    for edge in edges {
        let _ = writeln!(out, "  {}", edge);
    }
    out.push_str("}\n");
    out
}

/// Write a DOT snapshot of `bin` into `dir`.
///
/// The file is named `<elapsed>-<label>.dot`, where `<elapsed>` is the time
/// since the first dump in `H:MM:SS.nnnnnnnnn` form, so a directory listing
/// sorts the snapshots chronologically.
pub fn debug_bin_to_dot_file(bin: &Element, dir: &Path, label: &str) -> Result<PathBuf> {
    let elapsed = START.elapsed();
    let path = dir.join(format!("{}-{}.dot", format_elapsed(elapsed), label));
    std::fs::write(&path, debug_bin_to_dot_data(bin))?;
    tracing::debug!(path = %path.display(), "wrote graph snapshot");
    Ok(path)
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "{}:{:02}:{:02}.{:09}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        elapsed.subsec_nanos()
    )
}

fn write_element(out: &mut String, element: &Element, depth: usize, edges: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    let _ = writeln!(out, "{}subgraph cluster_{} {{", indent, node_id(element));
    let _ = writeln!(
        out,
        "{}  label=\"{}\\n[{}]\\n[{}]\";",
        indent,
        element.name(),
        element.factory_name(),
        element.state()
    );
    let _ = writeln!(out, "{}  style=\"filled,rounded\";", indent);
    let color = if element.is_bin() {
        "#ffffff"
    } else if element.is_sink() {
        "#aaaaff"
    } else {
        "#aaffaa"
    };
    let _ = writeln!(out, "{}  fillcolor=\"{}\";", indent, color);

    write_pads(out, element, depth + 1, edges);
    for child in element.children() {
        write_element(out, &child, depth + 1, edges);
    }

    let _ = writeln!(out, "{}}}", indent);
}

fn write_pads(out: &mut String, element: &Element, depth: usize, edges: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    for pad in element.pads() {
        let color = if pad.is_output() { "#ffaaaa" } else { "#aaaaff" };
        let _ = writeln!(
            out,
            "{}{} [label=\"{}\", fillcolor=\"{}\"];",
            indent,
            pad_id(element, &pad),
            pad.name(),
            color
        );

        if let Some(target) = pad.ghost_target()
            && let Some(owner) = target.parent()
        {
            edges.push(format!(
                "{} -> {} [style=dashed, minlen=0];",
                pad_id(element, &pad),
                pad_id(&owner, target)
            ));
        }

        if pad.is_output()
            && let Some(peer) = pad.peer()
            && let Some(owner) = peer.parent()
        {
            edges.push(format!(
                "{} -> {};",
                pad_id(element, &pad),
                pad_id(&owner, &peer)
            ));
        }
    }
}

fn node_id(element: &Element) -> String {
    sanitize(&element.path_string())
}

fn pad_id(element: &Element, pad: &Pad) -> String {
    format!("{}_{}", node_id(element), sanitize(pad.name()))
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{ElementFactory, Pipeline};

    #[test]
    fn test_format_elapsed() {
        assert_eq!(
            format_elapsed(Duration::new(3723, 5)),
            "1:02:03.000000005"
        );
    }

    #[test]
    fn test_dot_contains_elements_and_links() {
        let factory = ElementFactory::new();
        let pipeline = Pipeline::new(Some("dotted"));
        let queue = factory.make("queue", Some("q")).unwrap();
        let sink = factory.make("fakesink", Some("s")).unwrap();
        pipeline.add_many(&[&queue, &sink]).unwrap();
        queue.link(&sink).unwrap();

        let dot = debug_bin_to_dot_data(&pipeline);
        assert!(dot.starts_with("digraph pipeline {"));
        assert!(dot.contains("subgraph cluster__dotted_q {"));
        assert!(dot.contains("_dotted_q_src -> _dotted_s_sink;"));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn test_dot_file_written() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(Some("filed"));

        let path = debug_bin_to_dot_file(&pipeline, dir.path(), "before").unwrap();
        assert!(path.file_name().unwrap().to_str().unwrap().ends_with("-before.dot"));
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("<filed>"));
    }
}
